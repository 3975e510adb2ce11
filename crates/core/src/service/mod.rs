//! Report orchestration: creation, cancellation, deletion and file access.

pub mod error;
pub mod orchestrator;


pub use error::ReportServiceError;
pub use orchestrator::{ListReportsParams, ReportFile, ReportService, ServiceResult};
