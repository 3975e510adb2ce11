//! Report entity, lifecycle and persistence contract.
//!
//! # Modules
//!
//! - `types` - Report entity, status state machine, inputs and filters
//! - `error` - Entity-level error types
//! - `repository` - Persistence trait implemented by the db crate
//! - `memory` - In-process repository

pub mod error;
pub mod memory;
pub mod repository;
pub mod types;

#[cfg(test)]
mod status_props;

pub use error::ReportError;
pub use memory::InMemoryReportRepository;
pub use repository::{ReportRepository, RepositoryError};
pub use types::{
    NewReport, NewReportBuilder, Report, ReportChanges, ReportFilter, ReportParameters,
    ReportSortField, ReportStatus, SortDirection, is_valid_transition,
};
