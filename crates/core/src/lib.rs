//! Core logic of the report generation subsystem.
//!
//! This crate holds the report lifecycle, the storage chain, the background
//! task processor and the service tying them together. It has no web or
//! database dependencies; persistence is reached through
//! [`report::ReportRepository`].
//!
//! # Modules
//!
//! - `report` - Report entity, status state machine and repository contract
//! - `storage` - File storage backends and middleware chain
//! - `processor` - Bounded background task processor
//! - `generation` - Report rendering and the generation task handler
//! - `service` - Report orchestration service

pub mod generation;
pub mod processor;
pub mod report;
pub mod service;
pub mod storage;

pub use generation::{JsonReportGenerator, ReportGenerator};
pub use processor::BackgroundProcessor;
pub use report::{InMemoryReportRepository, Report, ReportRepository, ReportStatus};
pub use service::{ReportService, ReportServiceError};
pub use storage::{Storage, StorageBuilder, StorageConfig};
