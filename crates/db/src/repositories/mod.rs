//! Repository implementations for data access.
//!
//! Repositories hide the `SeaORM` details behind the persistence traits of
//! `repgen-core`.

pub mod report;

pub use report::PgReportRepository;
