//! Report persistence contract.

use repgen_shared::AppError;
use repgen_shared::types::ReportId;
use thiserror::Error;

use super::types::{NewReport, Report, ReportChanges, ReportFilter, ReportStatus};

/// Errors raised by a report repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// No row with this id.
    #[error("Report not found: {0}")]
    NotFound(ReportId),

    /// The store failed.
    #[error("Database error: {0}")]
    Database(String),
}

impl RepositoryError {
    /// Create a database error.
    #[must_use]
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Returns true if the row does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(_) => Self::NotFound(err.to_string()),
            RepositoryError::Database(msg) => Self::Database(msg),
        }
    }
}

/// Repository trait for report persistence.
///
/// Implemented by the db crate for PostgreSQL and by
/// [`InMemoryReportRepository`](super::InMemoryReportRepository). Writes are
/// individually atomic. Writers racing each other on the status use
/// [`transition_status`](Self::transition_status).
pub trait ReportRepository: Send + Sync {
    /// Inserts a pending report and returns it with its assigned id.
    fn create(
        &self,
        input: NewReport,
    ) -> impl std::future::Future<Output = Result<Report, RepositoryError>> + Send;

    /// Loads a report, failing with `NotFound` if absent.
    fn get_by_id(
        &self,
        id: ReportId,
    ) -> impl std::future::Future<Output = Result<Report, RepositoryError>> + Send;

    /// Returns one page of matching reports and the total match count.
    fn list(
        &self,
        filter: &ReportFilter,
    ) -> impl std::future::Future<Output = Result<(Vec<Report>, u64), RepositoryError>> + Send;

    /// Writes the set fields of `changes` and returns the stored report.
    ///
    /// Entering `Completed` stamps `generated_at` if it is still empty.
    fn update(
        &self,
        id: ReportId,
        changes: &ReportChanges,
    ) -> impl std::future::Future<Output = Result<Report, RepositoryError>> + Send;

    /// Deletes a report, failing with `NotFound` if absent.
    fn delete(
        &self,
        id: ReportId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Overwrites the status, and the file key when one is given.
    ///
    /// Entering `Completed` stamps `generated_at` if it is still empty.
    fn update_status(
        &self,
        id: ReportId,
        status: ReportStatus,
        file_key: Option<&str>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Moves the report from `from` to `to` in one atomic write, setting the
    /// file key when one is given.
    ///
    /// Returns `false` and writes nothing when the stored status is no longer
    /// `from`. Entering `Completed` stamps `generated_at` if it is still empty.
    fn transition_status(
        &self,
        id: ReportId,
        from: ReportStatus,
        to: ReportStatus,
        file_key: Option<&str>,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
