//! Report orchestration service.

use std::sync::Arc;
use std::time::Duration;

use repgen_shared::types::{PageRequest, PageResponse, ReportId};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::ReportServiceError;
use crate::generation::{ReportGenerationHandler, ReportGenerator, generation_task, task_id_for};
use crate::processor::{BackgroundProcessor, ProcessorError, Task, TaskStatus, TaskType};
use crate::report::{
    NewReport, Report, ReportChanges, ReportFilter, ReportRepository, ReportSortField,
    ReportStatus, SortDirection,
};
use crate::storage::{FileReader, Storage, StorageConfig};

/// Result type for report service operations.
pub type ServiceResult<T> = Result<T, ReportServiceError>;

/// Query for [`ReportService::list_reports`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListReportsParams {
    /// Page number, 1-indexed.
    pub page: u32,
    /// Page size; 0 means the default.
    pub per_page: u32,
    /// Only reports in this status.
    pub status: Option<ReportStatus>,
    /// Case-insensitive search on title and description.
    pub search: Option<String>,
    /// Sort column.
    pub sort_by: ReportSortField,
    /// Sort direction.
    pub sort_dir: SortDirection,
}

/// A completed report's file, ready to stream.
pub struct ReportFile {
    /// Storage key.
    pub key: String,
    /// Download name, `{title}.{extension}`.
    pub filename: String,
    /// MIME type of the content.
    pub mime_type: String,
    /// File content.
    pub reader: FileReader,
}

/// Ties the repository, generator, storage and background processor
/// together.
///
/// Creating the service registers the generation handler with the
/// processor; the caller still owns the processor's `start`/`shutdown`.
pub struct ReportService<R, G> {
    repo: Arc<R>,
    generator: Arc<G>,
    storage: Arc<dyn Storage>,
    processor: Arc<BackgroundProcessor>,
    task_timeout: Duration,
    presign_ttl: Duration,
}

impl<R, G> ReportService<R, G>
where
    R: ReportRepository + 'static,
    G: ReportGenerator + 'static,
{
    /// Creates the service and registers the report generation handler.
    pub fn new(
        repo: Arc<R>,
        generator: Arc<G>,
        storage: Arc<dyn Storage>,
        processor: Arc<BackgroundProcessor>,
    ) -> Self {
        let handler = ReportGenerationHandler::new(
            Arc::clone(&repo),
            Arc::clone(&generator),
            Arc::clone(&storage),
        );
        processor.register_handler(TaskType::report_generation(), Arc::new(handler));

        Self {
            repo,
            generator,
            storage,
            processor,
            task_timeout: Task::DEFAULT_TIMEOUT,
            presign_ttl: StorageConfig::DEFAULT_PRESIGN_TTL,
        }
    }

    /// Sets the timeout of generation tasks.
    #[must_use]
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Sets the default lifetime of download URLs.
    #[must_use]
    pub fn with_presign_ttl(mut self, ttl: Duration) -> Self {
        self.presign_ttl = ttl;
        self
    }

    /// Persists a pending report and queues its generation.
    ///
    /// If the task cannot be queued the report is marked `Failed` before the
    /// error is returned, so it never stays pending with nothing in flight.
    ///
    /// # Errors
    ///
    /// - `Validation` if a field bound is violated
    /// - `QueueFull` if the processor rejected the task
    pub async fn create_report(&self, input: NewReport) -> ServiceResult<Report> {
        input.validate_fields()?;
        let report = self.repo.create(input).await?;

        if let Err(e) = self.enqueue(report.id) {
            self.fail_unqueued(report.id).await;
            return Err(e.into());
        }

        info!(report_id = %report.id, created_by = %report.created_by, "report requested");
        Ok(report)
    }

    /// Loads one report.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the report does not exist.
    pub async fn get_report(&self, id: ReportId) -> ServiceResult<Report> {
        Ok(self.repo.get_by_id(id).await?)
    }

    /// Returns one page of reports.
    pub async fn list_reports(
        &self,
        params: ListReportsParams,
    ) -> ServiceResult<PageResponse<Report>> {
        let page = PageRequest::new(params.page, params.per_page).normalized();
        let filter = ReportFilter {
            status: params.status,
            search: params.search,
            sort_by: params.sort_by,
            sort_dir: params.sort_dir,
            offset: page.offset(),
            limit: page.limit(),
        };

        let (reports, total) = self.repo.list(&filter).await?;
        Ok(PageResponse::new(reports, page.page, page.per_page, total))
    }

    /// Applies a partial update.
    ///
    /// A status change is checked against the lifecycle. Moving to
    /// `Canceled` also cancels the in-flight generation; moving back to
    /// `Pending` queues a fresh one.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the report does not exist
    /// - `InvalidTransition` or `Validation` if the change is rejected
    /// - `QueueFull` if a retry could not be queued
    pub async fn update_report(
        &self,
        id: ReportId,
        mut changes: ReportChanges,
    ) -> ServiceResult<Report> {
        let current = self.repo.get_by_id(id).await?;
        let mut candidate = current.clone();
        candidate.apply_changes(&changes)?;

        let target = changes.status.take().filter(|s| *s != current.status);
        if let Some(to) = target {
            if to == ReportStatus::Canceled {
                self.cancel_generation(id);
            }
            self.move_status(id, current.status, to).await?;
        }

        let updated = self.repo.update(id, &changes).await?;

        if target == Some(ReportStatus::Pending) {
            if let Err(e) = self.enqueue(id) {
                self.fail_unqueued(id).await;
                return Err(e.into());
            }
            info!(report_id = %id, from = %current.status, "report generation requeued");
        }

        debug!(report_id = %id, updated_by = %updated.updated_by, "report updated");
        Ok(updated)
    }

    /// Cancels generation of a report.
    ///
    /// A missing task is not an error: the run may already have finished.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the report does not exist
    /// - `InvalidTransition` if the report cannot move to `Canceled`
    pub async fn cancel_report_generation(&self, id: ReportId) -> ServiceResult<()> {
        let report = self.repo.get_by_id(id).await?;
        if !report.status.can_transition_to(ReportStatus::Canceled) {
            return Err(ReportServiceError::InvalidTransition {
                from: report.status,
                to: ReportStatus::Canceled,
            });
        }

        self.cancel_generation(id);
        let from = self
            .move_status(id, report.status, ReportStatus::Canceled)
            .await?;

        info!(report_id = %id, from = %from, "report generation canceled");
        Ok(())
    }

    /// Deletes a report and its stored file.
    ///
    /// In-flight generation is canceled first. A failure to delete the file
    /// is logged and does not fail the call.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the report does not exist.
    pub async fn delete_report(&self, id: ReportId) -> ServiceResult<()> {
        let report = self.repo.get_by_id(id).await?;
        self.cancel_generation(id);

        if let Some(key) = report.file_key.as_deref().filter(|k| !k.is_empty()) {
            let cx = CancellationToken::new();
            if let Err(e) = self.storage.delete(&cx, key).await {
                warn!(report_id = %id, key, error = %e, "failed to delete report file");
            }
        }

        self.repo.delete(id).await?;
        info!(report_id = %id, "report deleted");
        Ok(())
    }

    /// Opens the generated file of a completed report.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the report does not exist
    /// - `NotReady` if it is not completed
    /// - `FileMissing` if it is completed without a file key
    /// - a storage error if the file cannot be read
    pub async fn get_report_file(&self, id: ReportId) -> ServiceResult<ReportFile> {
        let report = self.repo.get_by_id(id).await?;
        let key = ready_file_key(&report)?;

        let cx = CancellationToken::new();
        let reader = self.storage.get(&cx, key).await?;

        Ok(ReportFile {
            key: key.to_string(),
            filename: format!("{}.{}", report.title, self.generator.file_extension()),
            mime_type: self.generator.mime_type().to_string(),
            reader,
        })
    }

    /// Returns a time-limited download URL for a completed report.
    ///
    /// `ttl` defaults to the configured presign lifetime.
    ///
    /// # Errors
    ///
    /// As [`Self::get_report_file`], plus storage errors from presigning.
    pub async fn get_report_download_url(
        &self,
        id: ReportId,
        ttl: Option<Duration>,
    ) -> ServiceResult<String> {
        let report = self.repo.get_by_id(id).await?;
        let key = ready_file_key(&report)?;

        let cx = CancellationToken::new();
        let url = self
            .storage
            .get_presigned_url(&cx, key, ttl.unwrap_or(self.presign_ttl))
            .await?;
        Ok(url)
    }

    /// Best-effort status of the generation task of `id`.
    #[must_use]
    pub fn generation_status(&self, id: ReportId) -> Option<TaskStatus> {
        self.processor.get_task_status(&task_id_for(id))
    }

    fn enqueue(&self, id: ReportId) -> Result<(), ProcessorError> {
        self.processor
            .submit_task(generation_task(id, self.task_timeout))
    }

    fn cancel_generation(&self, id: ReportId) {
        match self.processor.cancel_task(&task_id_for(id)) {
            Ok(()) => debug!(report_id = %id, "generation task canceled"),
            Err(ProcessorError::TaskNotFound(_)) => {
                debug!(report_id = %id, "no generation task in flight");
            }
            Err(e) => warn!(report_id = %id, error = %e, "failed to cancel generation task"),
        }
    }

    /// Writes `to` conditionally on the last seen status, re-reading after a
    /// concurrent writer got there first. Returns the status moved from.
    async fn move_status(
        &self,
        id: ReportId,
        mut from: ReportStatus,
        to: ReportStatus,
    ) -> ServiceResult<ReportStatus> {
        loop {
            if !from.can_transition_to(to) {
                return Err(ReportServiceError::InvalidTransition { from, to });
            }
            if self.repo.transition_status(id, from, to, None).await? {
                return Ok(from);
            }
            from = self.repo.get_by_id(id).await?.status;
        }
    }

    // Pending -> Failed is not a lifecycle edge; this write bypasses the
    // check because no task will ever pick the report up.
    async fn fail_unqueued(&self, id: ReportId) {
        warn!(report_id = %id, "generation task rejected, marking report failed");
        match self
            .repo
            .transition_status(id, ReportStatus::Pending, ReportStatus::Failed, None)
            .await
        {
            Ok(true) => {}
            Ok(false) => debug!(report_id = %id, "report left pending, not marking failed"),
            Err(e) => {
                error!(report_id = %id, error = %e, "failed to mark unqueued report as failed");
            }
        }
    }
}

fn ready_file_key(report: &Report) -> ServiceResult<&str> {
    if report.status != ReportStatus::Completed {
        return Err(ReportServiceError::NotReady {
            id: report.id,
            status: report.status,
        });
    }
    report
        .file_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or(ReportServiceError::FileMissing(report.id))
}
