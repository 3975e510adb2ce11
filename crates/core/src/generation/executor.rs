//! Execution of report generation tasks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use repgen_shared::types::ReportId;
use serde_json::json;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::generator::{GeneratorError, ReportGenerator};
use super::keys::{report_file_key, task_id_for};
use crate::processor::{ProcessorError, Task, TaskHandler, TaskType};
use crate::report::{ReportError, ReportRepository, ReportStatus, RepositoryError};
use crate::storage::{Storage, StorageError};

/// Identity recorded on status changes made by background execution.
pub const SYSTEM_ACTOR: &str = "system";

/// Builds the generation task for `report_id`.
#[must_use]
pub fn generation_task(report_id: ReportId, timeout: Duration) -> Task {
    Task::new(
        task_id_for(report_id),
        TaskType::report_generation(),
        json!({ "report_id": report_id }),
    )
    .with_timeout(timeout)
}

#[derive(Debug, Error)]
enum ExecutionError {
    #[error("execution canceled")]
    Canceled,
    #[error("report left {0} before the write")]
    Superseded(ReportStatus),
    #[error(transparent)]
    Transition(#[from] ReportError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ExecutionError {
    fn is_canceled(&self) -> bool {
        matches!(
            self,
            Self::Canceled
                | Self::Generator(GeneratorError::Canceled)
                | Self::Storage(StorageError::Canceled)
        )
    }
}

fn ensure_active(cx: &CancellationToken) -> Result<(), ExecutionError> {
    if cx.is_cancelled() {
        return Err(ExecutionError::Canceled);
    }
    Ok(())
}

/// [`TaskHandler`] that renders one report and stores the file.
///
/// Steps: Pending → Processing, render, save, Processing → Completed. Every
/// status write is conditional on the status the handler expects, so a
/// cancel that lands first is never overwritten. Any failure moves a
/// Processing report to Failed. A failed save, a cancellation observed after
/// the file was written, or a report that left Processing in the meantime
/// removes the file again so no orphan stays behind.
pub struct ReportGenerationHandler<R, G> {
    repo: Arc<R>,
    generator: Arc<G>,
    storage: Arc<dyn Storage>,
}

impl<R, G> ReportGenerationHandler<R, G>
where
    R: ReportRepository,
    G: ReportGenerator,
{
    /// Creates the handler.
    #[must_use]
    pub fn new(repo: Arc<R>, generator: Arc<G>, storage: Arc<dyn Storage>) -> Self {
        Self {
            repo,
            generator,
            storage,
        }
    }

    async fn execute(
        &self,
        report_id: ReportId,
        cx: &CancellationToken,
    ) -> Result<String, ExecutionError> {
        ensure_active(cx)?;
        let mut report = self.repo.get_by_id(report_id).await?;
        let from = report.status;
        report.set_status(ReportStatus::Processing, SYSTEM_ACTOR)?;
        self.transition(report_id, from, ReportStatus::Processing, None)
            .await?;
        debug!(report_id = %report_id, "report processing");

        ensure_active(cx)?;
        let file = self.generator.generate(&report, cx).await?;
        ensure_active(cx)?;

        let key = report_file_key(
            report_id,
            &report.title,
            Utc::now(),
            self.generator.file_extension(),
        );
        ensure_active(cx)?;
        if let Err(e) = self.storage.save(cx, &key, file.content).await {
            // A failed or canceled save may still have left an object behind.
            self.discard_file(report_id, &key).await;
            return Err(e.into());
        }

        let completed = async {
            ensure_active(cx)?;
            self.transition(
                report_id,
                ReportStatus::Processing,
                ReportStatus::Completed,
                Some(key.as_str()),
            )
            .await
        };
        if let Err(e) = completed.await {
            self.discard_file(report_id, &key).await;
            return Err(e);
        }
        Ok(key)
    }

    /// Writes `to` only while the report is still in `from`.
    async fn transition(
        &self,
        report_id: ReportId,
        from: ReportStatus,
        to: ReportStatus,
        file_key: Option<&str>,
    ) -> Result<(), ExecutionError> {
        if self
            .repo
            .transition_status(report_id, from, to, file_key)
            .await?
        {
            Ok(())
        } else {
            Err(ExecutionError::Superseded(from))
        }
    }

    async fn discard_file(&self, report_id: ReportId, key: &str) {
        // The task token may already be cancelled; cleanup runs on its own.
        let cleanup = CancellationToken::new();
        match self.storage.delete(&cleanup, key).await {
            Ok(()) => debug!(report_id = %report_id, key, "discarded generated file"),
            Err(e) => {
                warn!(report_id = %report_id, key, error = %e, "failed to discard generated file");
            }
        }
    }

    async fn mark_failed(&self, report_id: ReportId) {
        match self
            .repo
            .transition_status(report_id, ReportStatus::Processing, ReportStatus::Failed, None)
            .await
        {
            Ok(true) => {}
            Ok(false) => debug!(report_id = %report_id, "leaving report status unchanged"),
            Err(e) => {
                error!(report_id = %report_id, error = %e, "failed to mark report as failed");
            }
        }
    }
}

fn report_id_from(task: &Task) -> Result<ReportId, ProcessorError> {
    task.data
        .get("report_id")
        .and_then(serde_json::Value::as_str)
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| ProcessorError::handler(format!("task {} has no valid report_id", task.id)))
}

#[async_trait]
impl<R, G> TaskHandler for ReportGenerationHandler<R, G>
where
    R: ReportRepository + 'static,
    G: ReportGenerator + 'static,
{
    async fn handle(&self, task: &Task, cx: &CancellationToken) -> Result<(), ProcessorError> {
        let report_id = report_id_from(task)?;

        match self.execute(report_id, cx).await {
            Ok(key) => {
                info!(report_id = %report_id, key = %key, "report generated");
                Ok(())
            }
            Err(e) => {
                if e.is_canceled() {
                    info!(report_id = %report_id, "report generation canceled");
                } else {
                    error!(report_id = %report_id, error = %e, "report generation failed");
                }
                self.mark_failed(report_id).await;
                Err(ProcessorError::handler(e.to_string()))
            }
        }
    }
}
