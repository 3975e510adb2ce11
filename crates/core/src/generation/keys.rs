//! Naming of report tasks and stored files.

use chrono::{DateTime, Utc};
use repgen_shared::types::ReportId;

use crate::processor::TaskId;

/// Longest title fragment embedded in a storage key.
const MAX_TITLE_FRAGMENT: usize = 100;

/// Task id of the generation task for `report_id`.
#[must_use]
pub fn task_id_for(report_id: ReportId) -> TaskId {
    TaskId::new(format!("report_{report_id}"))
}

/// Storage key prefix holding every file of `report_id`.
#[must_use]
pub fn report_prefix(report_id: ReportId) -> String {
    format!("reports/{report_id}/")
}

/// Storage key for one generated file.
///
/// Format: `reports/{id}/{sanitized_title}_{YYYYMMDDHHMMSS}.{ext}`
#[must_use]
pub fn report_file_key(
    report_id: ReportId,
    title: &str,
    generated_at: DateTime<Utc>,
    extension: &str,
) -> String {
    format!(
        "{}{}_{}.{}",
        report_prefix(report_id),
        sanitize_title(title),
        generated_at.format("%Y%m%d%H%M%S"),
        extension.trim_start_matches('.')
    )
}

/// Keeps ASCII alphanumerics, dots, hyphens and underscores; replaces
/// everything else with `_` and truncates. Never returns `..` or an empty
/// string.
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    let sanitized: String = title
        .trim()
        .chars()
        .take(MAX_TITLE_FRAGMENT)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.chars().all(|c| c == '.' || c == '_') {
        "report".to_string()
    } else {
        sanitized.replace("..", "_")
    }
}
