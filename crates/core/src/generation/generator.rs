//! Report rendering contract and the built-in JSON renderer.

use bytes::Bytes;
use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::keys::sanitize_title;
use crate::report::Report;

/// Errors raised while rendering a report.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The token fired before rendering finished.
    #[error("report generation canceled")]
    Canceled,

    /// Rendering failed.
    #[error("report generation failed: {0}")]
    Failed(String),
}

impl GeneratorError {
    /// Create a rendering failure.
    #[must_use]
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Rendered output of one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// File content.
    pub content: Bytes,
    /// Suggested download name.
    pub filename: String,
}

/// Renders a report into a file.
pub trait ReportGenerator: Send + Sync {
    /// Renders `report`. Must return [`GeneratorError::Canceled`] promptly
    /// once `cx` fires.
    fn generate(
        &self,
        report: &Report,
        cx: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<GeneratedFile, GeneratorError>> + Send;

    /// MIME type of generated files.
    fn mime_type(&self) -> &str;

    /// File extension of generated files, without the dot.
    fn file_extension(&self) -> &str;
}

/// Writes report metadata and parameters as a pretty-printed JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportGenerator;

impl JsonReportGenerator {
    /// Creates the generator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ReportGenerator for JsonReportGenerator {
    async fn generate(
        &self,
        report: &Report,
        cx: &CancellationToken,
    ) -> Result<GeneratedFile, GeneratorError> {
        if cx.is_cancelled() {
            return Err(GeneratorError::Canceled);
        }

        let document = json!({
            "id": report.id,
            "title": report.title,
            "description": report.description,
            "parameters": report.parameters,
            "requested_by": report.created_by,
            "requested_at": report.created_at,
            "rendered_at": Utc::now(),
        });
        let content = serde_json::to_vec_pretty(&document)
            .map_err(|e| GeneratorError::failed(e.to_string()))?;

        tokio::task::yield_now().await;
        if cx.is_cancelled() {
            return Err(GeneratorError::Canceled);
        }

        Ok(GeneratedFile {
            content: Bytes::from(content),
            filename: format!("{}.{}", sanitize_title(&report.title), self.file_extension()),
        })
    }

    fn mime_type(&self) -> &str {
        "application/json"
    }

    fn file_extension(&self) -> &str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::NewReport;
    use repgen_shared::types::ReportId;

    fn report() -> Report {
        NewReport::builder()
            .with_title("Stock levels")
            .with_created_by("alice")
            .add_parameter("warehouse", "north")
            .build()
            .expect("valid input")
            .into_report(ReportId::new(), Utc::now())
    }

    #[tokio::test]
    async fn test_generates_json_document() {
        let report = report();
        let file = JsonReportGenerator::new()
            .generate(&report, &CancellationToken::new())
            .await
            .expect("generate");

        assert_eq!(file.filename, "Stock_levels.json");
        let doc: serde_json::Value = serde_json::from_slice(&file.content).expect("valid json");
        assert_eq!(doc["title"], "Stock levels");
        assert_eq!(doc["parameters"]["warehouse"], "north");
        assert_eq!(doc["id"], report.id.to_string());
    }

    #[tokio::test]
    async fn test_canceled_token_aborts() {
        let cx = CancellationToken::new();
        cx.cancel();
        let err = JsonReportGenerator::new()
            .generate(&report(), &cx)
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::Canceled));
    }

    #[test]
    fn test_mime_type_and_extension() {
        let generator = JsonReportGenerator::new();
        assert_eq!(generator.mime_type(), "application/json");
        assert_eq!(generator.file_extension(), "json");
    }
}
