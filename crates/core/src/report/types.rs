//! Report domain types and the status state machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use repgen_shared::types::ReportId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use super::error::ReportError;

/// Report lifecycle status.
///
/// The valid transitions are:
/// - Pending → Processing, Canceled
/// - Processing → Completed, Failed, Canceled
/// - Failed → Pending (retry)
/// - Canceled → Pending (resume)
///
/// Completed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// Waiting for a worker.
    Pending,
    /// A worker is generating the file.
    Processing,
    /// The file was generated and stored.
    Completed,
    /// Generation or storage failed.
    Failed,
    /// Generation was canceled.
    Canceled,
}

impl ReportStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Processing,
        Self::Completed,
        Self::Failed,
        Self::Canceled,
    ];

    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "canceled" | "cancelled" => Some(Self::Canceled),
            _ => None,
        }
    }

    /// Returns true if no worker will touch the report again without an
    /// explicit retry.
    #[must_use]
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    /// Returns true if `self -> to` is an edge of the lifecycle.
    #[must_use]
    pub fn can_transition_to(&self, to: Self) -> bool {
        is_valid_transition(*self, to)
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ReportError::InvalidStatus(s.to_string()))
    }
}

/// Checks a status change against the lifecycle table.
#[must_use]
pub fn is_valid_transition(from: ReportStatus, to: ReportStatus) -> bool {
    use ReportStatus::{Canceled, Completed, Failed, Pending, Processing};

    matches!(
        (from, to),
        (Pending, Processing | Canceled)
            | (Processing, Completed | Failed | Canceled)
            | (Failed | Canceled, Pending)
    )
}

/// Arbitrary JSON parameters attached to a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportParameters(Map<String, Value>);

impl ReportParameters {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns `key` as a string slice, if it is one.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Returns `key` as an integer, if it is one.
    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    /// Sets `key`, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Iterates over parameter names.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns true if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the parameters as a JSON object value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for ReportParameters {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for ReportParameters {
    type Error = ReportError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            _ => Err(ReportError::Validation(
                "parameters must be a JSON object".to_string(),
            )),
        }
    }
}

/// A requested document and its generation lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Report {
    /// Report ID.
    pub id: ReportId,
    /// Lifecycle status.
    pub status: ReportStatus,
    /// Title.
    #[validate(length(min = 1, max = 255, message = "title must be between 1 and 255 characters"))]
    pub title: String,
    /// Free-form description.
    #[validate(length(max = 1000, message = "description must be at most 1000 characters"))]
    pub description: String,
    /// Storage key of the generated file. Only trustworthy while `Completed`.
    #[validate(length(min = 1, max = 255, message = "file key must be between 1 and 255 characters"))]
    pub file_key: Option<String>,
    /// Generator parameters.
    pub parameters: ReportParameters,
    /// Who requested the report.
    #[validate(length(min = 1, max = 255, message = "created_by must be between 1 and 255 characters"))]
    pub created_by: String,
    /// Who last changed the report.
    #[validate(length(min = 1, max = 255, message = "updated_by must be between 1 and 255 characters"))]
    pub updated_by: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last change time.
    pub updated_at: DateTime<Utc>,
    /// Time of the first transition into `Completed`.
    pub generated_at: Option<DateTime<Utc>>,
}

impl Report {
    /// Moves the report to `new_status` on behalf of `actor`.
    ///
    /// Stamps `updated_by`/`updated_at`, and `generated_at` on the first
    /// entry into `Completed`. Touches nothing outside the entity.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` if the edge is not in the lifecycle table.
    pub fn set_status(&mut self, new_status: ReportStatus, actor: &str) -> Result<(), ReportError> {
        if !self.status.can_transition_to(new_status) {
            return Err(ReportError::invalid_transition(self.status, new_status));
        }

        let now = Utc::now();
        self.status = new_status;
        self.updated_by = actor.to_string();
        self.updated_at = now;
        if new_status == ReportStatus::Completed && self.generated_at.is_none() {
            self.generated_at = Some(now);
        }
        Ok(())
    }

    /// Parses `new_status` and applies it with [`Self::set_status`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidStatus` for an unknown value, otherwise as
    /// [`Self::set_status`].
    pub fn set_status_str(&mut self, new_status: &str, actor: &str) -> Result<(), ReportError> {
        let status = new_status.parse::<ReportStatus>()?;
        self.set_status(status, actor)
    }

    /// Checks all field bounds.
    ///
    /// # Errors
    ///
    /// Returns `Validation` listing every violated bound.
    pub fn validate_fields(&self) -> Result<(), ReportError> {
        if self.title.trim().is_empty() {
            return Err(ReportError::Validation("title is required".to_string()));
        }
        self.validate().map_err(ReportError::from)
    }

    /// Applies a partial update, validating any status change through the
    /// lifecycle and re-checking field bounds.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` or `Validation`.
    pub fn apply_changes(&mut self, changes: &ReportChanges) -> Result<(), ReportError> {
        if let Some(status) = changes.status
            && status != self.status
        {
            self.set_status(status, &changes.updated_by)?;
        }
        if let Some(title) = &changes.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = &changes.description {
            self.description = description.trim().to_string();
        }
        if let Some(parameters) = &changes.parameters {
            self.parameters = parameters.clone();
        }
        self.updated_by.clone_from(&changes.updated_by);
        self.updated_at = Utc::now();
        self.validate_fields()
    }

    /// Records the generated file key.
    pub fn set_file_key(&mut self, key: impl Into<String>) {
        self.file_key = Some(key.into());
        self.updated_at = Utc::now();
    }

    /// Returns true if a non-empty file key is set.
    #[must_use]
    pub fn has_file(&self) -> bool {
        self.file_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Returns true if the report is pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == ReportStatus::Pending
    }

    /// Returns true if the report is being generated.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.status == ReportStatus::Processing
    }

    /// Returns true if the report is completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == ReportStatus::Completed
    }

    /// Returns true if generation failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == ReportStatus::Failed
    }

    /// Returns true if generation was canceled.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.status == ReportStatus::Canceled
    }
}

/// Input for creating a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewReport {
    /// Title.
    #[validate(length(min = 1, max = 255, message = "title must be between 1 and 255 characters"))]
    pub title: String,
    /// Description.
    #[validate(length(max = 1000, message = "description must be at most 1000 characters"))]
    pub description: String,
    /// Generator parameters.
    pub parameters: ReportParameters,
    /// Who requests the report.
    #[validate(length(min = 1, max = 255, message = "created_by must be between 1 and 255 characters"))]
    pub created_by: String,
}

impl NewReport {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> NewReportBuilder {
        NewReportBuilder::default()
    }

    /// Checks all field bounds.
    ///
    /// # Errors
    ///
    /// Returns `Validation` listing every violated bound.
    pub fn validate_fields(&self) -> Result<(), ReportError> {
        if self.title.trim().is_empty() {
            return Err(ReportError::Validation("title is required".to_string()));
        }
        if self.created_by.trim().is_empty() {
            return Err(ReportError::Validation("created_by is required".to_string()));
        }
        self.validate().map_err(ReportError::from)
    }

    /// Materialises a pending report with the given identity and time.
    #[must_use]
    pub fn into_report(self, id: ReportId, now: DateTime<Utc>) -> Report {
        Report {
            id,
            status: ReportStatus::Pending,
            title: self.title,
            description: self.description,
            file_key: None,
            parameters: self.parameters,
            updated_by: self.created_by.clone(),
            created_by: self.created_by,
            created_at: now,
            updated_at: now,
            generated_at: None,
        }
    }
}

/// Builder for [`NewReport`]. Text fields are trimmed.
#[derive(Debug, Default)]
pub struct NewReportBuilder {
    title: String,
    description: String,
    parameters: ReportParameters,
    created_by: String,
}

impl NewReportBuilder {
    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into().trim().to_string();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into().trim().to_string();
        self
    }

    /// Sets the requesting identity.
    #[must_use]
    pub fn with_created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into().trim().to_string();
        self
    }

    /// Replaces all parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: ReportParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Adds one parameter.
    #[must_use]
    pub fn add_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.set(key, value);
        self
    }

    /// Validates and returns the input.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if a bound is violated.
    pub fn build(self) -> Result<NewReport, ReportError> {
        let report = NewReport {
            title: self.title,
            description: self.description,
            parameters: self.parameters,
            created_by: self.created_by,
        };
        report.validate_fields()?;
        Ok(report)
    }
}

/// Partial update of a report. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportChanges {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New parameters.
    pub parameters: Option<ReportParameters>,
    /// New status, checked against the lifecycle.
    pub status: Option<ReportStatus>,
    /// Who makes the change.
    pub updated_by: String,
}

impl ReportChanges {
    /// Starts an empty change set on behalf of `updated_by`.
    #[must_use]
    pub fn by(updated_by: impl Into<String>) -> Self {
        Self {
            updated_by: updated_by.into(),
            ..Self::default()
        }
    }

    /// Sets the title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the parameters.
    #[must_use]
    pub fn parameters(mut self, parameters: ReportParameters) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Sets the status.
    #[must_use]
    pub fn status(mut self, status: ReportStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Parses and sets the status.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStatus` for an unknown value.
    pub fn status_str(self, status: &str) -> Result<Self, ReportError> {
        Ok(self.status(status.parse()?))
    }
}

/// Sort column for report listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSortField {
    /// Creation time.
    #[default]
    CreatedAt,
    /// Last change time.
    UpdatedAt,
    /// Title.
    Title,
    /// Status.
    Status,
}

impl ReportSortField {
    /// Parses a column name, falling back to `created_at`.
    #[must_use]
    pub fn parse_or_default(s: &str) -> Self {
        match s {
            "updated_at" => Self::UpdatedAt,
            "title" => Self::Title,
            "status" => Self::Status,
            _ => Self::CreatedAt,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending.
    Asc,
    /// Descending.
    #[default]
    Desc,
}

/// Repository-level listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    /// Only reports with this status.
    pub status: Option<ReportStatus>,
    /// Case-insensitive match on title or description.
    pub search: Option<String>,
    /// Sort column.
    pub sort_by: ReportSortField,
    /// Sort direction.
    pub sort_dir: SortDirection,
    /// Rows to skip.
    pub offset: u64,
    /// Rows to return.
    pub limit: u64,
}

impl ReportFilter {
    /// Returns true if `report` passes the status and search filters.
    #[must_use]
    pub fn matches(&self, report: &Report) -> bool {
        if self.status.is_some_and(|s| s != report.status) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                report.title.to_lowercase().contains(&term)
                    || report.description.to_lowercase().contains(&term)
            }
            _ => true,
        }
    }
}
