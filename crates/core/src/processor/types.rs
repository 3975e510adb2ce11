//! Task types exchanged between callers and the processor.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a task. One outstanding task per id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wraps `id`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Open tag selecting the handler for a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskType(String);

impl TaskType {
    /// Tag for report generation tasks.
    pub const REPORT_GENERATION: &'static str = "report_generation";

    /// Wraps `tag`.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The report generation tag.
    #[must_use]
    pub fn report_generation() -> Self {
        Self::new(Self::REPORT_GENERATION)
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Task priority. Accepted and stored; dispatch is FIFO.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Background housekeeping.
    Low,
    /// Regular work.
    #[default]
    Normal,
    /// User is waiting.
    High,
    /// Must run as soon as possible.
    Critical,
}

/// Observable state of a tracked task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Accepted, waiting in the queue.
    Pending,
    /// An execution unit is running it.
    Running,
}

/// A unit of background work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Task id.
    pub id: TaskId,
    /// Handler selector.
    pub task_type: TaskType,
    /// Opaque payload for the handler.
    pub data: Value,
    /// Priority.
    pub priority: Priority,
    /// Deadline for one execution.
    pub timeout: Duration,
    /// Submission time.
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Default execution deadline: 30 minutes.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

    /// Creates a normal-priority task with the default timeout.
    #[must_use]
    pub fn new(id: TaskId, task_type: TaskType, data: Value) -> Self {
        Self {
            id,
            task_type,
            data,
            priority: Priority::Normal,
            timeout: Self::DEFAULT_TIMEOUT,
            created_at: Utc::now(),
        }
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the execution deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
