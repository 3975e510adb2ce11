//! Background task processing.
//!
//! A [`BackgroundProcessor`] accepts [`Task`]s into a bounded queue and runs
//! each one on its own tokio task through the [`TaskHandler`] registered for
//! its [`TaskType`]. Outstanding tasks are tracked in a [`TaskRegistry`] so
//! they can be canceled by id.

mod background;
pub mod error;
pub mod registry;
pub mod types;

pub use background::{BackgroundProcessor, TaskHandler};
pub use error::ProcessorError;
pub use registry::TaskRegistry;
pub use types::{Priority, Task, TaskId, TaskStatus, TaskType};
