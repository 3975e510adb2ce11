//! Report rendering and the background work that produces report files.
//!
//! # Modules
//!
//! - `keys` - Task ids and storage key layout
//! - `generator` - Rendering contract and the JSON renderer
//! - `executor` - Task handler driving one generation run

pub mod executor;
pub mod generator;
pub mod keys;

pub use executor::{ReportGenerationHandler, SYSTEM_ACTOR, generation_task};
pub use generator::{GeneratedFile, GeneratorError, JsonReportGenerator, ReportGenerator};
pub use keys::{report_file_key, report_prefix, sanitize_title, task_id_for};
