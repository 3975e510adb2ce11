//! Storage decorators.
//!
//! Each middleware holds the inner [`Storage`](super::Storage) and implements
//! the same trait, so layers compose freely. Production code uses the fixed
//! order built by [`StorageBuilder`](super::StorageBuilder):
//! `Logging -> Retry -> Validation -> backend`.

mod logging;
mod retry;
mod validation;

pub use logging::LoggingMiddleware;
pub use retry::{RetryMiddleware, RetryPredicate};
pub use validation::ValidationMiddleware;
