//! The error handling facade and its rolling error log.

mod core;
mod error_log;
mod statistics;

pub use core::{ErrorHandlingManager, ErrorHandlingManagerConfig};
pub use error_log::ErrorLog;
pub use statistics::{ErrorStatistics, Recommendation, RecurringError};
