//! Fault-tolerant operation execution for multi-agent coordination.
//!
//! Operations run through a per-key circuit breaker and a retry loop; failures
//! are classified by severity and handed to a recovery strategy. A background
//! health monitor watches the error rate, and a resilient store keeps working
//! in memory when its backend does not.

pub mod circuit_breaker;
pub mod classification;
pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod manager;
pub mod metrics;
pub mod models;
pub mod operations;
pub mod persistence;
pub mod recovery;
pub mod resources;
pub mod retry;

pub use error::{AppError, Result};
pub use manager::{ErrorHandlingManager, ErrorHandlingManagerConfig};
