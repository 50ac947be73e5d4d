//! Bounded retries with exponential backoff and jitter.
//!
//! The retry manager sits underneath the circuit breaker: one breaker-level
//! attempt covers a whole retry sequence. Only errors matched by the
//! [`RetryPolicy`] allow-list are retried; everything else fails fast.

mod config;
mod manager;
mod policy;

pub use config::RetryConfig;
pub use manager::RetryManager;
pub use policy::{RetryPolicy, NON_RETRYABLE_CODES, RETRYABLE_CODES, RETRYABLE_PATTERNS};
