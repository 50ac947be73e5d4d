//! Per-operation-key circuit breakers.
//!
//! This module provides the circuit breaker state machine used by the error
//! handling manager:
//! - One breaker per `component:operation` key, created lazily in a registry
//! - Admission, outcome recording and statistics applied under one lock per key
//! - Lazy Open -> HalfOpen transition once the recovery timeout elapses
//! - Prometheus metrics for calls and transitions
//!
//! # Circuit Breaker States
//!
//! - **Closed**: Normal operation, requests pass through, failures are counted
//! - **Open**: Fast-fail mode, requests are rejected without invoking the operation
//! - **Half-Open**: Trial mode; one failure reopens, `required_half_open_successes`
//!   consecutive successes close
//!
//! # Example
//!
//! ```no_run
//! use agent_resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use agent_resilience::error::AppError;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AppError> {
//!     let config = CircuitBreakerConfig::builder()
//!         .failure_threshold(5)
//!         .recovery_timeout(std::time::Duration::from_secs(30))
//!         .build()?;
//!
//!     let breaker = CircuitBreaker::new("db:write", config);
//!     let value = breaker.call(|| async { Ok::<_, AppError>(42) }).await?;
//!     assert_eq!(value, 42);
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod registry;
mod state;

pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use core::{CircuitBreaker, CircuitBreakerStats};
pub use registry::{CircuitBreakerRegistry, StateCount};
pub use state::{BreakerCounters, CircuitBreakerState, StateData, StateTransition};
