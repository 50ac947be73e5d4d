//! Validated, deadline-bound execution of coordination tool operations.
//!
//! Each call goes through parameter validation, pre-flight checks, the
//! error handling manager under a per-type deadline, and a result shape
//! check, and is then recorded in a bounded history.

pub mod rules;
mod preflight;
mod timeout;
mod types;
mod wrapper;

pub use preflight::{DependencyProbe, PreflightChecker};
pub use timeout::with_timeout;
pub use types::{OperationType, PreflightRequirements};
pub use wrapper::{
    OperationCounters, OperationMetrics, OperationRecord, RobustOperationWrapper, WrapperConfig,
};
