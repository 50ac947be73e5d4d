//! Recovery strategy selection and execution.
//!
//! After the retry budget is spent, a failed call is routed to exactly one
//! [`RecoveryStrategy`]. Strategies either produce a flagged substitute
//! result (fallback, degraded, restart acknowledgement) or fail, in which case
//! the manager escalates.

mod fallback;
mod selector;
mod strategy;

pub use fallback::{
    FallbackProvider, FallbackResult, InMemoryPersistenceFallback, LocalToolsFallback,
};
pub use selector::{disabled_capabilities_for, RecoveryStrategySelector, RETRY_ESCALATION_PATTERNS};
pub use strategy::RecoveryStrategy;
