use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Recovery strategies, in no particular order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryStrategy {
    /// Escalation marker: the retry budget was already spent underneath
    Retry,
    /// Component-specific substitute result
    Fallback,
    /// Fail fast and rely on the breaker
    CircuitBreaker,
    /// Continue with a reduced capability set
    GracefulDegradation,
    /// Ask the external supervisor to restart the component
    Restart,
    /// Alert an operator and fail
    ManualIntervention,
}

impl RecoveryStrategy {
    /// Whether executing this strategy can ever yield a result
    pub fn can_succeed(&self) -> bool {
        matches!(
            self,
            RecoveryStrategy::Fallback
                | RecoveryStrategy::GracefulDegradation
                | RecoveryStrategy::Restart
        )
    }
}
