use serde::{Deserialize, Serialize};

/// What a caller of `wrap_operation` receives on a non-error path
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum OperationOutcome<T> {
    /// The operation itself succeeded
    Completed(T),
    /// A component-specific substitute stood in for the operation
    Fallback {
        component: String,
        value: serde_json::Value,
        limitations: Vec<String>,
    },
    /// The caller continues with reduced functionality
    Degraded {
        component: String,
        disabled_capabilities: Vec<String>,
    },
    /// A restart was requested from the external supervisor
    RestartRequested { component: String },
}

impl<T> OperationOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, OperationOutcome::Completed(_))
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, OperationOutcome::Fallback { .. })
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, OperationOutcome::Degraded { .. })
    }

    /// The operation's own result, if it completed
    pub fn into_completed(self) -> Option<T> {
        match self {
            OperationOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }

    /// Human-readable list of what is missing from this result
    pub fn limitations(&self) -> Vec<String> {
        match self {
            OperationOutcome::Completed(_) => Vec::new(),
            OperationOutcome::Fallback { limitations, .. } => limitations.clone(),
            OperationOutcome::Degraded {
                disabled_capabilities,
                ..
            } => disabled_capabilities.clone(),
            OperationOutcome::RestartRequested { component } => {
                vec![format!("{} is restarting", component)]
            }
        }
    }
}

/// Result produced by a recovery strategy, before it is typed for the caller
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    Fallback {
        component: String,
        value: serde_json::Value,
        limitations: Vec<String>,
    },
    Degraded {
        component: String,
        disabled_capabilities: Vec<String>,
    },
    RestartRequested {
        component: String,
    },
}

impl<T> From<RecoveryOutcome> for OperationOutcome<T> {
    fn from(outcome: RecoveryOutcome) -> Self {
        match outcome {
            RecoveryOutcome::Fallback {
                component,
                value,
                limitations,
            } => OperationOutcome::Fallback {
                component,
                value,
                limitations,
            },
            RecoveryOutcome::Degraded {
                component,
                disabled_capabilities,
            } => OperationOutcome::Degraded {
                component,
                disabled_capabilities,
            },
            RecoveryOutcome::RestartRequested { component } => {
                OperationOutcome::RestartRequested { component }
            }
        }
    }
}
