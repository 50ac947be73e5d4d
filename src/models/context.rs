use crate::models::ErrorCategory;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Per-call context: drives classification and circuit breaker keying
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub category: ErrorCategory,
    pub component: String,
    pub operation: String,
    /// Groups related errors across retries and escalation
    pub correlation_id: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    /// Stops the retry loop from issuing new attempts once cancelled
    pub cancellation: Option<CancellationToken>,
}

impl OperationContext {
    pub fn new(
        category: ErrorCategory,
        component: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            category,
            component: component.into(),
            operation: operation.into(),
            correlation_id: None,
            metadata: HashMap::new(),
            cancellation: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Circuit breaker key: `component:operation`
    pub fn breaker_key(&self) -> String {
        format!("{}:{}", self.component, self.operation)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map(|token| token.is_cancelled())
            .unwrap_or(false)
    }
}
