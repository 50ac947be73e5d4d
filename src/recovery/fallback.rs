//! Component-specific fallbacks, registered by the caller.

use crate::error::{AppError, Result};
use crate::models::OperationContext;
use async_trait::async_trait;
use serde_json::json;

/// Substitute result plus what it cannot do
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackResult {
    pub value: serde_json::Value,
    pub limitations: Vec<String>,
}

/// Produces a substitute result for a failed operation of one component
#[async_trait]
pub trait FallbackProvider: Send + Sync {
    async fn fallback(&self, error: &AppError, context: &OperationContext) -> Result<FallbackResult>;
}

/// Remote tool calls answered in local mode
#[derive(Debug, Default, Clone)]
pub struct LocalToolsFallback;

#[async_trait]
impl FallbackProvider for LocalToolsFallback {
    async fn fallback(&self, error: &AppError, context: &OperationContext) -> Result<FallbackResult> {
        Ok(FallbackResult {
            value: json!({
                "mode": "local",
                "operation": context.operation,
                "reason": error.to_string(),
            }),
            limitations: vec![
                "Remote tool execution unavailable".to_string(),
                "Results are computed locally and may be incomplete".to_string(),
                "Coordination state is not shared with other processes".to_string(),
            ],
        })
    }
}

/// Persistence served from process memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryPersistenceFallback;

#[async_trait]
impl FallbackProvider for InMemoryPersistenceFallback {
    async fn fallback(&self, error: &AppError, context: &OperationContext) -> Result<FallbackResult> {
        Ok(FallbackResult {
            value: json!({
                "mode": "in_memory",
                "operation": context.operation,
                "reason": error.to_string(),
            }),
            limitations: vec![
                "Data will not persist across restarts".to_string(),
                "Storage is limited to the current session".to_string(),
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ErrorCategory;

    #[tokio::test]
    async fn test_local_tools_fallback() {
        let ctx = OperationContext::new(ErrorCategory::Protocol, "mcp-tools", "agent_list");
        let result = LocalToolsFallback
            .fallback(&AppError::Operation("remote down".to_string()), &ctx)
            .await
            .unwrap();

        assert_eq!(result.value["mode"], "local");
        assert_eq!(result.value["operation"], "agent_list");
        assert!(!result.limitations.is_empty());
    }
}
