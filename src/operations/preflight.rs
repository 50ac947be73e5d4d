use crate::error::{AppError, Result};
use crate::operations::OperationType;
use crate::resources::ResourceProbe;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// State of the coordination runtime the operations act on
#[async_trait]
pub trait DependencyProbe: Send + Sync {
    /// Whether the swarm has been initialized
    async fn is_initialized(&self) -> bool;

    /// Number of agents currently idle
    async fn idle_agent_count(&self) -> usize;
}

/// Checks run before an operation is attempted
pub struct PreflightChecker {
    dependency: Arc<dyn DependencyProbe>,
    resources: Arc<dyn ResourceProbe>,
    max_memory_ratio: f64,
}

impl PreflightChecker {
    pub fn new(
        dependency: Arc<dyn DependencyProbe>,
        resources: Arc<dyn ResourceProbe>,
        max_memory_ratio: f64,
    ) -> Self {
        Self {
            dependency,
            resources,
            max_memory_ratio,
        }
    }

    pub async fn check(&self, operation: OperationType) -> Result<()> {
        let requirements = operation.preflight();

        if requirements.swarm_initialized && !self.dependency.is_initialized().await {
            return Err(AppError::PreconditionFailed(format!(
                "{}: swarm is not initialized, run swarm_init first",
                operation
            )));
        }

        let usage = self.resources.sample();
        let ratio = usage.memory_ratio();
        if ratio >= self.max_memory_ratio {
            warn!(
                operation = %operation,
                memory_ratio = ratio,
                ceiling = self.max_memory_ratio,
                "Refusing operation, memory usage above ceiling"
            );
            return Err(AppError::ResourceExhausted(format!(
                "{}: memory usage {:.1}% is above the {:.1}% ceiling",
                operation,
                ratio * 100.0,
                self.max_memory_ratio * 100.0
            )));
        }

        if requirements.idle_agent && self.dependency.idle_agent_count().await == 0 {
            return Err(AppError::PreconditionFailed(format!(
                "{}: no idle agents available",
                operation
            )));
        }

        debug!(operation = %operation, "Pre-flight checks passed");
        Ok(())
    }
}
