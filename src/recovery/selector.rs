use crate::error::{AppError, Result};
use crate::events::{EventBus, ResilienceEvent};
use crate::metrics::RESILIENCE_METRICS;
use crate::models::{ErrorCategory, ErrorRecord, OperationContext, RecoveryOutcome, Severity};
use crate::recovery::{FallbackProvider, RecoveryStrategy};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Message fragments that mark a failure as a retry escalation
pub const RETRY_ESCALATION_PATTERNS: &[&str] = &[
    "network",
    "timeout",
    "timed out",
    "econnrefused",
    "connection refused",
];

/// Categories that degrade instead of failing
const DEGRADABLE_CATEGORIES: &[ErrorCategory] = &[ErrorCategory::Native, ErrorCategory::Compute];

/// Capabilities switched off when a category degrades
pub fn disabled_capabilities_for(category: ErrorCategory) -> Vec<String> {
    let capabilities: &[&str] = match category {
        ErrorCategory::Native => &[
            "SIMD acceleration",
            "WASM-accelerated inference",
            "Native performance optimizations",
        ],
        ErrorCategory::Compute => &[
            "Neural network training",
            "Pattern recognition",
            "Cognitive diversity analysis",
        ],
        _ => &["Non-essential features"],
    };
    capabilities.iter().map(|c| c.to_string()).collect()
}

/// Picks and runs a recovery strategy for a failed operation
pub struct RecoveryStrategySelector {
    fallbacks: DashMap<String, Arc<dyn FallbackProvider>>,
    overrides: DashMap<String, RecoveryStrategy>,
    events: EventBus,
}

impl RecoveryStrategySelector {
    pub fn new(events: EventBus) -> Self {
        Self {
            fallbacks: DashMap::new(),
            overrides: DashMap::new(),
            events,
        }
    }

    /// Register the fallback used for `component`
    pub fn register_fallback(&self, component: impl Into<String>, provider: Arc<dyn FallbackProvider>) {
        let component = component.into();
        info!(component = %component, "Registered fallback provider");
        self.fallbacks.insert(component, provider);
    }

    /// Force a strategy for `component`; CRITICAL severity still wins
    pub fn register_override(&self, component: impl Into<String>, strategy: RecoveryStrategy) {
        let component = component.into();
        info!(component = %component, strategy = %strategy, "Registered strategy override");
        self.overrides.insert(component, strategy);
    }

    /// Selection table, first match wins
    pub fn select(
        &self,
        error: &AppError,
        context: &OperationContext,
        severity: Severity,
    ) -> RecoveryStrategy {
        if severity == Severity::Critical {
            return RecoveryStrategy::ManualIntervention;
        }

        if let Some(strategy) = self.overrides.get(&context.component) {
            return *strategy.value();
        }

        let text = error.classification_text();
        if RETRY_ESCALATION_PATTERNS.iter().any(|p| text.contains(p)) {
            return RecoveryStrategy::Retry;
        }

        if context.category == ErrorCategory::Persistence {
            return RecoveryStrategy::CircuitBreaker;
        }

        if DEGRADABLE_CATEGORIES.contains(&context.category) {
            return RecoveryStrategy::GracefulDegradation;
        }

        RecoveryStrategy::Fallback
    }

    /// Run `strategy`. `Err` means recovery failed and the caller must escalate.
    pub async fn execute(
        &self,
        strategy: RecoveryStrategy,
        error: &AppError,
        record: &ErrorRecord,
        context: &OperationContext,
    ) -> Result<RecoveryOutcome> {
        let result = self.run(strategy, error, record, context).await;

        let outcome = if result.is_ok() { "recovered" } else { "failed" };
        RESILIENCE_METRICS
            .recovery_executions
            .with_label_values(&[&strategy.to_string(), outcome])
            .inc();

        result
    }

    async fn run(
        &self,
        strategy: RecoveryStrategy,
        error: &AppError,
        record: &ErrorRecord,
        context: &OperationContext,
    ) -> Result<RecoveryOutcome> {
        match strategy {
            RecoveryStrategy::Retry => Err(AppError::Recovery(format!(
                "retry budget exhausted for '{}'",
                context.breaker_key()
            ))),

            RecoveryStrategy::Fallback => {
                let provider = self
                    .fallbacks
                    .get(&context.component)
                    .map(|entry| entry.value().clone())
                    .ok_or_else(|| {
                        AppError::Recovery(format!(
                            "no fallback registered for component '{}'",
                            context.component
                        ))
                    })?;

                let result = provider.fallback(error, context).await?;
                info!(
                    component = %context.component,
                    operation = %context.operation,
                    "Serving fallback result"
                );
                Ok(RecoveryOutcome::Fallback {
                    component: context.component.clone(),
                    value: result.value,
                    limitations: result.limitations,
                })
            }

            RecoveryStrategy::CircuitBreaker => Err(AppError::Recovery(format!(
                "'{}' is considered down, failing fast",
                context.breaker_key()
            ))),

            RecoveryStrategy::GracefulDegradation => {
                let disabled_capabilities = disabled_capabilities_for(context.category);
                warn!(
                    component = %context.component,
                    disabled = ?disabled_capabilities,
                    "Continuing with degraded functionality"
                );
                Ok(RecoveryOutcome::Degraded {
                    component: context.component.clone(),
                    disabled_capabilities,
                })
            }

            RecoveryStrategy::Restart => {
                warn!(component = %context.component, "Requesting component restart");
                self.events.emit(ResilienceEvent::Restart {
                    component: context.component.clone(),
                    reason: error.to_string(),
                    correlation_id: record.correlation_id.clone(),
                    timestamp: Utc::now(),
                });
                Ok(RecoveryOutcome::RestartRequested {
                    component: context.component.clone(),
                })
            }

            RecoveryStrategy::ManualIntervention => {
                error!(
                    component = %context.component,
                    operation = %context.operation,
                    correlation_id = %record.correlation_id,
                    error = %error,
                    "Manual intervention required"
                );
                self.events.emit(ResilienceEvent::ManualIntervention {
                    record: Box::new(record.clone()),
                    reason: error.to_string(),
                });
                Err(AppError::ManualIntervention {
                    component: context.component.clone(),
                    message: error.to_string(),
                })
            }
        }
    }
}
