use crate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use crate::classification::ErrorClassifier;
use crate::error::{AppError, Result};
use crate::events::{EventBus, EventSubscriber, ResilienceEvent};
use crate::health::{HealthConfig, HealthMonitor, HealthStatus};
use crate::manager::{ErrorLog, ErrorStatistics, Recommendation};
use crate::metrics::RESILIENCE_METRICS;
use crate::models::{ErrorRecord, OperationContext, OperationOutcome, Severity};
use crate::recovery::{FallbackProvider, RecoveryStrategy, RecoveryStrategySelector};
use crate::retry::{RetryConfig, RetryManager};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Settings for one [`ErrorHandlingManager`]
#[derive(Debug, Clone)]
pub struct ErrorHandlingManagerConfig {
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryConfig,
    pub health: HealthConfig,
    /// Capacity of the error log ring buffer
    pub max_log_size: usize,
    /// Capacity of the broadcast event channel
    pub event_capacity: usize,
}

impl ErrorHandlingManagerConfig {
    pub fn validate(&self) -> Result<()> {
        self.circuit_breaker.validate()?;
        self.retry.validate()?;
        self.health.validate()?;
        if self.max_log_size == 0 {
            return Err(AppError::Configuration(
                "max_log_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ErrorHandlingManagerConfig {
    fn default() -> Self {
        Self {
            circuit_breaker: CircuitBreakerConfig::default(),
            retry: RetryConfig::default(),
            health: HealthConfig::default(),
            max_log_size: 1000,
            event_capacity: 256,
        }
    }
}

/// Facade that runs operations through a circuit breaker and retry loop and
/// routes failures through classification and recovery.
///
/// One instance is constructed explicitly and shared (`Arc`) with every
/// consumer; there is no process-wide global.
pub struct ErrorHandlingManager {
    config: ErrorHandlingManagerConfig,
    breakers: Arc<CircuitBreakerRegistry>,
    retry: RetryManager,
    classifier: ErrorClassifier,
    selector: RecoveryStrategySelector,
    error_log: Arc<ErrorLog>,
    events: EventBus,
    health: Arc<HealthMonitor>,
}

impl ErrorHandlingManager {
    pub fn new(config: ErrorHandlingManagerConfig) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new(config.event_capacity);
        let breakers = Arc::new(CircuitBreakerRegistry::new(config.circuit_breaker.clone()));
        let error_log = Arc::new(
            ErrorLog::new(config.max_log_size)
                .with_success_retention(config.health.window.max(Duration::from_secs(3600))),
        );
        let health = Arc::new(HealthMonitor::new(
            config.health.clone(),
            error_log.clone(),
            breakers.clone(),
            events.clone(),
        ));

        info!(
            failure_threshold = config.circuit_breaker.failure_threshold,
            max_retries = config.retry.max_retries,
            max_log_size = config.max_log_size,
            "Error handling manager initialized"
        );

        Ok(Self {
            retry: RetryManager::new(config.retry.clone())?,
            classifier: ErrorClassifier::new(),
            selector: RecoveryStrategySelector::new(events.clone()),
            config,
            breakers,
            error_log,
            events,
            health,
        })
    }

    pub fn config(&self) -> &ErrorHandlingManagerConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    pub fn error_log(&self) -> &Arc<ErrorLog> {
        &self.error_log
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    pub fn selector(&self) -> &RecoveryStrategySelector {
        &self.selector
    }

    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        self.events.register(subscriber);
    }

    pub fn register_fallback(&self, component: impl Into<String>, provider: Arc<dyn FallbackProvider>) {
        self.selector.register_fallback(component, provider);
    }

    pub fn register_strategy_override(&self, component: impl Into<String>, strategy: RecoveryStrategy) {
        self.selector.register_override(component, strategy);
    }

    /// Use a dedicated breaker config for `component:operation`; only takes
    /// effect if the breaker has not been created yet
    pub fn configure_breaker(&self, key: &str, config: CircuitBreakerConfig) {
        self.breakers.get_or_create_with(key, config);
    }

    /// Run `operation` under the breaker for `context.breaker_key()`, retrying
    /// retryable failures underneath it. Failures are logged, classified and
    /// handed to a recovery strategy; if that strategy fails too the caller
    /// gets an [`AppError::Escalated`] carrying both errors.
    pub async fn wrap_operation<F, Fut, T>(
        &self,
        operation: F,
        context: OperationContext,
    ) -> Result<OperationOutcome<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let correlation_id = context
            .correlation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let operation_id = Uuid::new_v4();
        let key = context.breaker_key();
        let breaker = self.breakers.get_or_create(&key);
        let started = Instant::now();

        let retry = &self.retry;
        let cancellation = context.cancellation.as_ref();
        let name = key.as_str();

        let result = breaker
            .call(|| retry.execute_with_cancellation(operation, name, cancellation))
            .await;

        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(value) => {
                self.error_log.record_success();
                debug!(
                    key = %key,
                    correlation_id = %correlation_id,
                    elapsed_ms,
                    "Operation succeeded"
                );
                Ok(OperationOutcome::Completed(value))
            }
            Err(err) => {
                self.handle_failure(err, &context, &correlation_id, operation_id, elapsed_ms)
                    .await
            }
        }
    }

    async fn handle_failure<T>(
        &self,
        err: AppError,
        context: &OperationContext,
        correlation_id: &str,
        operation_id: Uuid,
        elapsed_ms: u64,
    ) -> Result<OperationOutcome<T>> {
        let severity = self.classifier.classify(&err, context);
        let record = ErrorRecord::new(&err, context, correlation_id, operation_id, severity, elapsed_ms);
        self.log_error(record.clone());

        if err.is_caller_error() || matches!(err, AppError::Cancelled(_)) {
            return Err(err);
        }

        let strategy = self.selector.select(&err, context, severity);
        info!(
            component = %context.component,
            operation = %context.operation,
            correlation_id = %correlation_id,
            severity = %severity,
            strategy = %strategy,
            "Selected recovery strategy"
        );

        if strategy == RecoveryStrategy::CircuitBreaker && matches!(err, AppError::CircuitOpen { .. }) {
            return Err(err);
        }

        match self.selector.execute(strategy, &err, &record, context).await {
            Ok(outcome) => Ok(outcome.into()),
            Err(recovery_err) => Err(self.escalate(err, recovery_err, context, correlation_id, operation_id, elapsed_ms)),
        }
    }

    fn escalate(
        &self,
        original: AppError,
        recovery: AppError,
        context: &OperationContext,
        correlation_id: &str,
        operation_id: Uuid,
        elapsed_ms: u64,
    ) -> AppError {
        error!(
            component = %context.component,
            operation = %context.operation,
            correlation_id = %correlation_id,
            original = %original,
            recovery = %recovery,
            "Recovery failed, escalating"
        );

        self.events.emit(ResilienceEvent::CriticalError {
            correlation_id: correlation_id.to_string(),
            component: context.component.clone(),
            operation: context.operation.clone(),
            original_error: original.to_string(),
            recovery_error: recovery.to_string(),
            timestamp: Utc::now(),
        });

        let escalated = AppError::Escalated {
            original: Box::new(original),
            recovery: Box::new(recovery),
            correlation_id: correlation_id.to_string(),
        };

        let record = ErrorRecord::new(
            &escalated,
            context,
            correlation_id,
            operation_id,
            Severity::Critical,
            elapsed_ms,
        );
        self.log_error(record);

        escalated
    }

    fn log_error(&self, record: ErrorRecord) {
        RESILIENCE_METRICS
            .errors_total
            .with_label_values(&[&record.severity.to_string(), &record.category.to_string()])
            .inc();

        if record.severity.is_urgent() {
            warn!(
                id = %record.id,
                correlation_id = %record.correlation_id,
                severity = %record.severity,
                category = %record.category,
                component = %record.component,
                operation = %record.operation,
                code = %record.error.code,
                message = %record.error.message,
                "Operation error recorded"
            );
        } else {
            info!(
                id = %record.id,
                correlation_id = %record.correlation_id,
                severity = %record.severity,
                component = %record.component,
                code = %record.error.code,
                "Operation error recorded"
            );
        }

        self.error_log.append(record.clone());
        self.events.emit(ResilienceEvent::Error(record));
    }

    /// Counts over the trailing `window`
    pub fn get_error_statistics(&self, window: Duration) -> ErrorStatistics {
        let since = Utc::now()
            - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::hours(1));
        let records = self.error_log.records_since(since);
        let successes = self.error_log.successes_since(since);

        let mut open = self.breakers.open_breakers();
        open.sort();

        ErrorStatistics::from_records(&records, successes, open, window.as_secs())
    }

    /// Current health, computed on demand; emits nothing
    pub fn get_health_status(&self) -> HealthStatus {
        self.health.evaluate()
    }

    /// Advice derived from the statistics of the health window
    pub fn generate_recommendations(&self) -> Vec<Recommendation> {
        self.get_error_statistics(self.config.health.window)
            .recommendations(self.config.health.max_error_rate)
    }

    pub fn health_monitor(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    pub fn start_health_monitoring(&self) {
        self.health.start();
    }

    /// Stop background work owned by the manager
    pub async fn shutdown(&self) {
        self.health.stop().await;
        info!("Error handling manager shut down");
    }
}
