//! Prometheus metrics for the resilience layer.
//!
//! Metrics are created lazily and registered with a caller-supplied registry
//! through [`init_metrics`]; recording works whether or not they were
//! registered.

use lazy_static::lazy_static;
use prometheus::{CounterVec, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry};

const NAMESPACE: &str = "agent_resilience";

/// Container for all resilience metrics
pub struct ResilienceMetrics {
    /// Current state of circuit breakers (0=closed, 1=open, 2=half-open)
    pub breaker_state: GaugeVec,

    /// Calls through circuit breakers by outcome (allowed/rejected/success/failure)
    pub breaker_calls: CounterVec,

    /// Circuit breaker state transitions
    pub breaker_transitions: CounterVec,

    /// Retry attempts by operation and outcome
    pub retry_attempts: CounterVec,

    /// Errors recorded by severity and category
    pub errors_total: CounterVec,

    /// Recovery strategy executions by strategy and outcome
    pub recovery_executions: CounterVec,

    /// Wrapped operation duration by operation type
    pub operation_duration: HistogramVec,

    /// Wrapped operations by type and status
    pub operations_total: CounterVec,

    /// 1 when the resilient store runs on its in-memory fallback
    pub store_degraded: Gauge,

    /// Transaction log entries by final status
    pub transactions_total: CounterVec,

    /// 1 when the last health evaluation was healthy
    pub health_status: Gauge,
}

impl ResilienceMetrics {
    fn new() -> Self {
        Self {
            breaker_state: GaugeVec::new(
                Opts::new("circuit_breaker_state", "Current state of circuit breakers")
                    .namespace(NAMESPACE),
                &["name"],
            )
            .expect("Failed to create circuit_breaker_state metric"),

            breaker_calls: CounterVec::new(
                Opts::new(
                    "circuit_breaker_calls_total",
                    "Total number of calls through circuit breakers",
                )
                .namespace(NAMESPACE),
                &["name", "status"],
            )
            .expect("Failed to create circuit_breaker_calls_total metric"),

            breaker_transitions: CounterVec::new(
                Opts::new(
                    "circuit_breaker_state_transitions_total",
                    "Total number of state transitions",
                )
                .namespace(NAMESPACE),
                &["name", "from_state", "to_state"],
            )
            .expect("Failed to create circuit_breaker_state_transitions_total metric"),

            retry_attempts: CounterVec::new(
                Opts::new("retry_attempts_total", "Total number of retry attempts")
                    .namespace(NAMESPACE),
                &["operation", "outcome"],
            )
            .expect("Failed to create retry_attempts_total metric"),

            errors_total: CounterVec::new(
                Opts::new("errors_total", "Total number of recorded errors")
                    .namespace(NAMESPACE),
                &["severity", "category"],
            )
            .expect("Failed to create errors_total metric"),

            recovery_executions: CounterVec::new(
                Opts::new(
                    "recovery_executions_total",
                    "Total number of recovery strategy executions",
                )
                .namespace(NAMESPACE),
                &["strategy", "outcome"],
            )
            .expect("Failed to create recovery_executions_total metric"),

            operation_duration: HistogramVec::new(
                HistogramOpts::new(
                    "operation_duration_seconds",
                    "Duration of wrapped operations",
                )
                .namespace(NAMESPACE)
                .buckets(vec![
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
                    60.0, 120.0,
                ]),
                &["operation_type"],
            )
            .expect("Failed to create operation_duration_seconds metric"),

            operations_total: CounterVec::new(
                Opts::new("operations_total", "Total number of wrapped operations")
                    .namespace(NAMESPACE),
                &["operation_type", "status"],
            )
            .expect("Failed to create operations_total metric"),

            store_degraded: Gauge::with_opts(
                Opts::new(
                    "store_degraded",
                    "Whether the resilient store runs on its in-memory fallback",
                )
                .namespace(NAMESPACE),
            )
            .expect("Failed to create store_degraded metric"),

            transactions_total: CounterVec::new(
                Opts::new("transactions_total", "Transaction log entries by status")
                    .namespace(NAMESPACE),
                &["status"],
            )
            .expect("Failed to create transactions_total metric"),

            health_status: Gauge::with_opts(
                Opts::new("health_status", "1 when the system is healthy")
                    .namespace(NAMESPACE),
            )
            .expect("Failed to create health_status metric"),
        }
    }
}

lazy_static! {
    /// Global resilience metrics instance
    pub static ref RESILIENCE_METRICS: ResilienceMetrics = ResilienceMetrics::new();
}

/// Register all resilience metrics with a Prometheus registry
pub fn init_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    let m = &*RESILIENCE_METRICS;
    registry.register(Box::new(m.breaker_state.clone()))?;
    registry.register(Box::new(m.breaker_calls.clone()))?;
    registry.register(Box::new(m.breaker_transitions.clone()))?;
    registry.register(Box::new(m.retry_attempts.clone()))?;
    registry.register(Box::new(m.errors_total.clone()))?;
    registry.register(Box::new(m.recovery_executions.clone()))?;
    registry.register(Box::new(m.operation_duration.clone()))?;
    registry.register(Box::new(m.operations_total.clone()))?;
    registry.register(Box::new(m.store_degraded.clone()))?;
    registry.register(Box::new(m.transactions_total.clone()))?;
    registry.register(Box::new(m.health_status.clone()))?;

    tracing::info!("Resilience metrics initialized");
    Ok(())
}
