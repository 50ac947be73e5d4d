use crate::error::{AppError, Result};
use crate::manager::ErrorHandlingManager;
use crate::metrics::RESILIENCE_METRICS;
use crate::models::{OperationContext, OperationOutcome};
use crate::operations::rules::{validate_params, validate_result};
use crate::operations::{with_timeout, OperationType, PreflightChecker};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Wrapper settings
#[derive(Debug, Clone, PartialEq)]
pub struct WrapperConfig {
    /// Component name used in breaker keys, e.g. `mcp-tools:agent_spawn`
    pub component: String,
    /// Pre-flight refuses work at or above this fraction of system memory
    pub max_memory_ratio: f64,
    /// Capacity of the operation history ring buffer
    pub history_size: usize,
}

impl Default for WrapperConfig {
    fn default() -> Self {
        Self {
            component: "mcp-tools".to_string(),
            max_memory_ratio: 0.9,
            history_size: 100,
        }
    }
}

/// One finished call, successful or not
#[derive(Debug, Clone, Serialize)]
pub struct OperationRecord {
    pub id: Uuid,
    pub operation_type: OperationType,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    /// `completed`, `fallback`, `degraded`, `restart_requested` or `failed`
    pub status: &'static str,
    pub error_code: Option<String>,
    pub error: Option<String>,
}

/// Rolling counters for one operation type
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OperationCounters {
    pub count: u64,
    pub failures: u64,
    pub total_duration_ms: u64,
}

impl OperationCounters {
    fn record(&mut self, success: bool, duration_ms: u64) {
        self.count += 1;
        self.total_duration_ms += duration_ms;
        if !success {
            self.failures += 1;
        }
    }

    pub fn average_latency_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_duration_ms as f64 / self.count as f64
        }
    }

    pub fn failure_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.failures as f64 / self.count as f64
        }
    }
}

/// Counters across all operation types and per type
#[derive(Debug, Clone, Serialize)]
pub struct OperationMetrics {
    pub total: OperationCounters,
    pub by_type: BTreeMap<OperationType, OperationCounters>,
}

/// Validation, pre-flight, deadline and result checks around manager calls
pub struct RobustOperationWrapper {
    manager: Arc<ErrorHandlingManager>,
    preflight: PreflightChecker,
    config: WrapperConfig,
    history: Mutex<VecDeque<OperationRecord>>,
    counters: Mutex<BTreeMap<OperationType, OperationCounters>>,
}

impl RobustOperationWrapper {
    pub fn new(
        manager: Arc<ErrorHandlingManager>,
        preflight: PreflightChecker,
        config: WrapperConfig,
    ) -> Self {
        Self {
            manager,
            preflight,
            history: Mutex::new(VecDeque::with_capacity(config.history_size.max(1))),
            counters: Mutex::new(BTreeMap::new()),
            config,
        }
    }

    pub fn manager(&self) -> &Arc<ErrorHandlingManager> {
        &self.manager
    }

    /// Run `operation` for `operation_type` with `params`.
    ///
    /// Invalid parameters fail before `operation` is ever called. A result
    /// missing the fields the operation type promises counts as a failure of
    /// that attempt.
    pub async fn execute<F, Fut>(
        &self,
        operation_type: OperationType,
        params: Value,
        operation: F,
    ) -> Result<OperationOutcome<Value>>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let started_at = Utc::now();
        let started = Instant::now();

        let result = self.run(operation_type, params, operation).await;

        self.record(operation_type, started_at, started.elapsed().as_millis() as u64, &result);
        result
    }

    async fn run<F, Fut>(
        &self,
        operation_type: OperationType,
        params: Value,
        operation: F,
    ) -> Result<OperationOutcome<Value>>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        if let Err(e) = validate_params(operation_type, &params) {
            warn!(operation = %operation_type, error = %e, "Rejected invalid parameters");
            return Err(e);
        }

        self.preflight.check(operation_type).await?;

        let token = CancellationToken::new();
        let context = OperationContext::new(
            operation_type.category(),
            self.config.component.clone(),
            operation_type.to_string(),
        )
        .with_correlation_id(Uuid::new_v4().to_string())
        .with_metadata("params", params.clone())
        .with_cancellation(token.clone());

        let attempt = move || {
            let call = operation(params.clone());
            async move {
                let value = call.await?;
                if let Err(e) = validate_result(operation_type, &value) {
                    if let AppError::MalformedResult { missing, .. } = &e {
                        warn!(operation = %operation_type, missing = ?missing, "Result missing required fields");
                    }
                    return Err(e);
                }
                Ok(value)
            }
        };

        let manager = self.manager.clone();
        let name = context.breaker_key();
        let result = with_timeout(
            async move { manager.wrap_operation(attempt, context).await },
            operation_type.timeout(),
            &name,
        )
        .await;

        if let Err(AppError::Timeout(_)) = &result {
            // Stop the abandoned retry loop from issuing further attempts
            token.cancel();
        }

        result
    }

    fn record(
        &self,
        operation_type: OperationType,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        result: &Result<OperationOutcome<Value>>,
    ) {
        let (status, error_code, error) = match result {
            Ok(OperationOutcome::Completed(_)) => ("completed", None, None),
            Ok(OperationOutcome::Fallback { .. }) => ("fallback", None, None),
            Ok(OperationOutcome::Degraded { .. }) => ("degraded", None, None),
            Ok(OperationOutcome::RestartRequested { .. }) => ("restart_requested", None, None),
            Err(e) => (
                "failed",
                Some(e.root().error_code().to_string()),
                Some(e.to_string()),
            ),
        };
        let success = result.is_ok();

        RESILIENCE_METRICS
            .operation_duration
            .with_label_values(&[&operation_type.to_string()])
            .observe(duration_ms as f64 / 1000.0);
        RESILIENCE_METRICS
            .operations_total
            .with_label_values(&[&operation_type.to_string(), status])
            .inc();

        if success {
            debug!(operation = %operation_type, status, duration_ms, "Operation finished");
        } else {
            info!(
                operation = %operation_type,
                duration_ms,
                error_code = error_code.as_deref().unwrap_or(""),
                "Operation failed"
            );
        }

        self.counters
            .lock()
            .entry(operation_type)
            .or_default()
            .record(success, duration_ms);

        let mut history = self.history.lock();
        if history.len() >= self.config.history_size.max(1) {
            history.pop_front();
        }
        history.push_back(OperationRecord {
            id: Uuid::new_v4(),
            operation_type,
            started_at,
            finished_at: Utc::now(),
            duration_ms,
            success,
            status,
            error_code,
            error,
        });
    }

    /// The `limit` most recent calls, newest first
    pub fn recent_operations(&self, limit: usize) -> Vec<OperationRecord> {
        self.history.lock().iter().rev().take(limit).cloned().collect()
    }

    pub fn metrics(&self) -> OperationMetrics {
        let by_type = self.counters.lock().clone();
        let total = by_type.values().fold(OperationCounters::default(), |mut acc, c| {
            acc.count += c.count;
            acc.failures += c.failures;
            acc.total_duration_ms += c.total_duration_ms;
            acc
        });
        OperationMetrics { total, by_type }
    }
}
