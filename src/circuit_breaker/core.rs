//! Core circuit breaker implementation with async support.

use crate::circuit_breaker::state::{Admission, BreakerCounters};
use crate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerState, StateData, StateTransition};
use crate::error::{AppError, Result};
use crate::metrics::RESILIENCE_METRICS;
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A thread-safe, async circuit breaker guarding one operation key
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Arc<Mutex<StateData>>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        debug!(name = %name, config = ?config, "Creating new circuit breaker");

        Self {
            name,
            config,
            state: Arc::new(Mutex::new(StateData::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current state
    pub fn state(&self) -> CircuitBreakerState {
        self.state.lock().state
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Execute an async operation protected by the circuit breaker.
    ///
    /// The breaker never retries; a retry loop composed inside `f` counts as a
    /// single breaker-level attempt. While open and before the recovery
    /// timeout elapses, `f` is not invoked and `AppError::CircuitOpen` is
    /// returned. Caller errors (see [`AppError::is_caller_error`]) are
    /// neutral: they neither count as failures nor as successes.
    pub async fn call<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.try_acquire()?;

        RESILIENCE_METRICS
            .breaker_calls
            .with_label_values(&[&self.name, "allowed"])
            .inc();

        let result = f().await;

        match &result {
            Ok(_) => self.on_success(),
            Err(err) if err.is_caller_error() => self.on_neutral(err),
            Err(err) => self.on_failure(err),
        }

        result
    }

    fn try_acquire(&self) -> Result<()> {
        let admission = self.state.lock().admit(Instant::now());

        match admission {
            Admission::Allowed(transition) => {
                if let Some(transition) = transition {
                    self.log_transition(&transition);
                }
                Ok(())
            }
            Admission::Rejected => {
                RESILIENCE_METRICS
                    .breaker_calls
                    .with_label_values(&[&self.name, "rejected"])
                    .inc();
                debug!(name = %self.name, "Circuit breaker open, rejecting call");
                Err(AppError::CircuitOpen {
                    name: self.name.clone(),
                })
            }
        }
    }

    fn on_success(&self) {
        let transition = {
            let mut state = self.state.lock();
            let transition = state.record_success(Instant::now(), &self.config);
            debug!(
                name = %self.name,
                current_state = %state.state,
                half_open_successes = state.consecutive_half_open_successes,
                "Operation succeeded"
            );
            transition
        };

        RESILIENCE_METRICS
            .breaker_calls
            .with_label_values(&[&self.name, "success"])
            .inc();

        if let Some(transition) = transition {
            self.log_transition(&transition);
        }
    }

    fn on_neutral(&self, err: &AppError) {
        debug!(
            name = %self.name,
            current_state = %self.state(),
            error = %err,
            "Caller error, breaker state unchanged"
        );

        RESILIENCE_METRICS
            .breaker_calls
            .with_label_values(&[&self.name, "neutral"])
            .inc();
    }

    fn on_failure(&self, err: &AppError) {
        let transition = {
            let mut state = self.state.lock();
            let transition = state.record_failure(Instant::now(), &self.config);
            warn!(
                name = %self.name,
                current_state = %state.state,
                failure_count = state.failure_count,
                error = %err,
                "Operation failed"
            );
            transition
        };

        RESILIENCE_METRICS
            .breaker_calls
            .with_label_values(&[&self.name, "failure"])
            .inc();

        if let Some(transition) = transition {
            self.log_transition(&transition);
        }
    }

    fn log_transition(&self, transition: &StateTransition) {
        info!(
            name = %self.name,
            from = %transition.from,
            to = %transition.to,
            reason = %transition.reason,
            "Circuit breaker state transition"
        );

        RESILIENCE_METRICS
            .breaker_state
            .with_label_values(&[&self.name])
            .set(transition.to.to_metric_value());

        RESILIENCE_METRICS
            .breaker_transitions
            .with_label_values(&[
                &self.name,
                &transition.from.to_string(),
                &transition.to.to_string(),
            ])
            .inc();
    }

    /// Get statistics for this circuit breaker
    pub fn stats(&self) -> CircuitBreakerStats {
        let state = self.state.lock();
        let now = Instant::now();
        CircuitBreakerStats {
            name: self.name.clone(),
            state: state.state,
            failure_count: state.failure_count,
            consecutive_half_open_successes: state.consecutive_half_open_successes,
            counters: state.counters,
            transition_count: state.transition_count,
            last_state_change: state.last_state_change,
            retry_after_ms: state
                .next_attempt_time
                .filter(|_| state.state == CircuitBreakerState::Open)
                .map(|next| next.saturating_duration_since(now).as_millis() as u64),
        }
    }

    /// Manually reset the circuit breaker to closed state
    pub fn reset(&self) {
        let transition = {
            let mut state = self.state.lock();
            if state.state == CircuitBreakerState::Closed {
                None
            } else {
                Some(state.transition_to(CircuitBreakerState::Closed, Instant::now(), None))
            }
        };
        if let Some(transition) = transition {
            self.log_transition(&transition);
        }
    }

    /// Force the circuit breaker to open state
    pub fn force_open(&self) {
        let transition = {
            let mut state = self.state.lock();
            if state.state == CircuitBreakerState::Open {
                None
            } else {
                Some(state.transition_to(
                    CircuitBreakerState::Open,
                    Instant::now(),
                    Some(self.config.recovery_timeout),
                ))
            }
        };
        if let Some(transition) = transition {
            self.log_transition(&transition);
        }
    }
}

/// Statistics for a circuit breaker
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStats {
    pub name: String,
    pub state: CircuitBreakerState,
    pub failure_count: u32,
    pub consecutive_half_open_successes: u32,
    pub counters: BreakerCounters,
    pub transition_count: u64,
    pub last_state_change: chrono::DateTime<chrono::Utc>,
    /// Time left before an open breaker admits a trial call
    pub retry_after_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn failing() -> impl Future<Output = Result<i32>> {
        async { Err(AppError::Database("write failed".to_string())) }
    }

    #[tokio::test]
    async fn test_successful_call() {
        let breaker = CircuitBreaker::new("test", CircuitBreakerConfig::default());

        let result = breaker.call(|| async { Ok::<_, AppError>(42) }).await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(breaker.state(), CircuitBreakerState::Closed);
        assert_eq!(breaker.stats().counters.successful_requests, 1);
    }

    #[tokio::test]
    async fn test_failure_passes_through_original_error() {
        let breaker = CircuitBreaker::new("test", CircuitBreakerConfig::default());

        let err = breaker.call(failing).await.unwrap_err();

        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert_eq!(breaker.stats().failure_count, 1);
    }

    #[tokio::test]
    async fn test_open_circuit_does_not_invoke_operation() {
        let config = CircuitBreakerConfig::builder()
            .failure_threshold(2)
            .build()
            .unwrap();
        let breaker = CircuitBreaker::new("db:write", config);

        for _ in 0..2 {
            let _ = breaker.call(failing).await;
        }
        assert_eq!(breaker.state(), CircuitBreakerState::Open);

        let invoked = AtomicU32::new(0);
        let result = breaker
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, AppError>(1)
            })
            .await;

        assert!(matches!(result, Err(AppError::CircuitOpen { .. })));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);

        let stats = breaker.stats();
        assert_eq!(stats.counters.total_requests, 3);
        assert_eq!(stats.counters.rejected_requests, 1);
        assert_eq!(stats.counters.times_opened, 1);
        assert!(stats.retry_after_ms.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_after_recovery_timeout() {
        let config = CircuitBreakerConfig::builder()
            .failure_threshold(1)
            .recovery_timeout(Duration::from_secs(30))
            .build()
            .unwrap();
        let breaker = CircuitBreaker::new("test", config);

        let _ = breaker.call(failing).await;
        assert_eq!(breaker.state(), CircuitBreakerState::Open);

        tokio::time::advance(Duration::from_secs(31)).await;

        let result = breaker.call(|| async { Ok::<_, AppError>(5) }).await;
        assert_eq!(result.unwrap(), 5);
        assert_eq!(breaker.state(), CircuitBreakerState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_errors_do_not_close_half_open_breaker() {
        let config = CircuitBreakerConfig::builder()
            .failure_threshold(1)
            .recovery_timeout(Duration::from_secs(30))
            .build()
            .unwrap();
        let breaker = CircuitBreaker::new("db:read", config);

        let _ = breaker.call(failing).await;
        tokio::time::advance(Duration::from_secs(31)).await;

        for _ in 0..3 {
            let err = breaker
                .call(|| async { Err::<i32, _>(AppError::NotFound("agent:a1".to_string())) })
                .await
                .unwrap_err();
            assert_eq!(err.error_code(), "NOT_FOUND");
        }

        let stats = breaker.stats();
        assert_eq!(stats.state, CircuitBreakerState::HalfOpen);
        assert_eq!(stats.counters.successful_requests, 0);
        assert_eq!(stats.counters.failed_requests, 1);
        assert_eq!(stats.counters.total_requests, 4);
        assert_eq!(stats.consecutive_half_open_successes, 0);
    }

    #[tokio::test]
    async fn test_caller_errors_do_not_reset_failure_count() {
        let config = CircuitBreakerConfig::builder()
            .failure_threshold(2)
            .build()
            .unwrap();
        let breaker = CircuitBreaker::new("db:write", config);

        let _ = breaker.call(failing).await;
        let _ = breaker
            .call(|| async { Err::<i32, _>(AppError::Conflict("agent:a1".to_string())) })
            .await;
        let _ = breaker.call(failing).await;

        assert_eq!(breaker.state(), CircuitBreakerState::Open);
    }

    #[tokio::test]
    async fn test_manual_reset_and_force_open() {
        let breaker = CircuitBreaker::new("test", CircuitBreakerConfig::default());

        breaker.force_open();
        assert_eq!(breaker.state(), CircuitBreakerState::Open);

        breaker.reset();
        assert_eq!(breaker.state(), CircuitBreakerState::Closed);
        assert_eq!(breaker.stats().transition_count, 2);
    }
}
