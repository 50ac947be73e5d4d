use crate::circuit_breaker::CircuitBreakerRegistry;
use crate::events::{EventBus, ResilienceEvent};
use crate::health::{HealthConfig, HealthStatus};
use crate::manager::ErrorLog;
use crate::metrics::RESILIENCE_METRICS;
use crate::models::Severity;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Periodic health evaluation over the error log and breaker registry
pub struct HealthMonitor {
    config: HealthConfig,
    error_log: Arc<ErrorLog>,
    breakers: Arc<CircuitBreakerRegistry>,
    events: EventBus,
    last_status: Mutex<Option<HealthStatus>>,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl HealthMonitor {
    pub fn new(
        config: HealthConfig,
        error_log: Arc<ErrorLog>,
        breakers: Arc<CircuitBreakerRegistry>,
        events: EventBus,
    ) -> Self {
        Self {
            config,
            error_log,
            breakers,
            events,
            last_status: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Evaluate health now, without emitting anything
    pub fn evaluate(&self) -> HealthStatus {
        self.evaluate_at(Utc::now())
    }

    pub fn evaluate_at(&self, now: DateTime<Utc>) -> HealthStatus {
        let window = chrono::Duration::from_std(self.config.window)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
        let since = now - window;

        let records = self.error_log.records_since(since);
        let recent_errors = records.len();
        let critical_error_count = records
            .iter()
            .filter(|r| r.severity == Severity::Critical)
            .count();
        let recent_successes = self.error_log.successes_since(since);
        let open_circuit_breakers = self.breakers.open_count();

        let total = recent_errors + recent_successes;
        let error_rate = if total == 0 {
            0.0
        } else {
            recent_errors as f64 / total as f64
        };

        let healthy = error_rate < self.config.max_error_rate
            && critical_error_count < self.config.max_critical_errors
            && open_circuit_breakers < self.config.max_open_breakers;

        HealthStatus {
            healthy,
            error_rate,
            critical_error_count,
            open_circuit_breakers,
            recent_errors,
            recent_successes,
            window_secs: self.config.window.as_secs(),
            checked_at: now,
        }
    }

    /// Evaluate, remember the result and emit `healthStatusChange` if the
    /// healthy flag differs from the previous check
    pub fn check(&self) -> HealthStatus {
        let status = self.evaluate();

        RESILIENCE_METRICS
            .health_status
            .set(if status.healthy { 1.0 } else { 0.0 });

        let previous = {
            let mut last = self.last_status.lock();
            let previous = last.as_ref().map(|s| s.healthy);
            *last = Some(status.clone());
            previous
        };

        if previous != Some(status.healthy) {
            if status.healthy {
                info!(
                    error_rate = status.error_rate,
                    "System health changed to healthy"
                );
            } else {
                warn!(
                    error_rate = status.error_rate,
                    critical_errors = status.critical_error_count,
                    open_breakers = status.open_circuit_breakers,
                    issues = ?status.issues(&self.config),
                    "System health changed to unhealthy"
                );
            }
            self.events.emit(ResilienceEvent::HealthStatusChange {
                previous,
                current: status.clone(),
            });
        } else {
            debug!(healthy = status.healthy, "Health check completed");
        }

        status
    }

    /// Last status computed by [`check`](Self::check)
    pub fn last_status(&self) -> Option<HealthStatus> {
        self.last_status.lock().clone()
    }

    /// Start the background loop; a no-op when already running
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock();
        if task.is_some() {
            debug!("Health monitor already running");
            return;
        }

        let token = CancellationToken::new();
        let child = token.clone();
        let monitor = Arc::downgrade(self);
        let period = self.config.check_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        match monitor.upgrade() {
                            Some(monitor) => {
                                monitor.check();
                            }
                            None => break,
                        }
                    }
                }
            }
            debug!("Health monitor loop stopped");
        });

        info!(
            interval_secs = period.as_secs(),
            "Started health monitoring"
        );
        *task = Some((token, handle));
    }

    /// Stop the background loop and wait for it to finish
    pub async fn stop(&self) {
        let task = self.task.lock().take();
        if let Some((token, handle)) = task {
            token.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "Health monitor task ended abnormally");
            }
            info!("Stopped health monitoring");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        if let Some((token, _)) = self.task.get_mut().take() {
            token.cancel();
        }
    }
}
