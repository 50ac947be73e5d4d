use crate::error::{AppError, Result};
use crate::metrics::RESILIENCE_METRICS;
use crate::retry::{RetryConfig, RetryPolicy};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Executes operations with bounded exponential-backoff retries
#[derive(Debug, Clone, Default)]
pub struct RetryManager {
    config: RetryConfig,
    policy: RetryPolicy,
}

impl RetryManager {
    /// Fails with `AppError::Configuration` when `config` does not validate
    pub fn new(config: RetryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            policy: RetryPolicy::default(),
        })
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Delay before retry number `attempt + 1`, without jitter:
    /// `min(initial_delay * multiplier^attempt, max_delay)`
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let millis = self.config.initial_delay.as_millis() as f64
            * self.config.backoff_multiplier.powi(exponent);
        let capped = millis.min(self.config.max_delay.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    /// Base delay scaled by `1 + jitter`, `jitter` uniform in `[0, jitter_fraction)`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.config.jitter_fraction <= 0.0 {
            return base;
        }
        let jitter = rand::thread_rng().gen_range(0.0..self.config.jitter_fraction);
        base.mul_f64(1.0 + jitter)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error, or
    /// the retry budget is spent.
    pub async fn execute<F, Fut, T>(&self, operation: F, operation_name: &str) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_with_cancellation(operation, operation_name, None)
            .await
    }

    /// Like [`execute`](Self::execute), but stops issuing new attempts once
    /// `cancellation` fires. An attempt already in flight is awaited, not aborted.
    pub async fn execute_with_cancellation<F, Fut, T>(
        &self,
        mut operation: F,
        operation_name: &str,
        cancellation: Option<&CancellationToken>,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        let mut previous_delay = Duration::ZERO;

        loop {
            if cancellation.map(|t| t.is_cancelled()).unwrap_or(false) {
                return Err(AppError::Cancelled(format!(
                    "'{}' cancelled before attempt {}",
                    operation_name,
                    attempt + 1
                )));
            }

            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(
                            operation = %operation_name,
                            attempts = attempt + 1,
                            "Operation succeeded after retry"
                        );
                    }
                    RESILIENCE_METRICS
                        .retry_attempts
                        .with_label_values(&[operation_name, "success"])
                        .inc();
                    return Ok(value);
                }
                Err(err) => {
                    if !self.policy.is_retryable(&err) {
                        debug!(
                            operation = %operation_name,
                            error = %err,
                            "Non-retryable error, failing fast"
                        );
                        RESILIENCE_METRICS
                            .retry_attempts
                            .with_label_values(&[operation_name, "non_retryable"])
                            .inc();
                        return Err(err);
                    }

                    if attempt >= self.config.max_retries {
                        warn!(
                            operation = %operation_name,
                            attempts = attempt + 1,
                            error = %err,
                            "Retry budget exhausted"
                        );
                        RESILIENCE_METRICS
                            .retry_attempts
                            .with_label_values(&[operation_name, "exhausted"])
                            .inc();
                        return Err(AppError::RetryExhausted {
                            operation: operation_name.to_string(),
                            attempts: attempt + 1,
                            last_error: Box::new(err),
                        });
                    }

                    // Clamp so the observed schedule never shrinks, even at the cap
                    let delay = self.delay_for_attempt(attempt).max(previous_delay);
                    previous_delay = delay;

                    warn!(
                        operation = %operation_name,
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retryable error, backing off"
                    );
                    RESILIENCE_METRICS
                        .retry_attempts
                        .with_label_values(&[operation_name, "retry"])
                        .inc();

                    match cancellation {
                        Some(token) => {
                            tokio::select! {
                                _ = tokio::time::sleep(delay) => {}
                                _ = token.cancelled() => {
                                    return Err(AppError::Cancelled(format!(
                                        "'{}' cancelled during backoff after attempt {}",
                                        operation_name,
                                        attempt + 1
                                    )));
                                }
                            }
                        }
                        None => tokio::time::sleep(delay).await,
                    }

                    attempt += 1;
                }
            }
        }
    }
}
