//! Sliding-window health monitoring.
//!
//! The monitor aggregates the rolling error log and the circuit breaker
//! registry into a single healthy/unhealthy signal on a fixed interval, and
//! emits `healthStatusChange` only when that signal flips.

mod monitor;

pub use monitor::HealthMonitor;

use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Health thresholds and timing
#[derive(Debug, Clone, PartialEq)]
pub struct HealthConfig {
    /// How often the background loop evaluates health
    pub check_interval: Duration,
    /// Trailing window the error rate is computed over
    pub window: Duration,
    /// Healthy requires `error_rate < max_error_rate`
    pub max_error_rate: f64,
    /// Healthy requires fewer critical errors than this in the window
    pub max_critical_errors: usize,
    /// Healthy requires fewer open breakers than this
    pub max_open_breakers: usize,
}

impl HealthConfig {
    pub fn validate(&self) -> Result<()> {
        if self.check_interval.is_zero() {
            return Err(AppError::Configuration(
                "health check_interval must be greater than 0".to_string(),
            ));
        }
        if self.window.is_zero() {
            return Err(AppError::Configuration(
                "health window must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_error_rate) {
            return Err(AppError::Configuration(format!(
                "health max_error_rate must be within 0.0..=1.0, got {}",
                self.max_error_rate
            )));
        }
        Ok(())
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            window: Duration::from_secs(300),
            max_error_rate: 0.10,
            max_critical_errors: 5,
            max_open_breakers: 3,
        }
    }
}

/// Result of one health evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub error_rate: f64,
    pub critical_error_count: usize,
    pub open_circuit_breakers: usize,
    pub recent_errors: usize,
    pub recent_successes: usize,
    pub window_secs: u64,
    pub checked_at: DateTime<Utc>,
}

impl HealthStatus {
    /// Reasons this status is unhealthy, empty when healthy
    pub fn issues(&self, config: &HealthConfig) -> Vec<String> {
        let mut issues = Vec::new();
        if self.error_rate >= config.max_error_rate {
            issues.push(format!(
                "error rate {:.1}% at or above {:.1}%",
                self.error_rate * 100.0,
                config.max_error_rate * 100.0
            ));
        }
        if self.critical_error_count >= config.max_critical_errors {
            issues.push(format!(
                "{} critical errors in the last {}s",
                self.critical_error_count, self.window_secs
            ));
        }
        if self.open_circuit_breakers >= config.max_open_breakers {
            issues.push(format!(
                "{} circuit breakers open",
                self.open_circuit_breakers
            ));
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = HealthConfig::default();
        assert_eq!(config.check_interval, Duration::from_secs(60));
        assert_eq!(config.window, Duration::from_secs(300));
        assert_eq!(config.max_critical_errors, 5);
        assert_eq!(config.max_open_breakers, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_rate_rejected() {
        let config = HealthConfig {
            max_error_rate: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_issues_list_every_breach() {
        let config = HealthConfig::default();
        let status = HealthStatus {
            healthy: false,
            error_rate: 0.5,
            critical_error_count: 5,
            open_circuit_breakers: 4,
            recent_errors: 10,
            recent_successes: 10,
            window_secs: 300,
            checked_at: Utc::now(),
        };
        assert_eq!(status.issues(&config).len(), 3);
    }
}
