//! Circuit breaker configuration with builder pattern.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a circuit breaker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Number of failures without an intervening success before opening the circuit
    pub failure_threshold: u32,

    /// How long an open circuit rejects calls before allowing a trial call
    pub recovery_timeout: Duration,

    /// Consecutive successes in half-open state required to close the circuit
    pub required_half_open_successes: u32,
}

impl CircuitBreakerConfig {
    /// Create a new builder for CircuitBreakerConfig
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(AppError::Configuration(
                "failure_threshold must be greater than 0".to_string(),
            ));
        }

        if self.required_half_open_successes == 0 {
            return Err(AppError::Configuration(
                "required_half_open_successes must be greater than 0".to_string(),
            ));
        }

        if self.recovery_timeout.is_zero() {
            return Err(AppError::Configuration(
                "recovery_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            required_half_open_successes: 3,
        }
    }
}

/// Builder for CircuitBreakerConfig with fluent API
#[derive(Debug, Clone, Default)]
pub struct CircuitBreakerConfigBuilder {
    failure_threshold: Option<u32>,
    recovery_timeout: Option<Duration>,
    required_half_open_successes: Option<u32>,
}

impl CircuitBreakerConfigBuilder {
    /// Set the failure threshold
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    /// Set the recovery timeout
    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = Some(timeout);
        self
    }

    /// Set the number of half-open successes required to close
    pub fn required_half_open_successes(mut self, successes: u32) -> Self {
        self.required_half_open_successes = Some(successes);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<CircuitBreakerConfig> {
        let default = CircuitBreakerConfig::default();

        let config = CircuitBreakerConfig {
            failure_threshold: self.failure_threshold.unwrap_or(default.failure_threshold),
            recovery_timeout: self.recovery_timeout.unwrap_or(default.recovery_timeout),
            required_half_open_successes: self
                .required_half_open_successes
                .unwrap_or(default.required_half_open_successes),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.recovery_timeout, Duration::from_secs(30));
        assert_eq!(config.required_half_open_successes, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_with_defaults() {
        let config = CircuitBreakerConfig::builder()
            .failure_threshold(2)
            .build()
            .unwrap();

        assert_eq!(config.failure_threshold, 2);
        assert_eq!(config.required_half_open_successes, 3);
    }

    #[test]
    fn test_invalid_config() {
        assert!(CircuitBreakerConfig::builder()
            .failure_threshold(0)
            .build()
            .is_err());
        assert!(CircuitBreakerConfig::builder()
            .recovery_timeout(Duration::ZERO)
            .build()
            .is_err());
        assert!(CircuitBreakerConfig::builder()
            .required_half_open_successes(0)
            .build()
            .is_err());
    }
}
