use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt; the operation runs at most `max_retries + 1` times
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Upper bound (exclusive) of the uniform jitter added to each delay, as a fraction
    pub jitter_fraction: f64,
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.initial_delay > self.max_delay {
            return Err(AppError::Configuration(format!(
                "initial_delay ({:?}) cannot be greater than max_delay ({:?})",
                self.initial_delay, self.max_delay
            )));
        }

        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(AppError::Configuration(
                "backoff_multiplier must be a finite value >= 1.0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.jitter_fraction) {
            return Err(AppError::Configuration(
                "jitter_fraction must be between 0.0 and 1.0".to_string(),
            ));
        }

        Ok(())
    }

    /// No retries at all
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_fraction: 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_configs() {
        let config = RetryConfig {
            initial_delay: Duration::from_secs(60),
            ..RetryConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RetryConfig {
            backoff_multiplier: 0.5,
            ..RetryConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RetryConfig {
            jitter_fraction: 1.5,
            ..RetryConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
