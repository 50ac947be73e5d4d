//! Keyed registry of circuit breakers.
//!
//! Breakers are created lazily per `component:operation` key and live for the
//! lifetime of the registry; the number of keys is bounded by the finite set
//! of operation types.

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerState, CircuitBreakerStats};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Registry for all circuit breakers owned by one manager
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    default_config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    /// Create a new registry
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            default_config,
        }
    }

    /// Get or create the breaker for `key` using the registry default config
    pub fn get_or_create(&self, key: &str) -> Arc<CircuitBreaker> {
        self.get_or_create_with(key, self.default_config.clone())
    }

    /// Get or create the breaker for `key` with an explicit config.
    /// The config only applies when the breaker does not exist yet.
    pub fn get_or_create_with(&self, key: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(key) {
            return existing.value().clone();
        }

        self.breakers
            .entry(key.to_string())
            .or_insert_with(|| {
                info!(name = %key, "Creating new circuit breaker in registry");
                Arc::new(CircuitBreaker::new(key, config))
            })
            .clone()
    }

    /// Get an existing circuit breaker by key
    pub fn get(&self, key: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(key).map(|entry| entry.value().clone())
    }

    pub fn list_names(&self) -> Vec<String> {
        self.breakers.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Get statistics for all circuit breakers
    pub fn all_stats(&self) -> Vec<CircuitBreakerStats> {
        self.breakers
            .iter()
            .map(|entry| entry.value().stats())
            .collect()
    }

    /// Reset all circuit breakers to closed state
    pub fn reset_all(&self) {
        info!("Resetting all circuit breakers");
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }

    /// Get count of circuit breakers in each state
    pub fn state_counts(&self) -> StateCount {
        let mut counts = StateCount::default();

        for entry in self.breakers.iter() {
            match entry.value().state() {
                CircuitBreakerState::Closed => counts.closed += 1,
                CircuitBreakerState::Open => counts.open += 1,
                CircuitBreakerState::HalfOpen => counts.half_open += 1,
            }
        }

        counts
    }

    /// Number of breakers currently open
    pub fn open_count(&self) -> usize {
        self.state_counts().open
    }

    /// Keys of the breakers currently open
    pub fn open_breakers(&self) -> Vec<String> {
        self.breakers
            .iter()
            .filter(|entry| entry.value().state() == CircuitBreakerState::Open)
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

/// Count of circuit breakers in each state
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StateCount {
    pub closed: usize,
    pub open: usize,
    pub half_open: usize,
}

impl StateCount {
    pub fn total(&self) -> usize {
        self.closed + self.open + self.half_open
    }
}
