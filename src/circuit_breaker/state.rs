//! Circuit breaker state machine implementation.
//!
//! This module handles state transitions and state-specific behavior. All
//! mutation happens through `StateData`, which the breaker keeps behind a
//! single lock so admission, outcome recording and statistics for one key are
//! applied atomically.

use crate::circuit_breaker::CircuitBreakerConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

/// The current state of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitBreakerState {
    /// Circuit is closed - requests are allowed through, failures are counted
    Closed,
    /// Circuit is open - requests are rejected until the recovery timeout elapses
    Open,
    /// Circuit is half-open - trial requests test whether the dependency recovered
    HalfOpen,
}

impl CircuitBreakerState {
    /// Convert state to numeric value for Prometheus gauge
    pub fn to_metric_value(&self) -> f64 {
        match self {
            CircuitBreakerState::Closed => 0.0,
            CircuitBreakerState::Open => 1.0,
            CircuitBreakerState::HalfOpen => 2.0,
        }
    }
}

impl fmt::Display for CircuitBreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitBreakerState::Closed => write!(f, "closed"),
            CircuitBreakerState::Open => write!(f, "open"),
            CircuitBreakerState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Represents a state transition in the circuit breaker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: CircuitBreakerState,
    pub to: CircuitBreakerState,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// Cumulative counters, updated on every call regardless of outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerCounters {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rejected_requests: u64,
    pub times_opened: u64,
}

/// Result of asking the state machine whether a call may proceed
#[derive(Debug, Clone)]
pub enum Admission {
    Allowed(Option<StateTransition>),
    Rejected,
}

/// Internal state data for the circuit breaker
#[derive(Debug, Clone)]
pub struct StateData {
    pub state: CircuitBreakerState,
    /// Failures since the last success
    pub failure_count: u32,
    /// Only meaningful while half-open
    pub consecutive_half_open_successes: u32,
    pub last_failure_time: Option<Instant>,
    pub next_attempt_time: Option<Instant>,
    pub last_state_change: DateTime<Utc>,
    pub transition_count: u64,
    pub counters: BreakerCounters,
}

impl StateData {
    /// Create new state data in Closed state
    pub fn new() -> Self {
        Self {
            state: CircuitBreakerState::Closed,
            failure_count: 0,
            consecutive_half_open_successes: 0,
            last_failure_time: None,
            next_attempt_time: None,
            last_state_change: Utc::now(),
            transition_count: 0,
            counters: BreakerCounters::default(),
        }
    }

    /// Decide whether a call may proceed at `now`, moving Open to HalfOpen
    /// lazily once the recovery timeout has elapsed.
    pub fn admit(&mut self, now: Instant) -> Admission {
        self.counters.total_requests += 1;

        match self.state {
            CircuitBreakerState::Closed | CircuitBreakerState::HalfOpen => {
                Admission::Allowed(None)
            }
            CircuitBreakerState::Open => {
                let eligible = self
                    .next_attempt_time
                    .map(|next| now >= next)
                    .unwrap_or(true);

                if eligible {
                    let transition = self.transition_to(CircuitBreakerState::HalfOpen, now, None);
                    Admission::Allowed(Some(transition))
                } else {
                    self.counters.rejected_requests += 1;
                    Admission::Rejected
                }
            }
        }
    }

    /// Record a successful call
    pub fn record_success(
        &mut self,
        now: Instant,
        config: &CircuitBreakerConfig,
    ) -> Option<StateTransition> {
        self.counters.successful_requests += 1;
        self.failure_count = 0;

        if self.state == CircuitBreakerState::HalfOpen {
            self.consecutive_half_open_successes += 1;
            if self.consecutive_half_open_successes >= config.required_half_open_successes {
                return Some(self.transition_to(CircuitBreakerState::Closed, now, None));
            }
        }

        None
    }

    /// Record a failed call
    pub fn record_failure(
        &mut self,
        now: Instant,
        config: &CircuitBreakerConfig,
    ) -> Option<StateTransition> {
        self.counters.failed_requests += 1;
        self.failure_count += 1;
        self.last_failure_time = Some(now);

        match self.state {
            CircuitBreakerState::Closed if self.failure_count >= config.failure_threshold => Some(
                self.transition_to(CircuitBreakerState::Open, now, Some(config.recovery_timeout)),
            ),
            // Any failure while half-open reopens and restarts the timer
            CircuitBreakerState::HalfOpen => Some(self.transition_to(
                CircuitBreakerState::Open,
                now,
                Some(config.recovery_timeout),
            )),
            _ => None,
        }
    }

    /// Transition to a new state
    pub fn transition_to(
        &mut self,
        new_state: CircuitBreakerState,
        now: Instant,
        recovery_timeout: Option<std::time::Duration>,
    ) -> StateTransition {
        let transition = StateTransition {
            from: self.state,
            to: new_state,
            timestamp: Utc::now(),
            reason: self.transition_reason(new_state),
        };

        self.state = new_state;
        self.last_state_change = transition.timestamp;
        self.transition_count += 1;

        match new_state {
            CircuitBreakerState::Open => {
                self.counters.times_opened += 1;
                self.consecutive_half_open_successes = 0;
                let base = self.last_failure_time.unwrap_or(now);
                self.next_attempt_time = Some(base + recovery_timeout.unwrap_or_default());
            }
            CircuitBreakerState::HalfOpen => {
                self.consecutive_half_open_successes = 0;
            }
            CircuitBreakerState::Closed => {
                self.failure_count = 0;
                self.consecutive_half_open_successes = 0;
                self.next_attempt_time = None;
            }
        }

        transition
    }

    fn transition_reason(&self, new_state: CircuitBreakerState) -> String {
        match (self.state, new_state) {
            (CircuitBreakerState::Closed, CircuitBreakerState::Open) => {
                format!("Failure threshold reached ({} failures)", self.failure_count)
            }
            (CircuitBreakerState::Open, CircuitBreakerState::HalfOpen) => {
                "Recovery timeout elapsed, testing recovery".to_string()
            }
            (CircuitBreakerState::HalfOpen, CircuitBreakerState::Closed) => format!(
                "Recovery successful ({} consecutive successes)",
                self.consecutive_half_open_successes
            ),
            (CircuitBreakerState::HalfOpen, CircuitBreakerState::Open) => {
                "Recovery test failed".to_string()
            }
            _ => format!("Transitioned from {} to {}", self.state, new_state),
        }
    }
}

impl Default for StateData {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(threshold: u32) -> CircuitBreakerConfig {
        CircuitBreakerConfig::builder()
            .failure_threshold(threshold)
            .recovery_timeout(Duration::from_secs(30))
            .build()
            .unwrap()
    }

    #[test]
    fn test_state_metric_values() {
        assert_eq!(CircuitBreakerState::Closed.to_metric_value(), 0.0);
        assert_eq!(CircuitBreakerState::Open.to_metric_value(), 1.0);
        assert_eq!(CircuitBreakerState::HalfOpen.to_metric_value(), 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_exactly_at_threshold() {
        let cfg = config(3);
        let mut data = StateData::new();
        let now = Instant::now();

        assert!(data.record_failure(now, &cfg).is_none());
        assert!(data.record_failure(now, &cfg).is_none());
        assert_eq!(data.state, CircuitBreakerState::Closed);

        let transition = data.record_failure(now, &cfg).unwrap();
        assert_eq!(transition.to, CircuitBreakerState::Open);
        assert_eq!(data.counters.times_opened, 1);
        assert_eq!(data.next_attempt_time, Some(now + Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_count() {
        let cfg = config(2);
        let mut data = StateData::new();
        let now = Instant::now();

        data.record_failure(now, &cfg);
        data.record_success(now, &cfg);
        data.record_failure(now, &cfg);
        assert_eq!(data.state, CircuitBreakerState::Closed);
        assert_eq!(data.failure_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_rejects_until_next_attempt_time() {
        let cfg = config(1);
        let mut data = StateData::new();
        let now = Instant::now();
        data.record_failure(now, &cfg);

        assert!(matches!(data.admit(now + Duration::from_secs(29)), Admission::Rejected));
        assert_eq!(data.counters.rejected_requests, 1);

        match data.admit(now + Duration::from_secs(30)) {
            Admission::Allowed(Some(t)) => assert_eq!(t.to, CircuitBreakerState::HalfOpen),
            other => panic!("expected half-open transition, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens_and_resets_timer() {
        let cfg = config(1);
        let mut data = StateData::new();
        let start = Instant::now();
        data.record_failure(start, &cfg);

        let later = start + Duration::from_secs(31);
        data.admit(later);
        assert_eq!(data.state, CircuitBreakerState::HalfOpen);

        data.record_failure(later, &cfg);
        assert_eq!(data.state, CircuitBreakerState::Open);
        assert_eq!(data.next_attempt_time, Some(later + Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_closes_after_required_successes() {
        let cfg = config(1);
        let mut data = StateData::new();
        let now = Instant::now();
        data.record_failure(now, &cfg);
        data.admit(now + Duration::from_secs(30));

        assert!(data.record_success(now, &cfg).is_none());
        assert!(data.record_success(now, &cfg).is_none());
        let transition = data.record_success(now, &cfg).unwrap();
        assert_eq!(transition.to, CircuitBreakerState::Closed);
        assert_eq!(data.failure_count, 0);
        assert!(data.next_attempt_time.is_none());
    }
}
