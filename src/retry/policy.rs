//! Retryability classifier.
//!
//! An error is retryable only when its code or message matches the
//! allow-list below. Codes in [`NON_RETRYABLE_CODES`] always fail fast, even
//! when their message happens to mention a retryable condition.

use crate::error::AppError;
use once_cell::sync::Lazy;
use regex::{RegexSet, RegexSetBuilder};

/// Codes that are never retried
pub const NON_RETRYABLE_CODES: &[&str] = &[
    "VALIDATION_ERROR",
    "CONFIGURATION_ERROR",
    "NOT_FOUND",
    "CONFLICT",
    "CIRCUIT_OPEN",
    "RETRY_EXHAUSTED",
    "CANCELLED",
    "DATA_CORRUPTION",
    "MALFORMED_RESULT",
    "PRECONDITION_FAILED",
    "RESOURCE_EXHAUSTED",
    "MANUAL_INTERVENTION_REQUIRED",
    "ESCALATED",
];

/// Codes that are always retried
pub const RETRYABLE_CODES: &[&str] = &["TIMEOUT", "NETWORK_ERROR"];

/// Message patterns (case-insensitive) marking transient failures
pub const RETRYABLE_PATTERNS: &[&str] = &[
    r"econnrefused|connection refused",
    r"econnreset|connection reset",
    r"etimedout|timed out|timeout",
    r"enotfound|dns|name resolution",
    r"sqlite_busy|\bbusy\b",
    r"sqlite_locked|\blocked\b",
    r"network",
    r"temporar(y|ily)",
];

static DEFAULT_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSetBuilder::new(RETRYABLE_PATTERNS)
        .case_insensitive(true)
        .build()
        .expect("retryable patterns are valid regexes")
});

/// Decides whether a failed attempt may be retried
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    patterns: RegexSet,
}

impl RetryPolicy {
    pub fn is_retryable(&self, error: &AppError) -> bool {
        let code = error.error_code();

        if NON_RETRYABLE_CODES.contains(&code) {
            return false;
        }

        if RETRYABLE_CODES.contains(&code) {
            return true;
        }

        self.patterns.is_match(&error.to_string())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_messages_are_retryable() {
        let policy = RetryPolicy::default();

        for message in [
            "ECONNREFUSED 127.0.0.1:5432",
            "Connection reset by peer",
            "request timed out",
            "getaddrinfo ENOTFOUND api.local",
            "SQLITE_BUSY: database is busy",
            "database is locked",
            "temporary failure in name resolution",
        ] {
            assert!(
                policy.is_retryable(&AppError::Operation(message.to_string())),
                "expected retryable: {}",
                message
            );
        }
    }

    #[test]
    fn test_codes_take_precedence() {
        let policy = RetryPolicy::default();

        assert!(policy.is_retryable(&AppError::Timeout("slow".to_string())));
        assert!(policy.is_retryable(&AppError::Network("unreachable".to_string())));
        assert!(!policy.is_retryable(&AppError::Validation(
            "timeout must be positive".to_string()
        )));
        assert!(!policy.is_retryable(&AppError::CircuitOpen {
            name: "network:call".to_string()
        }));
    }

    #[test]
    fn test_unknown_errors_fail_fast() {
        let policy = RetryPolicy::default();

        assert!(!policy.is_retryable(&AppError::Operation("division by zero".to_string())));
        assert!(!policy.is_retryable(&AppError::Database("UNIQUE constraint failed".to_string())));
    }
}
