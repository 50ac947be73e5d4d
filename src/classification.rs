//! Severity classification.
//!
//! Rules are evaluated in order and the first match wins. A rule matches when
//! the lower-cased error text contains one of its substrings, or when the
//! context category is one of its categories. The text is the root error's
//! code and message; operation and field names never take part. The
//! ordering lets message content escalate severity beyond the category
//! default: a "database" failure in a coordination call is still HIGH.

use crate::error::AppError;
use crate::models::{ErrorCategory, OperationContext, Severity};
use serde::Serialize;

/// One row of the severity table
#[derive(Debug, Clone, Copy)]
pub struct SeverityRule {
    pub severity: Severity,
    pub message_patterns: &'static [&'static str],
    pub categories: &'static [ErrorCategory],
}

impl SeverityRule {
    fn matches(&self, text: &str, category: ErrorCategory) -> bool {
        self.message_patterns.iter().any(|p| text.contains(p))
            || self.categories.contains(&category)
    }
}

/// Default severity table; anything unmatched is LOW
pub const SEVERITY_RULES: &[SeverityRule] = &[
    SeverityRule {
        severity: Severity::Critical,
        message_patterns: &["memory", "corruption", "fatal"],
        categories: &[ErrorCategory::Memory],
    },
    SeverityRule {
        severity: Severity::High,
        message_patterns: &["database", "network", "timeout"],
        categories: &[ErrorCategory::Persistence, ErrorCategory::Native],
    },
    SeverityRule {
        severity: Severity::Medium,
        message_patterns: &["validation", "configuration"],
        categories: &[ErrorCategory::Validation],
    },
];

/// Severity plus the category it was classified under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub severity: Severity,
    pub category: ErrorCategory,
}

/// Pure, deterministic error classifier
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    rules: &'static [SeverityRule],
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self {
            rules: SEVERITY_RULES,
        }
    }

    /// Map an error and its context to a severity
    pub fn classify(&self, error: &AppError, context: &OperationContext) -> Severity {
        let text = error.classification_text();

        self.rules
            .iter()
            .find(|rule| rule.matches(&text, context.category))
            .map(|rule| rule.severity)
            .unwrap_or(Severity::Low)
    }

    pub fn classification(&self, error: &AppError, context: &OperationContext) -> Classification {
        Classification {
            severity: self.classify(error, context),
            category: context.category,
        }
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}
