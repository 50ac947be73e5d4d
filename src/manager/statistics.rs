use crate::models::{ErrorCategory, ErrorRecord, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Threshold above which a category gets its own recommendation
const CATEGORY_ALERT_COUNT: usize = 5;

/// Messages seen at least this often are reported as recurring
const RECURRING_ERROR_COUNT: usize = 3;

/// How many recurring messages the statistics keep
const TOP_ERRORS: usize = 5;

/// A message that showed up repeatedly in the window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringError {
    pub message: String,
    pub count: usize,
}

/// Aggregate view of the error log over a time window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorStatistics {
    pub window_secs: u64,
    pub total_errors: usize,
    pub total_successes: usize,
    pub error_rate: f64,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_category: HashMap<ErrorCategory, usize>,
    pub by_component: BTreeMap<String, usize>,
    pub top_errors: Vec<RecurringError>,
    pub open_circuit_breakers: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl ErrorStatistics {
    pub fn from_records(
        records: &[ErrorRecord],
        total_successes: usize,
        open_circuit_breakers: Vec<String>,
        window_secs: u64,
    ) -> Self {
        let mut by_severity = BTreeMap::new();
        let mut by_category = HashMap::new();
        let mut by_component = BTreeMap::new();
        let mut messages: HashMap<&str, usize> = HashMap::new();

        for record in records {
            *by_severity.entry(record.severity).or_insert(0) += 1;
            *by_category.entry(record.category).or_insert(0) += 1;
            *by_component.entry(record.component.clone()).or_insert(0) += 1;
            *messages.entry(record.error.message.as_str()).or_insert(0) += 1;
        }

        let mut top_errors: Vec<RecurringError> = messages
            .into_iter()
            .map(|(message, count)| RecurringError {
                message: message.to_string(),
                count,
            })
            .collect();
        top_errors.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.message.cmp(&b.message)));
        top_errors.truncate(TOP_ERRORS);

        let total_errors = records.len();
        let total = total_errors + total_successes;
        let error_rate = if total == 0 {
            0.0
        } else {
            total_errors as f64 / total as f64
        };

        Self {
            window_secs,
            total_errors,
            total_successes,
            error_rate,
            by_severity,
            by_category,
            by_component,
            top_errors,
            open_circuit_breakers,
            generated_at: Utc::now(),
        }
    }

    pub fn severity_count(&self, severity: Severity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }

    pub fn category_count(&self, category: ErrorCategory) -> usize {
        self.by_category.get(&category).copied().unwrap_or(0)
    }

    /// Prioritized advice derived from these statistics, most urgent first
    pub fn recommendations(&self, max_error_rate: f64) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        let critical = self.severity_count(Severity::Critical);
        if critical > 0 {
            recommendations.push(Recommendation::new(
                Severity::Critical,
                "critical_errors",
                format!("{} critical errors in the last {}s", critical, self.window_secs),
                "Review the manual intervention alerts and their correlation ids",
            ));
        }

        if self.category_count(ErrorCategory::Memory) > 0 {
            recommendations.push(Recommendation::new(
                Severity::Critical,
                "memory",
                "Memory related failures detected".to_string(),
                "Reduce concurrent agents or raise the memory ceiling",
            ));
        }

        if self.total_errors > 0 && self.error_rate >= max_error_rate {
            recommendations.push(Recommendation::new(
                Severity::High,
                "error_rate",
                format!(
                    "Error rate {:.1}% is at or above {:.1}%",
                    self.error_rate * 100.0,
                    max_error_rate * 100.0
                ),
                "Investigate the most frequent errors below",
            ));
        }

        if !self.open_circuit_breakers.is_empty() {
            recommendations.push(Recommendation::new(
                Severity::High,
                "circuit_breakers",
                format!(
                    "Circuit breakers open: {}",
                    self.open_circuit_breakers.join(", ")
                ),
                "Check the health of the dependencies behind the open breakers",
            ));
        }

        if self.category_count(ErrorCategory::Persistence) >= CATEGORY_ALERT_COUNT {
            recommendations.push(Recommendation::new(
                Severity::Medium,
                "persistence",
                format!(
                    "{} persistence errors",
                    self.category_count(ErrorCategory::Persistence)
                ),
                "Check storage health, disk space and file permissions",
            ));
        }

        if self.category_count(ErrorCategory::Network) >= CATEGORY_ALERT_COUNT {
            recommendations.push(Recommendation::new(
                Severity::Medium,
                "network",
                format!(
                    "{} network errors",
                    self.category_count(ErrorCategory::Network)
                ),
                "Verify connectivity to remote services",
            ));
        }

        for recurring in self
            .top_errors
            .iter()
            .filter(|e| e.count >= RECURRING_ERROR_COUNT)
        {
            recommendations.push(Recommendation::new(
                Severity::Low,
                "recurring_error",
                format!("'{}' occurred {} times", recurring.message, recurring.count),
                "Add handling for this failure at its source",
            ));
        }

        recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
        recommendations
    }
}

/// One piece of operator advice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: Severity,
    pub topic: String,
    pub message: String,
    pub action: String,
}

impl Recommendation {
    fn new(priority: Severity, topic: &str, message: String, action: &str) -> Self {
        Self {
            priority,
            topic: topic.to_string(),
            message,
            action: action.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::OperationContext;
    use uuid::Uuid;

    fn record(category: ErrorCategory, severity: Severity, message: &str) -> ErrorRecord {
        let ctx = OperationContext::new(category, "store", "write");
        ErrorRecord::new(
            &AppError::Operation(message.to_string()),
            &ctx,
            "c",
            Uuid::new_v4(),
            severity,
            0,
        )
    }

    #[test]
    fn test_counts_and_rate() {
        let records = vec![
            record(ErrorCategory::Persistence, Severity::High, "locked"),
            record(ErrorCategory::Persistence, Severity::High, "locked"),
            record(ErrorCategory::Network, Severity::Low, "reset"),
        ];
        let stats = ErrorStatistics::from_records(&records, 7, vec![], 300);

        assert_eq!(stats.total_errors, 3);
        assert!((stats.error_rate - 0.3).abs() < 1e-9);
        assert_eq!(stats.severity_count(Severity::High), 2);
        assert_eq!(stats.category_count(ErrorCategory::Network), 1);
        assert_eq!(stats.by_component.get("store"), Some(&3));
        assert_eq!(stats.top_errors[0].count, 2);
    }

    #[test]
    fn test_empty_window_has_no_recommendations() {
        let stats = ErrorStatistics::from_records(&[], 0, vec![], 300);
        assert_eq!(stats.error_rate, 0.0);
        assert!(stats.recommendations(0.1).is_empty());
    }

    #[test]
    fn test_recommendations_sorted_by_priority() {
        let mut records = vec![record(ErrorCategory::Memory, Severity::Critical, "oom")];
        for _ in 0..5 {
            records.push(record(ErrorCategory::Persistence, Severity::High, "disk busy"));
        }
        let stats =
            ErrorStatistics::from_records(&records, 0, vec!["db:write".to_string()], 300);
        let recommendations = stats.recommendations(0.1);

        assert_eq!(recommendations[0].priority, Severity::Critical);
        assert!(recommendations.iter().any(|r| r.topic == "circuit_breakers"));
        assert!(recommendations.iter().any(|r| r.topic == "persistence"));
        assert!(recommendations.iter().any(|r| r.topic == "recurring_error"));
        assert_eq!(
            recommendations.last().map(|r| r.priority),
            Some(Severity::Low)
        );
    }
}
