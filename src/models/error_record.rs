use crate::error::AppError;
use crate::models::OperationContext;
use crate::resources::EnvironmentSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

/// Severity assigned by the classifier
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, EnumString, Display, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Check if severity requires immediate attention
    pub fn is_urgent(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }
}

/// Subsystem an operation belongs to
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, EnumString, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    /// Backing store, transaction log, backups
    Persistence,
    /// WASM / native acceleration modules
    Native,
    /// Tool protocol handling
    Protocol,
    /// Neural / compute workloads
    Compute,
    /// Agent and task coordination
    Coordination,
    Network,
    Memory,
    Validation,
}

/// Snapshot of the underlying error
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorDetails {
    pub name: String,
    pub message: String,
    pub code: String,
    /// Wrapped errors, outermost first
    pub stack: Vec<String>,
}

impl From<&AppError> for ErrorDetails {
    fn from(err: &AppError) -> Self {
        Self {
            name: err.name().to_string(),
            message: err.to_string(),
            code: err.error_code().to_string(),
            stack: err.chain(),
        }
    }
}

/// Immutable log entry created for every failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: Uuid,
    pub correlation_id: String,
    pub operation_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub category: ErrorCategory,
    pub component: String,
    pub operation: String,
    pub error: ErrorDetails,
    pub execution_time_ms: u64,
    pub environment: EnvironmentSnapshot,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ErrorRecord {
    /// Build a record for a failed operation
    pub fn new(
        error: &AppError,
        context: &OperationContext,
        correlation_id: &str,
        operation_id: Uuid,
        severity: Severity,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            correlation_id: correlation_id.to_string(),
            operation_id,
            timestamp: Utc::now(),
            severity,
            category: context.category,
            component: context.component.clone(),
            operation: context.operation.clone(),
            error: ErrorDetails::from(error),
            execution_time_ms,
            environment: EnvironmentSnapshot::capture(),
            metadata: context.metadata.clone(),
        }
    }

    /// Override the record timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert!(Severity::High.is_urgent());
        assert!(!Severity::Medium.is_urgent());
    }

    #[test]
    fn test_category_names() {
        assert_eq!(ErrorCategory::Persistence.to_string(), "persistence");
        assert_eq!(
            ErrorCategory::from_str("coordination").unwrap(),
            ErrorCategory::Coordination
        );
        assert_eq!(Severity::Critical.to_string(), "CRITICAL");
    }

    #[test]
    fn test_record_captures_error_details() {
        let ctx = OperationContext::new(ErrorCategory::Persistence, "db", "write");
        let err = AppError::Database("disk full".to_string());
        let record = ErrorRecord::new(&err, &ctx, "corr-1", Uuid::new_v4(), Severity::High, 12);

        assert_eq!(record.error.code, "DATABASE_ERROR");
        assert_eq!(record.error.name, "DatabaseError");
        assert_eq!(record.component, "db");
        assert_eq!(record.correlation_id, "corr-1");
        assert_eq!(record.execution_time_ms, 12);
    }
}
