use crate::metrics::RESILIENCE_METRICS;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::Display;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
    Clear,
    Restore,
}

/// One attempted mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub operation: MutationKind,
    pub key: String,
    /// Data as submitted by the caller
    pub snapshot: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    pub status: TransactionStatus,
    pub error: Option<String>,
}

/// Transaction log owned by one store
#[derive(Debug, Default)]
pub struct TransactionLog {
    entries: DashMap<Uuid, TransactionRecord>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pending mutation and return its id
    pub fn begin(
        &self,
        operation: MutationKind,
        key: impl Into<String>,
        snapshot: Option<serde_json::Value>,
    ) -> Uuid {
        let record = TransactionRecord {
            id: Uuid::new_v4(),
            operation,
            key: key.into(),
            snapshot,
            timestamp: Utc::now(),
            status: TransactionStatus::Pending,
            error: None,
        };
        let id = record.id;
        debug!(transaction_id = %id, operation = %operation, key = %record.key, "Transaction started");
        self.entries.insert(id, record);
        id
    }

    pub fn commit(&self, id: Uuid) {
        self.finish(id, TransactionStatus::Committed, None);
    }

    pub fn rollback(&self, id: Uuid, error: impl Into<String>) {
        self.finish(id, TransactionStatus::RolledBack, Some(error.into()));
    }

    fn finish(&self, id: Uuid, status: TransactionStatus, error: Option<String>) {
        if let Some(mut entry) = self.entries.get_mut(&id) {
            // Only pending entries move; a finished entry keeps its outcome
            if entry.status == TransactionStatus::Pending {
                entry.status = status;
                entry.error = error;
                RESILIENCE_METRICS
                    .transactions_total
                    .with_label_values(&[&status.to_string()])
                    .inc();
                debug!(transaction_id = %id, status = %status, "Transaction finished");
            }
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<TransactionRecord> {
        self.entries.get(id).map(|entry| entry.clone())
    }

    /// Entries with `status`, oldest first
    pub fn with_status(&self, status: TransactionStatus) -> Vec<TransactionRecord> {
        let mut records: Vec<_> = self
            .entries
            .iter()
            .filter(|entry| entry.status == status)
            .map(|entry| entry.clone())
            .collect();
        records.sort_by_key(|r| r.timestamp);
        records
    }

    /// Drop entries older than `retention`, returning how many were removed
    pub fn prune(&self, retention: Duration) -> usize {
        let cutoff = Utc::now()
            - ChronoDuration::from_std(retention).unwrap_or_else(|_| ChronoDuration::hours(24));
        self.prune_before(cutoff)
    }

    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, record| record.timestamp >= cutoff);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
