use crate::models::ErrorRecord;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::VecDeque;

/// Bounded ring buffer of error records plus per-second success counts.
///
/// The record ring holds at most `max_size` entries and evicts the oldest
/// first. Successes are counted per wall-clock second and kept for
/// `success_retention`, so window queries see every success regardless of
/// volume. Records are never mutated after they are appended.
#[derive(Debug)]
pub struct ErrorLog {
    max_size: usize,
    success_retention: Duration,
    records: RwLock<VecDeque<ErrorRecord>>,
    /// `(unix second, successes in that second)`, ascending by second
    successes: RwLock<VecDeque<(i64, u64)>>,
}

impl ErrorLog {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            max_size,
            success_retention: Duration::hours(1),
            records: RwLock::new(VecDeque::with_capacity(max_size.min(1024))),
            successes: RwLock::new(VecDeque::new()),
        }
    }

    /// Keep success counts for `retention` instead of the default hour
    pub fn with_success_retention(mut self, retention: std::time::Duration) -> Self {
        self.success_retention = Duration::from_std(retention).unwrap_or(Duration::hours(1));
        self
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn append(&self, record: ErrorRecord) {
        let mut records = self.records.write();
        if records.len() == self.max_size {
            records.pop_front();
        }
        records.push_back(record);
    }

    pub fn record_success(&self) {
        self.record_success_at(Utc::now());
    }

    pub fn record_success_at(&self, at: DateTime<Utc>) {
        let second = at.timestamp();
        let mut buckets = self.successes.write();

        match buckets.back().map(|(last, _)| *last) {
            Some(last) if last == second => {
                if let Some((_, count)) = buckets.back_mut() {
                    *count += 1;
                }
            }
            Some(last) if last > second => {
                let index = buckets.partition_point(|(s, _)| *s < second);
                if buckets.get(index).is_some_and(|(s, _)| *s == second) {
                    buckets[index].1 += 1;
                } else {
                    buckets.insert(index, (second, 1));
                }
            }
            _ => buckets.push_back((second, 1)),
        }

        let newest = buckets.back().map(|(s, _)| *s).unwrap_or(second);
        let cutoff = newest - self.success_retention.num_seconds();
        while buckets.front().is_some_and(|(s, _)| *s < cutoff) {
            buckets.pop_front();
        }
    }

    /// Records with `timestamp >= since`, oldest first
    pub fn records_since(&self, since: DateTime<Utc>) -> Vec<ErrorRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.timestamp >= since)
            .cloned()
            .collect()
    }

    /// Successes in buckets at or after the second containing `since`
    pub fn successes_since(&self, since: DateTime<Utc>) -> usize {
        let from = since.timestamp();
        self.successes
            .read()
            .iter()
            .rev()
            .take_while(|(s, _)| *s >= from)
            .map(|(_, count)| *count as usize)
            .sum()
    }

    /// The `limit` most recent records, newest first
    pub fn recent(&self, limit: usize) -> Vec<ErrorRecord> {
        self.records.read().iter().rev().take(limit).cloned().collect()
    }

    /// All records sharing a correlation id
    pub fn by_correlation_id(&self, correlation_id: &str) -> Vec<ErrorRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.correlation_id == correlation_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new(1000)
    }
}
