use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::product_record::ProductRecord;

/// What the sync did for a record that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Created,
    /// A remote product with the same title already existed
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncedItem {
    pub record: ProductRecord,
    pub remote_id: u64,
    pub action: SyncAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedItem {
    pub record: ProductRecord,
    pub error: String,
}

/// Outcome of one bulk sync batch.
///
/// Counters only move together with their lists, so
/// `success_count + error_count == total` holds at every point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    total: usize,
    success_count: usize,
    error_count: usize,
    successful: Vec<SyncedItem>,
    failed: Vec<FailedItem>,
    cancelled: bool,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl Default for SyncResult {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncResult {
    pub fn new() -> Self {
        Self {
            total: 0,
            success_count: 0,
            error_count: 0,
            successful: Vec::new(),
            failed: Vec::new(),
            cancelled: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record_success(&mut self, record: ProductRecord, remote_id: u64, action: SyncAction) {
        self.successful.push(SyncedItem {
            record,
            remote_id,
            action,
        });
        self.success_count += 1;
        self.total += 1;
    }

    pub fn record_failure(&mut self, record: ProductRecord, error: impl Into<String>) {
        self.failed.push(FailedItem {
            record,
            error: error.into(),
        });
        self.error_count += 1;
        self.total += 1;
    }

    pub fn finish(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
        self.finished_at = Some(Utc::now());
    }

    pub const fn total(&self) -> usize {
        self.total
    }

    pub const fn success_count(&self) -> usize {
        self.success_count
    }

    pub const fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn successful(&self) -> &[SyncedItem] {
        &self.successful
    }

    pub fn failed(&self) -> &[FailedItem] {
        &self.failed
    }

    pub const fn cancelled(&self) -> bool {
        self.cancelled
    }

    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub const fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn count_of(&self, action: SyncAction) -> usize {
        self.successful.iter().filter(|s| s.action == action).count()
    }

    pub fn is_consistent(&self) -> bool {
        self.success_count + self.error_count == self.total
            && self.successful.len() == self.success_count
            && self.failed.len() == self.error_count
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Sync finished: {} total, {} created, {} skipped, {} failed{}",
            self.total,
            self.count_of(SyncAction::Created),
            self.count_of(SyncAction::Skipped),
            self.error_count,
            if self.cancelled { " (cancelled)" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(n: usize) -> ProductRecord {
        ProductRecord::new(format!("catalog_{n}_0"), format!("Pump {n}"), "c", "s")
    }

    #[test]
    fn summary_counts_actions() {
        let mut result = SyncResult::new();
        result.record_success(record(1), 10, SyncAction::Created);
        result.record_success(record(2), 11, SyncAction::Skipped);
        result.record_failure(record(3), "422 Unprocessable Entity");
        result.finish(false);

        assert_eq!(result.total(), 3);
        assert!(result.is_consistent());
        assert!(result.finished_at().is_some());
        assert_eq!(
            result.summary_line(),
            "Sync finished: 3 total, 1 created, 1 skipped, 1 failed"
        );
    }

    proptest! {
        #[test]
        fn counters_always_match_lists(outcomes in proptest::collection::vec(0u8..3, 0..40)) {
            let mut result = SyncResult::new();
            for (i, outcome) in outcomes.iter().enumerate() {
                match outcome {
                    0 => result.record_success(record(i), i as u64, SyncAction::Created),
                    1 => result.record_success(record(i), i as u64, SyncAction::Skipped),
                    _ => result.record_failure(record(i), "boom"),
                }
            }
            prop_assert!(result.is_consistent());
            prop_assert_eq!(result.total(), outcomes.len());
        }
    }
}
