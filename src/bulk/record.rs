//! Operation status records, retained for a bounded window after
//! completion so a caller can poll `status()` after `execute()` returns.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Outcome of a single item within a bulk operation.
#[derive(Debug, Clone, Serialize)]
pub struct ItemRecord {
    pub index: usize,
    pub succeeded: bool,
    pub skipped: bool,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl ItemRecord {
    #[must_use]
    pub fn success(index: usize, result: serde_json::Value) -> Self {
        Self { index, succeeded: true, skipped: false, result: Some(result), error: None }
    }

    #[must_use]
    pub fn failure(index: usize, error: impl Into<String>) -> Self {
        Self { index, succeeded: false, skipped: false, result: None, error: Some(error.into()) }
    }

    #[must_use]
    pub fn skipped(index: usize, reason: impl Into<String>) -> Self {
        Self { index, succeeded: false, skipped: true, result: None, error: Some(reason.into()) }
    }
}

/// Lifecycle state of a bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    InProgress,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

/// Full record of one bulk-operation run, updated as batches complete.
#[derive(Debug, Clone, Serialize)]
pub struct OperationRecord {
    pub operation_id: Uuid,
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub status: OperationStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub items: Vec<ItemRecord>,
}

impl OperationRecord {
    #[must_use]
    pub fn new(operation_id: Uuid, total: usize, started_at: DateTime<Utc>) -> Self {
        Self {
            operation_id,
            total,
            processed: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            status: OperationStatus::InProgress,
            started_at,
            ended_at: None,
            items: Vec::with_capacity(total),
        }
    }

    pub fn record(&mut self, item: ItemRecord) {
        self.processed += 1;
        if item.skipped {
            self.skipped += 1;
        } else if item.succeeded {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.items.push(item);
    }

    pub fn finish(&mut self, status: OperationStatus, ended_at: DateTime<Utc>) {
        self.status = status;
        self.ended_at = Some(ended_at);
    }
}
