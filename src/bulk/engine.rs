//! Bulk Operation Engine (C3): generic batched execution over a list of
//! items, with progress reporting, cooperative cancellation, and a
//! bounded-retention table of operation records a caller can poll after
//! `execute` returns.
//!
//! Grounded on the batching/retry shape of the bulk executor pattern seen
//! across the example pack (chunked processing, per-item result
//! accounting, a summary struct) generalized here to be generic over the
//! item and result types so C4/C5/C6 can all share one executor.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::error::{Error, Result};

use super::options::BulkOptions;
use super::progress::{ProgressReporter, ProgressSnapshot};
use super::record::{ItemRecord, OperationRecord, OperationStatus};
use super::validation::{ValidationOptions, ValidationReport};

/// How long a finished operation's record stays queryable via `status`
/// before the engine evicts it (§5: "a short retention window (≈60s)").
const RETENTION: Duration = Duration::from_secs(60);

/// Outcome handed back to the caller of `execute`.
#[derive(Debug, Clone)]
pub struct BulkSummary {
    pub operation_id: Uuid,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub elapsed: Duration,
    pub items: Vec<ItemRecord>,
    pub status: OperationStatus,
}

/// Executes item lists in fixed-size batches, running every item within a
/// batch concurrently (continue-on-error) or sequentially stopping at the
/// first failure (fail-fast), and exposes progress/cancellation/status for
/// long-running runs.
pub struct BulkEngine {
    active: Arc<DashMap<Uuid, Arc<RwLock<OperationRecord>>>>,
    cancelled: DashMap<Uuid, Arc<AtomicBool>>,
}

impl Default for BulkEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl BulkEngine {
    #[must_use]
    pub fn new() -> Self {
        Self { active: Arc::new(DashMap::new()), cancelled: DashMap::new() }
    }

    /// Run `op` over every item in `items`, batching per `options`.
    ///
    /// `op` receives the item and its zero-based index in the original
    /// list, and must resolve to a JSON-serializable result or an `Error`.
    /// With `continue_on_error == true`, all items in a batch run
    /// concurrently via `tokio::spawn` and the engine proceeds to the next
    /// batch regardless of per-item outcome. With `continue_on_error ==
    /// false`, a batch runs sequentially and execution stops at the first
    /// failure; every item not yet started is recorded as skipped.
    pub async fn execute<T, R, Op, Fut>(&self, items: Vec<T>, op: Op, options: BulkOptions) -> Result<BulkSummary>
    where
        T: Send + 'static,
        R: Serialize + Send + 'static,
        Op: Fn(T, usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let operation_id = Uuid::new_v4();
        let total = items.len();
        let started_at = Utc::now();
        let start_instant = Instant::now();

        let record = Arc::new(RwLock::new(OperationRecord::new(operation_id, total, started_at)));
        self.active.insert(operation_id, record.clone());
        let cancel_flag = Arc::new(AtomicBool::new(false));
        self.cancelled.insert(operation_id, cancel_flag.clone());

        let op = Arc::new(op);
        let batch_size = options.batch_size.max(1);
        let reporter = options.progress.clone().map_or_else(ProgressReporter::none, ProgressReporter::new);
        let deadline = options.timeout_ms.map(|ms| start_instant + Duration::from_millis(ms));

        let mut final_status = OperationStatus::Completed;
        let mut indexed = items.into_iter().enumerate();

        'batches: loop {
            let batch: Vec<(usize, T)> = indexed.by_ref().take(batch_size).collect();
            if batch.is_empty() {
                break;
            }

            if cancel_flag.load(Ordering::SeqCst) {
                let mut guard = record.write().await;
                for (index, _) in batch {
                    guard.record(ItemRecord::skipped(index, "operation cancelled"));
                }
                for (index, _) in indexed.by_ref() {
                    guard.record(ItemRecord::skipped(index, "operation cancelled"));
                }
                final_status = OperationStatus::Cancelled;
                break 'batches;
            }

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    let mut guard = record.write().await;
                    for (index, _) in batch {
                        guard.record(ItemRecord::skipped(index, "operation timed out"));
                    }
                    for (index, _) in indexed.by_ref() {
                        guard.record(ItemRecord::skipped(index, "operation timed out"));
                    }
                    final_status = OperationStatus::TimedOut;
                    break 'batches;
                }
            }

            if options.continue_on_error {
                let mut joins = JoinSet::new();
                for (index, item) in batch {
                    let op = op.clone();
                    joins.spawn(async move {
                        let outcome = op(item, index).await;
                        (index, outcome)
                    });
                }
                while let Some(joined) = joins.join_next().await {
                    let (index, outcome) = joined.map_err(|err| Error::OperationFailed(err.to_string()))?;
                    let mut guard = record.write().await;
                    match outcome {
                        Ok(value) => guard.record(ItemRecord::success(
                            index,
                            serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
                        )),
                        Err(err) => guard.record(ItemRecord::failure(index, err.to_string())),
                    }
                }
            } else {
                let mut stopped_early = false;
                let mut batch_iter = batch.into_iter();
                for (index, item) in batch_iter.by_ref() {
                    let outcome = op(item, index).await;
                    let mut guard = record.write().await;
                    match outcome {
                        Ok(value) => guard.record(ItemRecord::success(
                            index,
                            serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
                        )),
                        Err(err) => {
                            guard.record(ItemRecord::failure(index, err.to_string()));
                            stopped_early = true;
                        }
                    }
                    if stopped_early {
                        break;
                    }
                }
                if stopped_early {
                    let mut guard = record.write().await;
                    for (index, _) in batch_iter {
                        guard.record(ItemRecord::skipped(index, "skipped after prior failure"));
                    }
                    for (index, _) in indexed.by_ref() {
                        guard.record(ItemRecord::skipped(index, "skipped after prior failure"));
                    }
                    final_status = OperationStatus::Failed;
                    break 'batches;
                }
            }

            {
                let guard = record.read().await;
                let elapsed_secs = start_instant.elapsed().as_secs_f64();
                reporter.report(ProgressSnapshot::compute(
                    guard.processed,
                    guard.total,
                    guard.succeeded,
                    guard.failed,
                    elapsed_secs,
                ));
            }

            if options.batch_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(options.batch_delay_ms)).await;
            }
        }

        let ended_at = Utc::now();
        let mut guard = record.write().await;
        if guard.failed > 0 && final_status == OperationStatus::Completed {
            final_status = OperationStatus::Failed;
        }
        guard.finish(final_status, ended_at);
        let summary = BulkSummary {
            operation_id,
            total: guard.total,
            succeeded: guard.succeeded,
            failed: guard.failed,
            skipped: guard.skipped,
            elapsed: start_instant.elapsed(),
            items: guard.items.clone(),
            status: guard.status,
        };
        drop(guard);

        self.cancelled.remove(&operation_id);
        self.schedule_eviction(operation_id);

        Ok(summary)
    }

    /// Check `items` for the input-side problems `execute` never recovers
    /// from: an empty list, duplicate keys (when `options.key_of` is set),
    /// and whatever `options.validate_item` rejects. Runs no side effects
    /// and never touches the active-operations table — a pure input audit
    /// a caller runs before committing to `execute`.
    pub fn validate<T>(&self, items: &[T], options: &ValidationOptions<T>) -> ValidationReport {
        let mut report = ValidationReport::new(items.len());

        if items.is_empty() {
            report.add_error(None, "no items supplied".to_string());
            return report;
        }

        let mut seen: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        for (index, item) in items.iter().enumerate() {
            if let Some(key_of) = &options.key_of {
                let key = key_of(item);
                if let Some(&first_index) = seen.get(&key) {
                    report.add_error(Some(index), format!("duplicate key {key:?} (first seen at index {first_index})"));
                    continue;
                }
                seen.insert(key, index);
            }

            if let Some(validate_item) = &options.validate_item {
                if let Err(err) = validate_item(item) {
                    report.add_error(Some(index), err.to_string());
                    continue;
                }
            }

            report.valid_count += 1;
        }

        report
    }

    /// Request cancellation of a running operation. Items already
    /// submitted to the current batch still run to completion; no further
    /// batches start. Returns `false` if the operation is unknown (already
    /// finished and evicted, or never existed).
    pub fn cancel(&self, operation_id: Uuid) -> bool {
        self.cancelled.get(&operation_id).is_some_and(|flag| {
            flag.store(true, Ordering::SeqCst);
            true
        })
    }

    /// Snapshot the current state of an operation, running or finished
    /// (within the retention window).
    pub async fn status(&self, operation_id: Uuid) -> Option<OperationRecord> {
        let entry = self.active.get(&operation_id)?.clone();
        let guard = entry.read().await;
        Some(guard.clone())
    }

    fn schedule_eviction(&self, operation_id: Uuid) {
        let active = self.active.clone();
        tokio::spawn(async move {
            tokio::time::sleep(RETENTION).await;
            active.remove(&operation_id);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn all_items_succeed() {
        let engine = BulkEngine::new();
        let items: Vec<u32> = (0..10).collect();
        let summary = engine
            .execute(items, |item, _index| async move { Ok::<_, Error>(item * 2) }, BulkOptions::new())
            .await
            .unwrap();

        assert_eq!(summary.total, 10);
        assert_eq!(summary.succeeded, 10);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.status, OperationStatus::Completed);
    }

    #[tokio::test]
    async fn continue_on_error_processes_every_item_and_accounts_failures() {
        let engine = BulkEngine::new();
        let items: Vec<u32> = (0..9).collect();
        let summary = engine
            .execute(
                items,
                |item, _index| async move {
                    if item % 3 == 0 {
                        Err(Error::OperationFailed(format!("bad item {item}")))
                    } else {
                        Ok::<_, Error>(item)
                    }
                },
                BulkOptions::new().with_batch_size(4).with_continue_on_error(true),
            )
            .await
            .unwrap();

        assert_eq!(summary.total, 9);
        assert_eq!(summary.succeeded, 6);
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.status, OperationStatus::Failed);
    }

    #[tokio::test]
    async fn fail_fast_stops_at_first_error_and_skips_the_rest() {
        let engine = BulkEngine::new();
        let items: Vec<u32> = (0..10).collect();
        let summary = engine
            .execute(
                items,
                |item, _index| async move {
                    if item == 3 {
                        Err(Error::OperationFailed("boom".to_string()))
                    } else {
                        Ok::<_, Error>(item)
                    }
                },
                BulkOptions::new().with_batch_size(2).with_continue_on_error(false),
            )
            .await
            .unwrap();

        assert_eq!(summary.status, OperationStatus::Failed);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 6);
        assert_eq!(summary.total, 10);
    }

    #[tokio::test]
    async fn cancel_stops_scheduling_new_batches() {
        let engine = Arc::new(BulkEngine::new());
        let started = Arc::new(AtomicUsize::new(0));
        let items: Vec<u32> = (0..20).collect();

        let engine_clone = engine.clone();
        let started_clone = started.clone();
        let handle = tokio::spawn(async move {
            engine_clone
                .execute(
                    items,
                    move |item, _index| {
                        let started = started_clone.clone();
                        async move {
                            started.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            Ok::<_, Error>(item)
                        }
                    },
                    BulkOptions::new().with_batch_size(2),
                )
                .await
        });

        // Let the first batch start, then cancel before later batches run.
        tokio::time::sleep(Duration::from_millis(5)).await;
        let operation_ids: Vec<Uuid> = engine.active.iter().map(|entry| *entry.key()).collect();
        for id in operation_ids {
            engine.cancel(id);
        }

        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary.status, OperationStatus::Cancelled);
        assert!(summary.skipped > 0);
        assert!(started.load(Ordering::SeqCst) < 20);
    }

    #[tokio::test]
    async fn status_reports_final_snapshot() {
        let engine = BulkEngine::new();
        let items: Vec<u32> = vec![1, 2, 3];
        let summary = engine
            .execute(items, |item, _index| async move { Ok::<_, Error>(item) }, BulkOptions::new())
            .await
            .unwrap();

        let status = engine.status(summary.operation_id).await.unwrap();
        assert_eq!(status.status, OperationStatus::Completed);
        assert_eq!(status.succeeded, 3);
    }
}
