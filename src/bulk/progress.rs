//! Progress reporting.
//!
//! A callback interface delivering [`ProgressSnapshot`] values once per
//! completed batch. Delivery goes through a `tokio::sync::watch` channel:
//! the producer's `send` never blocks and always succeeds, and each new
//! snapshot simply replaces the previous one if the consumer hasn't caught
//! up yet — a drop-oldest policy, so a slow progress callback can never
//! stall the bulk engine.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

/// A point-in-time view of a running or completed bulk operation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProgressSnapshot {
    pub processed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub percentage: f64,
    pub eta_seconds: Option<f64>,
}

impl ProgressSnapshot {
    #[must_use]
    pub fn compute(processed: usize, total: usize, succeeded: usize, failed: usize, elapsed_secs: f64) -> Self {
        let percentage = if total == 0 { 100.0 } else { (processed as f64 / total as f64) * 100.0 };
        let eta_seconds = if processed > 0 {
            let remaining = total.saturating_sub(processed);
            Some(((remaining as f64) * elapsed_secs / processed as f64).round())
        } else {
            None
        };
        Self { processed, total, succeeded, failed, percentage, eta_seconds }
    }
}

type Callback = Arc<dyn Fn(ProgressSnapshot) + Send + Sync>;

/// Drives a user-supplied callback off a watch channel so the engine's own
/// batch loop never waits on it.
pub struct ProgressReporter {
    sender: Option<watch::Sender<Option<ProgressSnapshot>>>,
}

impl ProgressReporter {
    /// No callback configured: `report` is a no-op.
    #[must_use]
    pub fn none() -> Self {
        Self { sender: None }
    }

    /// Wrap `callback`, spawning a background task that invokes it with
    /// every snapshot the watch channel settles on.
    #[must_use]
    pub fn new(callback: Callback) -> Self {
        let (tx, mut rx) = watch::channel(None);
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                if let Some(snapshot) = rx.borrow_and_update().clone() {
                    callback(snapshot);
                }
            }
        });
        Self { sender: Some(tx) }
    }

    /// Publish a snapshot. Never blocks; silently replaces any snapshot the
    /// consumer hasn't processed yet.
    pub fn report(&self, snapshot: ProgressSnapshot) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(Some(snapshot));
        }
    }
}
