//! Tunables for a single bulk-engine invocation.

use std::sync::Arc;

use super::progress::ProgressSnapshot;

/// Default batch size when the caller doesn't specify one.
pub const DEFAULT_BATCH_SIZE: usize = 25;

type ProgressCallback = Arc<dyn Fn(ProgressSnapshot) + Send + Sync>;

/// Options shared by every bulk operation. Entity-specific batch-size caps
/// (updates vs. creates/deletes) are enforced by the caller via
/// [`BulkOptions::with_max_batch_size`], not by this type itself — the
/// engine has no notion of entity kind.
#[derive(Clone, Default)]
pub struct BulkOptions {
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub continue_on_error: bool,
    pub timeout_ms: Option<u64>,
    pub progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for BulkOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkOptions")
            .field("batch_size", &self.batch_size)
            .field("batch_delay_ms", &self.batch_delay_ms)
            .field("continue_on_error", &self.continue_on_error)
            .field("timeout_ms", &self.timeout_ms)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl BulkOptions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay_ms: 0,
            continue_on_error: true,
            timeout_ms: None,
            progress: None,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_batch_delay_ms(mut self, delay_ms: u64) -> Self {
        self.batch_delay_ms = delay_ms;
        self
    }

    #[must_use]
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Clamp `batch_size` into `[1, max]`, for callers enforcing a
    /// per-entity-kind ceiling (e.g. 100 for updates, 50 for creates and
    /// deletes).
    #[must_use]
    pub fn capped_batch_size(&self, max: usize) -> usize {
        self.batch_size.clamp(1, max.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let opts = BulkOptions::new();
        assert_eq!(opts.batch_size, 25);
        assert_eq!(opts.batch_delay_ms, 0);
        assert!(opts.continue_on_error);
    }

    #[test]
    fn capped_batch_size_respects_ceiling() {
        let opts = BulkOptions::new().with_batch_size(500);
        assert_eq!(opts.capped_batch_size(100), 100);
        assert_eq!(opts.capped_batch_size(50), 50);

        let opts = BulkOptions::new().with_batch_size(0);
        assert_eq!(opts.capped_batch_size(100), 1);
    }
}
