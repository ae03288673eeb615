//! Sequence Allocator (C2): atomic per-project issue numbering.
//!
//! Contract: for a given project, [`SequenceAllocator::next`] returns a
//! positive integer strictly greater than any previously returned value for
//! that project, even under concurrent callers.
//! [`SequenceAllocator::reserve`] returns `n` contiguous integers with the
//! same guarantee for the group — used by the bulk engine and the template
//! expander to avoid per-item round-trips.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{Error, Result};
use crate::store::{Entity, EntityKind, Selector, StoreAdapter};

const HINT_TTL: Duration = Duration::from_secs(60);

/// A contiguous range of newly allocated issue numbers, `[start, end]`
/// inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatedRange {
    pub start: u64,
    pub end: u64,
}

impl AllocatedRange {
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> {
        self.start..=self.end
    }
}

struct HintEntry {
    last_value: u64,
    recorded_at: Instant,
}

/// Assigns monotonically increasing per-project issue numbers.
///
/// Correctness never depends on the hint cache or the per-project init
/// lock below — both exist purely to make first-use initialization cheap
/// and to avoid two initializers racing; the actual serialization point is
/// the store adapter's linearizable `atomic_increment`.
pub struct SequenceAllocator {
    store: Arc<dyn StoreAdapter>,
    hints: DashMap<String, HintEntry>,
    init_locks: DashMap<String, Arc<AsyncMutex<()>>>,
    initialized: DashMap<String, ()>,
}

impl SequenceAllocator {
    #[must_use]
    pub fn new(store: Arc<dyn StoreAdapter>) -> Self {
        Self {
            store,
            hints: DashMap::new(),
            init_locks: DashMap::new(),
            initialized: DashMap::new(),
        }
    }

    /// Allocate the next single number for `project_id`.
    pub async fn next(&self, project_id: &str) -> Result<u64> {
        Ok(self.reserve(project_id, 1).await?.end)
    }

    /// Allocate `n` contiguous numbers for `project_id`.
    pub async fn reserve(&self, project_id: &str, n: u64) -> Result<AllocatedRange> {
        if n == 0 {
            return Err(Error::AllocationFailed(project_id.to_string()));
        }

        let mut top = self
            .store
            .atomic_increment(EntityKind::Project, project_id, "sequence", n as i64)
            .await
            .map_err(|err| match err {
                Error::NotFound { .. } => Error::ProjectNotFound(project_id.to_string()),
                other => other,
            })?;

        if top <= 0 {
            return Err(Error::AllocationFailed(project_id.to_string()));
        }

        // A returned top exactly equal to `n` means the field was absent
        // before this call and just became `n` — this is the only way
        // that can happen, since every later call only grows the counter.
        // It signals a possibly-cold project that may already have
        // externally imported issues; correct at most once per project.
        if top as u64 == n && !self.initialized.contains_key(project_id) {
            top = self.initialize_cold_project(project_id, n, top as u64).await?;
        }

        let top = top as u64;
        self.hints.insert(
            project_id.to_string(),
            HintEntry { last_value: top, recorded_at: Instant::now() },
        );

        Ok(AllocatedRange { start: top - n + 1, end: top })
    }

    /// Advisory hint: the last allocated value for `project_id`, if
    /// recorded within the TTL. Never used for correctness.
    #[must_use]
    pub fn hint(&self, project_id: &str) -> Option<u64> {
        self.hints.get(project_id).and_then(|entry| {
            if entry.recorded_at.elapsed() <= HINT_TTL {
                Some(entry.last_value)
            } else {
                None
            }
        })
    }

    /// Re-baseline the counter against any externally imported issues,
    /// guarded by a per-project lock so concurrent cold-start callers don't
    /// double-correct.
    async fn initialize_cold_project(&self, project_id: &str, n: u64, provisional_top: u64) -> Result<i64> {
        let lock = self
            .init_locks
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if self.initialized.contains_key(project_id) {
            return Ok(provisional_top as i64);
        }

        self.store
            .find_one(EntityKind::Project, Selector::ById(project_id.to_string()))
            .await?
            .ok_or_else(|| Error::ProjectNotFound(project_id.to_string()))?;

        let existing = self
            .store
            .find_all(EntityKind::Issue, Selector::ByProject(project_id.to_string()), None)
            .await?;
        let max_existing = existing
            .iter()
            .filter_map(Entity::as_issue)
            .map(|issue| issue.number)
            .max()
            .unwrap_or(0);

        self.initialized.insert(project_id.to_string(), ());

        if max_existing <= provisional_top {
            return Ok(provisional_top as i64);
        }

        // The provisional range [1, n] collides with pre-existing
        // external numbers; bump past them. The skipped numbers between
        // `provisional_top` and `max_existing` are a documented gap.
        let extra = max_existing - provisional_top + n;
        self.store
            .atomic_increment(EntityKind::Project, project_id, "sequence", extra as i64)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Project;
    use crate::store::memory::MemoryStore;

    fn allocator_with_project() -> (SequenceAllocator, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.seed_project(Project::new("proj_1", "ENG", "Engineering"));
        let allocator = SequenceAllocator::new(store.clone());
        (allocator, store)
    }

    #[tokio::test]
    async fn next_increments_monotonically() {
        let (allocator, _store) = allocator_with_project();
        assert_eq!(allocator.next("proj_1").await.unwrap(), 1);
        assert_eq!(allocator.next("proj_1").await.unwrap(), 2);
        assert_eq!(allocator.next("proj_1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn reserve_returns_contiguous_range() {
        let (allocator, _store) = allocator_with_project();
        let range = allocator.reserve("proj_1", 5).await.unwrap();
        assert_eq!(range.start, 1);
        assert_eq!(range.end, 5);
        assert_eq!(range.len(), 5);

        let next_range = allocator.reserve("proj_1", 3).await.unwrap();
        assert_eq!(next_range.start, 6);
        assert_eq!(next_range.end, 8);
    }

    #[tokio::test]
    async fn next_errors_on_missing_project() {
        let store = Arc::new(MemoryStore::new());
        let allocator = SequenceAllocator::new(store);
        let err = allocator.next("missing").await.unwrap_err();
        assert!(matches!(err, Error::ProjectNotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_allocations_never_duplicate() {
        let (allocator, _store) = allocator_with_project();
        let allocator = Arc::new(allocator);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let allocator = allocator.clone();
            handles.push(tokio::spawn(async move {
                let mut numbers = Vec::new();
                for _ in 0..20 {
                    numbers.push(allocator.next("proj_1").await.unwrap());
                }
                numbers
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }

        all.sort_unstable();
        assert_eq!(all.len(), 200);
        let expected: Vec<u64> = (1..=200).collect();
        assert_eq!(all, expected);
    }

    #[tokio::test]
    async fn cold_project_with_imported_issues_skips_past_existing_numbers() {
        let store = Arc::new(MemoryStore::new());
        store.seed_project(Project::new("proj_1", "ENG", "Engineering"));

        // Simulate an externally imported issue with a high number, with
        // no prior allocator involvement (sequence still absent).
        let issue = crate::model::Issue {
            id: "issue_imported".to_string(),
            project_id: "proj_1".to_string(),
            number: 50,
            identifier: "ENG-50".to_string(),
            title: "Imported".to_string(),
            status: "todo".to_string(),
            priority: crate::model::Priority::Medium,
            component_id: None,
            milestone_id: None,
            parent_id: None,
            description_ref: None,
        };
        StoreAdapter::create_doc(&*store, EntityKind::Issue, "proj_1", Entity::Issue(issue))
            .await
            .unwrap();

        let allocator = SequenceAllocator::new(store);
        let range = allocator.reserve("proj_1", 2).await.unwrap();
        assert!(range.start > 50, "allocated range must not collide with imported issue 50");
    }
}
