//! Store Adapter (C1): abstracts the remote tracker.
//!
//! This is the only component that performs I/O. Everything else in the
//! crate is built on top of the handful of primitives defined here — in
//! particular [`StoreAdapter::atomic_increment`], which is the single
//! linearizable operation the [`crate::sequence`] allocator depends on for
//! correctness under concurrency.
//!
//! Variants of the adapter (real, in-memory-for-tests) implement the same
//! contract; core logic is generic over `dyn StoreAdapter`.

pub mod memory;
pub mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;
use crate::model::{Component, Issue, Milestone, Project, Template};

/// The kind of entity an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Project,
    Issue,
    Component,
    Milestone,
    Template,
    Comment,
    Attachment,
}

/// A heterogeneous entity returned by `find_one`/`find_all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Entity {
    Project(Project),
    Issue(Issue),
    Component(Component),
    Milestone(Milestone),
    Template(Template),
}

impl Entity {
    #[must_use]
    pub fn as_project(&self) -> Option<&Project> {
        match self {
            Self::Project(p) => Some(p),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_issue(&self) -> Option<&Issue> {
        match self {
            Self::Issue(i) => Some(i),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_issue(self) -> Option<Issue> {
        match self {
            Self::Issue(i) => Some(i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_component(&self) -> Option<&Component> {
        match self {
            Self::Component(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_milestone(&self) -> Option<&Milestone> {
        match self {
            Self::Milestone(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_template(&self) -> Option<&Template> {
        match self {
            Self::Template(t) => Some(t),
            _ => None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Project(p) => &p.id,
            Self::Issue(i) => &i.id,
            Self::Component(c) => &c.id,
            Self::Milestone(m) => &m.id,
            Self::Template(t) => &t.id,
        }
    }
}

/// A selector identifying one entity or a set of entities.
#[derive(Debug, Clone)]
pub enum Selector {
    ById(String),
    ByProject(String),
    ByParent(String),
    ByComponent(String),
    ByMilestone(String),
    ByIdentifier { project_identifier: String, number: u64 },
    All,
}

/// An update patch: field sets plus an optional atomic increment.
///
/// `inc` must use the same linearizable primitive as
/// [`StoreAdapter::atomic_increment`] — the adapter implementation routes
/// both through the same code path.
#[derive(Debug, Clone, Default)]
pub struct Patch {
    pub set: HashMap<String, serde_json::Value>,
    pub inc: Option<(String, i64)>,
}

impl Patch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: serde_json::Value) -> Self {
        self.set.insert(field.into(), value);
        self
    }

    #[must_use]
    pub fn inc(mut self, field: impl Into<String>, delta: i64) -> Self {
        self.inc = Some((field.into(), delta));
        self
    }
}

/// The capability set the remote tracker must provide.
///
/// Methods take `&self` (not `&mut self`): the adapter must be safe for
/// concurrent use, since multiple bulk operations and multiple items within
/// one batch call into it simultaneously (see the crate's concurrency
/// model).
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    async fn find_one(&self, kind: EntityKind, selector: Selector) -> Result<Option<Entity>>;

    async fn find_all(
        &self,
        kind: EntityKind,
        selector: Selector,
        limit: Option<usize>,
    ) -> Result<Vec<Entity>>;

    /// Linearizable increment of a numeric field on a single entity.
    ///
    /// Returns the new value. Must be linearizable per `(id, field)`; this
    /// is the only primitive the sequence allocator relies on.
    async fn atomic_increment(
        &self,
        kind: EntityKind,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<i64>;

    /// Create an entity that lives in a collection on a parent (issues,
    /// comments).
    async fn create_attached(
        &self,
        kind: EntityKind,
        parent_space: &str,
        parent_id: &str,
        parent_kind: EntityKind,
        collection_name: &str,
        payload: Entity,
    ) -> Result<String>;

    async fn create_doc(&self, kind: EntityKind, space: &str, payload: Entity) -> Result<String>;

    async fn update(&self, kind: EntityKind, space: &str, id: &str, patch: Patch) -> Result<()>;

    async fn remove_attached(
        &self,
        kind: EntityKind,
        space: &str,
        id: &str,
        parent_id: &str,
        parent_kind: EntityKind,
        collection_name: &str,
    ) -> Result<()>;

    async fn remove_doc(&self, kind: EntityKind, space: &str, id: &str) -> Result<()>;

    /// Store a description out-of-line. Returns an empty ref for empty
    /// input rather than creating a reference, avoiding null-vs-empty
    /// ambiguity on retrieval.
    async fn upload_markup(
        &self,
        kind: EntityKind,
        id: &str,
        field: &str,
        text: &str,
        format: &str,
    ) -> Result<String>;

    /// Retrieve previously uploaded markup. An empty reference returns
    /// empty content.
    async fn fetch_markup(&self, reference: &str) -> Result<String>;
}
