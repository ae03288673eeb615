//! Issue Operations (C5): single and bulk create/update, built on top of
//! the sequence allocator (C2) and the bulk engine (C3).

use std::sync::Arc;

use crate::bulk::{BulkEngine, BulkOptions, BulkSummary};
use crate::error::{Error, Result};
use crate::model::{Issue, Priority, UpdateField};
use crate::sequence::SequenceAllocator;
use crate::store::{Entity, EntityKind, Patch, Selector, StoreAdapter};
use crate::validate::normalize_status;

/// Per-entity-kind batch-size ceilings (§4.3): generous for updates, which
/// are cheap field writes, tighter for creates and deletes, which allocate
/// numbers or cascade.
pub const MAX_BATCH_SIZE_UPDATE: usize = 100;
pub const MAX_BATCH_SIZE_CREATE: usize = 50;

const DEFAULT_STATUS: &str = "backlog";

/// A single issue to create, before a number has been assigned.
///
/// `parent_issue`, when set, routes the item through `create_attached`
/// instead of `create_doc` — the "two groups split by presence of
/// `parent_issue`" behavior from the bulk-create contract, applied
/// per-item rather than by pre-partitioning the input (equivalent effect,
/// one batch instead of two).
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub title: String,
    pub status: Option<String>,
    pub priority: Option<Priority>,
    pub component_id: Option<String>,
    pub milestone_id: Option<String>,
    pub description: Option<String>,
    pub parent_issue: Option<String>,
}

impl NewIssue {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: None,
            priority: None,
            component_id: None,
            milestone_id: None,
            description: None,
            parent_issue: None,
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent_issue: impl Into<String>) -> Self {
        self.parent_issue = Some(parent_issue.into());
        self
    }
}

fn validate_new_issue(spec: &NewIssue) -> Result<()> {
    if spec.title.trim().is_empty() {
        return Err(Error::validation("title must be a non-empty string"));
    }
    Ok(())
}

/// Issue creation and update operations.
pub struct IssueOps {
    store: Arc<dyn StoreAdapter>,
    sequence: Arc<SequenceAllocator>,
    engine: Arc<BulkEngine>,
    default_priority: Priority,
}

impl IssueOps {
    #[must_use]
    pub fn new(
        store: Arc<dyn StoreAdapter>,
        sequence: Arc<SequenceAllocator>,
        engine: Arc<BulkEngine>,
        default_priority: Priority,
    ) -> Self {
        Self { store, sequence, engine, default_priority }
    }

    /// Create a single top-level issue, allocating its number.
    ///
    /// Validation runs before allocation: a rejected item never consumes a
    /// sequence number (see the numbering-vs-validation-order decision in
    /// the design notes).
    pub async fn create(&self, project_id: &str, spec: NewIssue) -> Result<Issue> {
        validate_new_issue(&spec)?;
        let parent_id = spec.parent_issue.clone();
        let number = self.sequence.next(project_id).await?;
        materialize_issue(&*self.store, project_id, number, spec, parent_id, self.default_priority).await
    }

    /// Create a sub-issue under `parent_id`, in the same project.
    pub async fn create_sub(&self, project_id: &str, parent_id: &str, spec: NewIssue) -> Result<Issue> {
        validate_new_issue(&spec)?;
        let number = self.sequence.next(project_id).await?;
        materialize_issue(&*self.store, project_id, number, spec, Some(parent_id.to_string()), self.default_priority).await
    }

    /// Apply a tagged field update to one issue and return the refreshed
    /// record.
    pub async fn update(&self, issue_id: &str, fields: Vec<UpdateField>) -> Result<Issue> {
        apply_update(&*self.store, issue_id, fields).await
    }

    /// Create many issues in `project_id`, batched via the bulk engine.
    pub async fn bulk_create(&self, project_id: &str, specs: Vec<NewIssue>, mut options: BulkOptions) -> Result<BulkSummary> {
        if specs.is_empty() {
            return Err(Error::NoItems);
        }
        options.batch_size = options.capped_batch_size(MAX_BATCH_SIZE_CREATE);

        let project_id = project_id.to_string();
        let sequence = self.sequence.clone();
        let store = self.store.clone();
        let default_priority = self.default_priority;

        self.engine
            .execute(
                specs,
                move |spec, _index| {
                    let project_id = project_id.clone();
                    let sequence = sequence.clone();
                    let store = store.clone();
                    async move {
                        validate_new_issue(&spec)?;
                        let parent_id = spec.parent_issue.clone();
                        let number = sequence.next(&project_id).await?;
                        materialize_issue(&*store, &project_id, number, spec, parent_id, default_priority).await
                    }
                },
                options,
            )
            .await
    }

    /// Update many issues, batched via the bulk engine. Each item is an
    /// `(issue_id, fields)` pair.
    pub async fn bulk_update(&self, updates: Vec<(String, Vec<UpdateField>)>, mut options: BulkOptions) -> Result<BulkSummary> {
        if updates.is_empty() {
            return Err(Error::NoItems);
        }
        options.batch_size = options.capped_batch_size(MAX_BATCH_SIZE_UPDATE);

        let store = self.store.clone();

        self.engine
            .execute(
                updates,
                move |(issue_id, fields), _index| {
                    let store = store.clone();
                    async move { apply_update(&*store, &issue_id, fields).await }
                },
                options,
            )
            .await
    }
}

async fn materialize_issue(
    store: &dyn StoreAdapter,
    project_id: &str,
    number: u64,
    spec: NewIssue,
    parent_id: Option<String>,
    default_priority: Priority,
) -> Result<Issue> {
    let project = store
        .find_one(EntityKind::Project, Selector::ById(project_id.to_string()))
        .await?
        .and_then(|e| e.as_project().cloned())
        .ok_or_else(|| Error::ProjectNotFound(project_id.to_string()))?;

    let status = match spec.status {
        Some(s) => normalize_status(&s)?,
        None => DEFAULT_STATUS.to_string(),
    };
    let priority = spec.priority.unwrap_or(default_priority);
    let description_ref = match spec.description {
        Some(text) if !text.is_empty() => {
            let reference = store.upload_markup(EntityKind::Issue, "", "description", &text, "text").await?;
            Some(reference).filter(|r| !r.is_empty())
        }
        _ => None,
    };

    let mut issue = Issue {
        id: String::new(),
        project_id: project_id.to_string(),
        number,
        identifier: project.format_issue_identifier(number),
        title: spec.title,
        status,
        priority,
        component_id: spec.component_id,
        milestone_id: spec.milestone_id,
        parent_id: parent_id.clone(),
        description_ref,
    };

    let id = if let Some(parent_id) = &parent_id {
        store
            .create_attached(EntityKind::Issue, project_id, parent_id, EntityKind::Issue, "issues", Entity::Issue(issue.clone()))
            .await?
    } else {
        store.create_doc(EntityKind::Issue, project_id, Entity::Issue(issue.clone())).await?
    };
    issue.id = id;
    Ok(issue)
}

async fn apply_update(store: &dyn StoreAdapter, issue_id: &str, fields: Vec<UpdateField>) -> Result<Issue> {
    if fields.is_empty() {
        return Err(Error::validation("no fields supplied to update"));
    }

    let mut patch = Patch::new();
    for field in fields {
        match field {
            UpdateField::Title(title) => {
                patch = patch.set("title", serde_json::Value::String(title));
            }
            UpdateField::Description(text) => {
                let reference = store.upload_markup(EntityKind::Issue, issue_id, "description", &text, "text").await?;
                patch = patch.set("description_ref", serde_json::Value::String(reference));
            }
            UpdateField::Status(status) => {
                let normalized = normalize_status(&status)?;
                patch = patch.set("status", serde_json::Value::String(normalized));
            }
            UpdateField::Priority(priority) => {
                patch = patch.set("priority", serde_json::Value::String(priority.as_str().to_string()));
            }
            UpdateField::Component(component_id) => {
                patch = patch.set("component_id", component_id.map_or(serde_json::Value::Null, serde_json::Value::String));
            }
            UpdateField::Milestone(milestone_id) => {
                patch = patch.set("milestone_id", milestone_id.map_or(serde_json::Value::Null, serde_json::Value::String));
            }
        }
    }

    store.update(EntityKind::Issue, "", issue_id, patch).await?;

    store
        .find_one(EntityKind::Issue, Selector::ById(issue_id.to_string()))
        .await?
        .and_then(Entity::into_issue)
        .ok_or_else(|| Error::not_found(format!("issue {issue_id}")))
}
