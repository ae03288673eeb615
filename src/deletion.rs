//! Cascading Deletion Planner (C4): impact analysis, blocker detection,
//! and leaves-first cascade execution, reusing the bulk engine (C3) for
//! project-wide cascades.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::bulk::{BulkEngine, BulkOptions, BulkSummary};
use crate::error::{Error, Result};
use crate::store::{Entity, EntityKind, Selector, StoreAdapter};

/// Terminal issue statuses: a project with any issue outside this set is
/// considered to have unfinished work, which blocks project deletion
/// without `force`.
const TERMINAL_STATUSES: [&str; 2] = ["done", "cancelled"];

/// Impact analysis result for a single entity, before any deletion runs.
#[derive(Debug, Clone)]
pub struct ImpactPlan {
    pub root_kind: EntityKind,
    pub root_id: String,
    /// Dependent entities in leaves-first order; the root itself is not
    /// included here (callers delete it last, after `order`).
    pub order: Vec<(EntityKind, String)>,
    pub counts: HashMap<EntityKind, usize>,
    pub blockers: Vec<String>,
}

impl ImpactPlan {
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        !self.blockers.is_empty()
    }

    #[must_use]
    pub fn total_affected(&self) -> usize {
        self.order.len() + 1
    }
}

/// Outcome of executing (or dry-running) an `ImpactPlan`.
#[derive(Debug, Clone)]
pub struct DeletionSummary {
    pub dry_run: bool,
    pub deleted_count: usize,
    pub skipped_count: usize,
    pub plan: ImpactPlan,
}

pub struct DeletionPlanner {
    store: Arc<dyn StoreAdapter>,
    engine: Arc<BulkEngine>,
}

impl DeletionPlanner {
    #[must_use]
    pub fn new(store: Arc<dyn StoreAdapter>, engine: Arc<BulkEngine>) -> Self {
        Self { store, engine }
    }

    /// Impact analysis for a single issue: transitive sub-issues via BFS
    /// over `parent = E`, leaves-first.
    pub async fn plan_issue(&self, issue_id: &str) -> Result<ImpactPlan> {
        let root = self
            .store
            .find_one(EntityKind::Issue, Selector::ById(issue_id.to_string()))
            .await?
            .and_then(|e| e.as_issue().cloned())
            .ok_or_else(|| Error::not_found(format!("issue {issue_id}")))?;

        let mut visited = HashSet::new();
        visited.insert(root.id.clone());
        let mut frontier = vec![root.id.clone()];
        let mut levels: Vec<Vec<String>> = Vec::new();

        while !frontier.is_empty() {
            let mut next_level = Vec::new();
            for parent_id in &frontier {
                let children = self.store.find_all(EntityKind::Issue, Selector::ByParent(parent_id.clone()), None).await?;
                for child in children.iter().filter_map(Entity::as_issue) {
                    if visited.contains(&child.id) {
                        // Back-edge in supposedly-acyclic data: log and skip
                        // rather than loop forever.
                        tracing::warn!(issue_id = %child.id, "cyclic sub-issue reference ignored during impact analysis");
                        continue;
                    }
                    visited.insert(child.id.clone());
                    next_level.push(child.id.clone());
                }
            }
            if next_level.is_empty() {
                break;
            }
            frontier = next_level.clone();
            levels.push(next_level);
        }

        // Deepest level first so the execution order deletes leaves before
        // their ancestors.
        let mut order = Vec::new();
        for level in levels.into_iter().rev() {
            for id in level {
                order.push((EntityKind::Issue, id));
            }
        }

        let mut counts = HashMap::new();
        counts.insert(EntityKind::Issue, order.len());

        Ok(ImpactPlan { root_kind: EntityKind::Issue, root_id: root.id, order, counts, blockers: Vec::new() })
    }

    /// Impact analysis for a project: every issue, component, milestone,
    /// and template in its space, flat (no transitive ordering needed
    /// beyond "issues before labels before the project").
    pub async fn plan_project(&self, project_id: &str) -> Result<ImpactPlan> {
        self.store
            .find_one(EntityKind::Project, Selector::ById(project_id.to_string()))
            .await?
            .ok_or_else(|| Error::ProjectNotFound(project_id.to_string()))?;

        let issues = self.store.find_all(EntityKind::Issue, Selector::ByProject(project_id.to_string()), None).await?;
        let components = self.store.find_all(EntityKind::Component, Selector::ByProject(project_id.to_string()), None).await?;
        let milestones = self.store.find_all(EntityKind::Milestone, Selector::ByProject(project_id.to_string()), None).await?;
        let templates = self.store.find_all(EntityKind::Template, Selector::ByProject(project_id.to_string()), None).await?;

        let mut blockers = Vec::new();
        let non_terminal = issues
            .iter()
            .filter_map(Entity::as_issue)
            .filter(|issue| !TERMINAL_STATUSES.contains(&issue.status.as_str()))
            .count();
        if non_terminal > 0 {
            blockers.push(format!("{non_terminal} non-terminal issue(s)"));
        }

        let mut order = Vec::new();
        order.extend(issues.iter().map(|e| (EntityKind::Issue, e.id().to_string())));
        order.extend(components.iter().map(|e| (EntityKind::Component, e.id().to_string())));
        order.extend(milestones.iter().map(|e| (EntityKind::Milestone, e.id().to_string())));
        order.extend(templates.iter().map(|e| (EntityKind::Template, e.id().to_string())));

        let mut counts = HashMap::new();
        counts.insert(EntityKind::Issue, issues.len());
        counts.insert(EntityKind::Component, components.len());
        counts.insert(EntityKind::Milestone, milestones.len());
        counts.insert(EntityKind::Template, templates.len());

        Ok(ImpactPlan { root_kind: EntityKind::Project, root_id: project_id.to_string(), order, counts, blockers })
    }

    /// Impact analysis for a component or milestone: every issue
    /// referencing it, no transitive dependents.
    pub async fn plan_label(&self, kind: EntityKind, _project_id: &str, label_id: &str) -> Result<ImpactPlan> {
        if kind != EntityKind::Component && kind != EntityKind::Milestone {
            return Err(Error::invalid_field("deletion planner", "kind"));
        }

        let selector = if kind == EntityKind::Component {
            Selector::ByComponent(label_id.to_string())
        } else {
            Selector::ByMilestone(label_id.to_string())
        };
        let referencing = self.store.find_all(EntityKind::Issue, selector, None).await?;

        let mut blockers = Vec::new();
        if !referencing.is_empty() {
            blockers.push(format!("{} referencing issue(s)", referencing.len()));
        }

        let order = referencing.iter().map(|e| (EntityKind::Issue, e.id().to_string())).collect::<Vec<_>>();
        let mut counts = HashMap::new();
        counts.insert(EntityKind::Issue, order.len());

        Ok(ImpactPlan { root_kind: kind, root_id: label_id.to_string(), order, counts, blockers })
    }

    /// Execute (or, if `dry_run`, merely report) a previously computed
    /// plan. `force` overrides blockers.
    pub async fn execute(&self, plan: ImpactPlan, dry_run: bool, force: bool) -> Result<DeletionSummary> {
        if dry_run {
            let deleted_count = plan.total_affected();
            return Ok(DeletionSummary { dry_run: true, deleted_count, skipped_count: 0, plan });
        }

        if plan.is_blocked() && !force {
            return Err(Error::DeletionBlocked { blockers: plan.blockers.clone() });
        }

        match plan.root_kind {
            EntityKind::Issue => self.execute_issue_deletion(plan).await,
            EntityKind::Project => self.execute_project_deletion(plan).await,
            EntityKind::Component | EntityKind::Milestone => self.execute_label_deletion(plan).await,
            EntityKind::Template | EntityKind::Comment | EntityKind::Attachment => {
                self.store.remove_doc(plan.root_kind, "", &plan.root_id).await?;
                Ok(DeletionSummary { dry_run: false, deleted_count: 1, skipped_count: 0, plan })
            }
        }
    }

    async fn execute_issue_deletion(&self, plan: ImpactPlan) -> Result<DeletionSummary> {
        let mut deleted = 0;
        for (kind, id) in &plan.order {
            self.delete_issue_by_id(*kind, id).await?;
            deleted += 1;
        }
        self.delete_issue_by_id(EntityKind::Issue, &plan.root_id).await?;
        deleted += 1;
        Ok(DeletionSummary { dry_run: false, deleted_count: deleted, skipped_count: 0, plan })
    }

    async fn delete_issue_by_id(&self, kind: EntityKind, id: &str) -> Result<()> {
        let issue = self
            .store
            .find_one(kind, Selector::ById(id.to_string()))
            .await?
            .and_then(Entity::into_issue);
        match issue.and_then(|i| i.parent_id) {
            Some(parent_id) => {
                self.store.remove_attached(kind, "", id, &parent_id, EntityKind::Issue, "issues").await
            }
            None => self.store.remove_doc(kind, "", id).await,
        }
    }

    async fn execute_label_deletion(&self, plan: ImpactPlan) -> Result<DeletionSummary> {
        let field = if plan.root_kind == EntityKind::Component { "component_id" } else { "milestone_id" };
        for (_, issue_id) in &plan.order {
            let patch = crate::store::Patch::new().set(field, serde_json::Value::Null);
            self.store.update(EntityKind::Issue, "", issue_id, patch).await?;
        }
        self.store.remove_doc(plan.root_kind, "", &plan.root_id).await?;
        let deleted = plan.order.len() + 1;
        Ok(DeletionSummary { dry_run: false, deleted_count: deleted, skipped_count: 0, plan })
    }

    async fn execute_project_deletion(&self, plan: ImpactPlan) -> Result<DeletionSummary> {
        let issue_ids: Vec<String> =
            plan.order.iter().filter(|(kind, _)| *kind == EntityKind::Issue).map(|(_, id)| id.clone()).collect();
        let other_ids: Vec<(EntityKind, String)> =
            plan.order.iter().filter(|(kind, _)| *kind != EntityKind::Issue).cloned().collect();

        let mut deleted = 0;
        if !issue_ids.is_empty() {
            let store = self.store.clone();
            let summary = self
                .engine
                .execute(
                    issue_ids,
                    move |issue_id, _index| {
                        let store = store.clone();
                        async move { store.remove_doc(EntityKind::Issue, "", &issue_id).await }
                    },
                    BulkOptions::new().with_continue_on_error(true),
                )
                .await?;
            deleted += summary.succeeded;
        }

        for (kind, id) in &other_ids {
            self.store.remove_doc(*kind, "", id).await?;
            deleted += 1;
        }

        self.store.remove_doc(EntityKind::Project, "", &plan.root_id).await?;
        deleted += 1;

        Ok(DeletionSummary { dry_run: false, deleted_count: deleted, skipped_count: 0, plan })
    }

    /// Bulk-delete a set of issue ids, deduplicated, optionally cascading
    /// to sub-issues first. Reported `total` is the unique count.
    pub async fn bulk_delete_issues(&self, issue_ids: Vec<String>, cascade: bool, options: BulkOptions) -> Result<BulkSummary> {
        let mut seen = HashSet::new();
        let unique: Vec<String> = issue_ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
        if unique.is_empty() {
            return Err(Error::NoItems);
        }

        let store = self.store.clone();
        let planner_store = self.store.clone();
        let planner_engine = self.engine.clone();

        self.engine
            .execute(
                unique,
                move |issue_id, _index| {
                    let store = store.clone();
                    let planner = DeletionPlanner::new(planner_store.clone(), planner_engine.clone());
                    async move {
                        if cascade {
                            let plan = planner.plan_issue(&issue_id).await?;
                            let summary = planner.execute_issue_deletion(plan).await?;
                            Ok(summary.deleted_count)
                        } else {
                            store.remove_doc(EntityKind::Issue, "", &issue_id).await?;
                            Ok(1usize)
                        }
                    }
                },
                options,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issues::{IssueOps, NewIssue};
    use crate::model::{Component, Project};
    use crate::sequence::SequenceAllocator;
    use crate::store::memory::MemoryStore;

    async fn setup() -> (DeletionPlanner, IssueOps, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.seed_project(Project::new("proj_1", "ENG", "Engineering"));
        let sequence = Arc::new(SequenceAllocator::new(store.clone()));
        let engine = Arc::new(BulkEngine::new());
        let ops = IssueOps::new(store.clone(), sequence, engine.clone(), crate::model::Priority::Medium);
        let planner = DeletionPlanner::new(store.clone(), engine);
        (planner, ops, store)
    }

    #[tokio::test]
    async fn plan_issue_orders_sub_issues_leaves_first() {
        let (planner, ops, _store) = setup().await;
        let parent = ops.create("proj_1", NewIssue::new("Parent")).await.unwrap();
        let child = ops.create_sub("proj_1", &parent.id, NewIssue::new("Child")).await.unwrap();
        let _grandchild = ops.create_sub("proj_1", &child.id, NewIssue::new("Grandchild")).await.unwrap();

        let plan = planner.plan_issue(&parent.id).await.unwrap();
        assert_eq!(plan.order.len(), 2);
        // Grandchild (deepest) comes before child.
        assert_eq!(plan.order[0].1, _grandchild.id);
        assert_eq!(plan.order[1].1, child.id);
    }

    /// Spec §8 scenario 4: cascading deletion of a parent with two
    /// sub-issues plus one standalone, leaving an untouched sibling.
    #[tokio::test]
    async fn bulk_delete_cascades_sub_issues_and_leaves_sibling() {
        let (planner, ops, store) = setup().await;
        let parent = ops.create("proj_1", NewIssue::new("TEST-1")).await.unwrap();
        let _child_a = ops.create_sub("proj_1", &parent.id, NewIssue::new("TEST-2")).await.unwrap();
        let _child_b = ops.create_sub("proj_1", &parent.id, NewIssue::new("TEST-3")).await.unwrap();
        let standalone = ops.create("proj_1", NewIssue::new("TEST-4")).await.unwrap();
        let also_standalone = ops.create("proj_1", NewIssue::new("TEST-5")).await.unwrap();

        let summary = planner
            .bulk_delete_issues(vec![parent.id.clone(), also_standalone.id.clone()], true, BulkOptions::new())
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 2);
        let remaining = store.find_all(EntityKind::Issue, Selector::ByProject("proj_1".to_string()), None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id(), standalone.id);
    }

    #[tokio::test]
    async fn dry_run_performs_no_writes() {
        let (planner, ops, store) = setup().await;
        let issue = ops.create("proj_1", NewIssue::new("Solo")).await.unwrap();
        let plan = planner.plan_issue(&issue.id).await.unwrap();
        let summary = planner.execute(plan, true, false).await.unwrap();
        assert!(summary.dry_run);

        let still_there = store.find_one(EntityKind::Issue, Selector::ById(issue.id)).await.unwrap();
        assert!(still_there.is_some());
    }

    /// Spec §8 scenario 6: a referenced component blocks deletion unless
    /// forced, and force nulls the reference on every affected issue.
    #[tokio::test]
    async fn component_deletion_is_blocked_without_force_and_nulls_refs_with_force() {
        let (planner, ops, store) = setup().await;
        let component =
            Entity::Component(Component { id: String::new(), project_id: "proj_1".to_string(), name: "Backend".to_string() });
        let component_id = store.create_doc(EntityKind::Component, "proj_1", component).await.unwrap();

        let mut issues = Vec::new();
        for i in 0..3 {
            let issue = ops.create("proj_1", NewIssue::new(format!("Issue {i}"))).await.unwrap();
            let patch = crate::store::Patch::new().set("component_id", serde_json::Value::String(component_id.clone()));
            store.update(EntityKind::Issue, "", &issue.id, patch).await.unwrap();
            issues.push(issue.id);
        }

        let plan = planner.plan_label(EntityKind::Component, "proj_1", &component_id).await.unwrap();
        assert!(plan.is_blocked());
        let blocked = planner.execute(plan.clone(), false, false).await.unwrap_err();
        assert!(matches!(blocked, Error::DeletionBlocked { .. }));

        let summary = planner.execute(plan, false, true).await.unwrap();
        assert_eq!(summary.deleted_count, 4);
        for issue_id in issues {
            let issue = store.find_one(EntityKind::Issue, Selector::ById(issue_id)).await.unwrap().and_then(Entity::into_issue).unwrap();
            assert_eq!(issue.component_id, None);
        }
    }
}
