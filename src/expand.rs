//! Template Expander (C6): instantiates a template's parent + children as
//! real issues, drawing a single contiguous number range from the
//! sequence allocator (C2) so the whole tree numbers atomically relative
//! to any interleaved creates.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::issues::NewIssue;
use crate::model::{Issue, Priority};
use crate::sequence::SequenceAllocator;
use crate::store::{Entity, EntityKind, Selector, StoreAdapter};

/// Caller-supplied overrides applied to the parent issue created from a
/// template; children are always created as the template defines them.
#[derive(Debug, Clone, Default)]
pub struct ExpandOverrides {
    pub title: Option<String>,
    pub priority: Option<Priority>,
}

/// Result of expanding one template: the parent plus its children, in
/// creation order.
#[derive(Debug, Clone)]
pub struct ExpandedTemplate {
    pub parent: Issue,
    pub children: Vec<Issue>,
}

pub struct TemplateExpander {
    store: Arc<dyn StoreAdapter>,
    sequence: Arc<SequenceAllocator>,
}

impl TemplateExpander {
    #[must_use]
    pub fn new(store: Arc<dyn StoreAdapter>, sequence: Arc<SequenceAllocator>) -> Self {
        Self { store, sequence }
    }

    /// Expand `template_id` into a parent issue and one sub-issue per
    /// child. If a child fails partway through, the remainder is
    /// abandoned and already-created entities are left in place — there
    /// is no multi-entity transaction primitive to roll back with (open
    /// question in the design notes, resolved this way to match the
    /// store's no-rollback reality rather than fake atomicity).
    pub async fn expand(&self, template_id: &str, overrides: ExpandOverrides) -> Result<ExpandedTemplate> {
        let template = self
            .store
            .find_one(EntityKind::Template, Selector::ById(template_id.to_string()))
            .await?
            .and_then(|e| e.as_template().cloned())
            .ok_or_else(|| Error::not_found(format!("template {template_id}")))?;

        let range = self.sequence.reserve(&template.project_id, 1 + template.children.len() as u64).await?;
        let mut numbers = range.iter();
        let parent_number = numbers.next().ok_or_else(|| Error::AllocationFailed(template.project_id.clone()))?;

        let project = self
            .store
            .find_one(EntityKind::Project, Selector::ById(template.project_id.clone()))
            .await?
            .and_then(|e| e.as_project().cloned())
            .ok_or_else(|| Error::ProjectNotFound(template.project_id.clone()))?;

        let parent_description_ref = upload_description(&*self.store, template.description).await?;
        let parent_spec = NewIssue {
            title: overrides.title.unwrap_or(template.title),
            status: None,
            priority: Some(overrides.priority.unwrap_or(template.priority)),
            component_id: None,
            milestone_id: None,
            description: None,
            parent_issue: None,
        };
        let mut parent = build_issue(&project, parent_number, parent_spec, None, parent_description_ref);
        let parent_id = self.store.create_doc(EntityKind::Issue, &template.project_id, Entity::Issue(parent.clone())).await?;
        parent.id = parent_id.clone();

        let mut children = Vec::with_capacity(template.children.len());
        for child_template in template.children {
            let number = numbers
                .next()
                .ok_or_else(|| Error::AllocationFailed(template.project_id.clone()))?;
            let description_ref = upload_description(&*self.store, child_template.description).await?;
            let spec = NewIssue {
                title: child_template.title,
                status: None,
                priority: Some(child_template.priority),
                component_id: None,
                milestone_id: None,
                description: None,
                parent_issue: Some(parent_id.clone()),
            };
            let mut child = build_issue(&project, number, spec, Some(parent_id.clone()), description_ref);
            let child_id = self
                .store
                .create_attached(EntityKind::Issue, &template.project_id, &parent_id, EntityKind::Issue, "issues", Entity::Issue(child.clone()))
                .await?;
            child.id = child_id;
            children.push(child);
        }

        Ok(ExpandedTemplate { parent, children })
    }
}

async fn upload_description(store: &dyn StoreAdapter, text: Option<String>) -> Result<Option<String>> {
    match text {
        Some(text) if !text.is_empty() => {
            let reference = store.upload_markup(EntityKind::Issue, "", "description", &text, "text").await?;
            Ok(Some(reference).filter(|r| !r.is_empty()))
        }
        _ => Ok(None),
    }
}

fn build_issue(project: &crate::model::Project, number: u64, spec: NewIssue, parent_id: Option<String>, description_ref: Option<String>) -> Issue {
    Issue {
        id: String::new(),
        project_id: project.id.clone(),
        number,
        identifier: project.format_issue_identifier(number),
        title: spec.title,
        status: "backlog".to_string(),
        priority: spec.priority.unwrap_or_default(),
        component_id: spec.component_id,
        milestone_id: spec.milestone_id,
        parent_id,
        description_ref,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Project, Template, TemplateChild};
    use crate::store::memory::MemoryStore;
    use std::collections::HashSet;

    async fn setup_with_template(child_count: usize) -> (TemplateExpander, Arc<MemoryStore>, String) {
        let store = Arc::new(MemoryStore::new());
        store.seed_project(Project::new("proj_1", "TEST", "Test Project"));
        let sequence = Arc::new(SequenceAllocator::new(store.clone()));

        let children = (0..child_count)
            .map(|i| TemplateChild { title: format!("Child {i}"), priority: Priority::Medium, description: None })
            .collect();
        let template = Template {
            id: String::new(),
            project_id: "proj_1".to_string(),
            title: "Sprint checklist".to_string(),
            priority: Priority::Medium,
            description: None,
            children,
        };
        let template_id = store.create_doc(EntityKind::Template, "proj_1", Entity::Template(template)).await.unwrap();

        (TemplateExpander::new(store.clone(), sequence), store, template_id)
    }

    #[tokio::test]
    async fn expand_creates_parent_and_children_with_contiguous_numbers() {
        let (expander, _store, template_id) = setup_with_template(2).await;
        let result = expander.expand(&template_id, ExpandOverrides::default()).await.unwrap();

        assert_eq!(result.children.len(), 2);
        let mut numbers = vec![result.parent.number];
        numbers.extend(result.children.iter().map(|c| c.number));
        numbers.sort_unstable();
        assert_eq!(numbers, vec![1, 2, 3]);
        for child in &result.children {
            assert_eq!(child.parent_id.as_deref(), Some(result.parent.id.as_str()));
        }
    }

    #[tokio::test]
    async fn overrides_replace_title_and_priority_on_parent_only() {
        let (expander, _store, template_id) = setup_with_template(1).await;
        let overrides = ExpandOverrides { title: Some("Custom Title".to_string()), priority: Some(Priority::Urgent) };
        let result = expander.expand(&template_id, overrides).await.unwrap();

        assert_eq!(result.parent.title, "Custom Title");
        assert_eq!(result.parent.priority, Priority::Urgent);
        assert_eq!(result.children[0].priority, Priority::Medium);
    }

    /// Spec §8 scenario 5: 5 concurrent template expansions, each
    /// producing 3 issues, 15 total with no duplicate numbers.
    #[tokio::test]
    async fn concurrent_expansions_never_duplicate_numbers() {
        let (expander, _store, template_id) = setup_with_template(2).await;
        let expander = Arc::new(expander);

        let mut handles = Vec::new();
        for _ in 0..5 {
            let expander = expander.clone();
            let template_id = template_id.clone();
            handles.push(tokio::spawn(async move {
                let result = expander.expand(&template_id, ExpandOverrides::default()).await.unwrap();
                let mut numbers = vec![result.parent.number];
                numbers.extend(result.children.iter().map(|c| c.number));
                numbers
            }));
        }

        let mut all = HashSet::new();
        let mut total = 0;
        for handle in handles {
            for number in handle.await.unwrap() {
                total += 1;
                assert!(all.insert(number), "duplicate number {number}");
            }
        }
        assert_eq!(total, 15);
    }
}
