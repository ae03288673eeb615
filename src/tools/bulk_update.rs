use async_trait::async_trait;
use serde_json::{json, Value};

use crate::bulk::BulkOptions;
use crate::error::{Error, Result};
use crate::issues::MAX_BATCH_SIZE_UPDATE;
use crate::model::UpdateField;
use crate::validate::{normalize_priority, normalize_status};

use super::{resolve_issue_id, Context, Tool};

const MAX_ITEMS: usize = 1000;

pub struct BulkUpdateIssuesTool;

#[async_trait]
impl Tool for BulkUpdateIssuesTool {
    fn name(&self) -> &'static str {
        "bulk_update_issues"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["updates"],
            "properties": {
                "updates": {"type": "array", "items": {"type": "object"}},
                "options": {"type": "object"},
            }
        })
    }

    fn validate(&self, input: &Value) -> Result<()> {
        let updates = input
            .get("updates")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::validation("updates must be a non-empty array"))?;
        if updates.is_empty() {
            return Err(Error::NoItems);
        }
        if updates.len() > MAX_ITEMS {
            return Err(Error::validation(format!("bulk update accepts at most {MAX_ITEMS} items")));
        }
        Ok(())
    }

    async fn execute(&self, context: &Context, input: Value) -> Result<Value> {
        let updates = input["updates"].as_array().cloned().unwrap_or_default();
        let dry_run = input.get("options").and_then(|o| o.get("dry_run")).and_then(Value::as_bool).unwrap_or(false);

        let mut resolved = Vec::with_capacity(updates.len());
        let mut validation_errors = Vec::new();
        for (index, item) in updates.iter().enumerate() {
            match parse_update_item(&*context.store, item).await {
                Ok(entry) => resolved.push(entry),
                Err(err) => validation_errors.push(json!({"index": index, "error": err.to_structured_json()})),
            }
        }

        if dry_run {
            return Ok(json!({
                "success": true,
                "dry_run": true,
                "valid_count": resolved.len(),
                "invalid_count": validation_errors.len(),
                "validation_errors": validation_errors,
            }));
        }

        if resolved.is_empty() {
            return Ok(json!({
                "success": false,
                "summary": {"total": updates.len(), "succeeded": 0, "failed": validation_errors.len(), "elapsed_ms": 0},
                "updated_issues": [],
                "failed_issues": validation_errors,
            }));
        }

        let mut options = BulkOptions::new();
        if let Some(batch_size) = input.get("options").and_then(|o| o.get("batch_size")).and_then(Value::as_u64) {
            options = options.with_batch_size(batch_size as usize);
        }
        if let Some(continue_on_error) = input.get("options").and_then(|o| o.get("continue_on_error")).and_then(Value::as_bool) {
            options = options.with_continue_on_error(continue_on_error);
        }
        options.batch_size = options.capped_batch_size(MAX_BATCH_SIZE_UPDATE);

        let summary = context.issues.bulk_update(resolved, options).await?;

        let validation_error_count = validation_errors.len();
        let updated_issues: Vec<Value> = summary.items.iter().filter(|i| i.succeeded).filter_map(|i| i.result.clone()).collect();
        let failed_issues: Vec<Value> = summary
            .items
            .iter()
            .filter(|i| !i.succeeded)
            .map(|i| json!({"index": i.index, "error": i.error}))
            .chain(validation_errors)
            .collect();

        Ok(json!({
            "success": summary.failed == 0,
            "summary": {
                "total": summary.total + validation_error_count,
                "succeeded": summary.succeeded,
                "failed": summary.failed + validation_error_count,
                "elapsed_ms": summary.elapsed.as_millis() as u64,
            },
            "updated_issues": updated_issues,
            "failed_issues": failed_issues,
        }))
    }
}

async fn parse_update_item(store: &dyn crate::store::StoreAdapter, item: &Value) -> Result<(String, Vec<UpdateField>)> {
    let identifier = item
        .get("issue_identifier")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::validation("issue_identifier is required"))?;
    let issue_id = resolve_issue_id(store, identifier).await?;

    // §6 documents the update item as `{issue_identifier, field, value}`,
    // a single tagged field per item; a `fields` array is also accepted so
    // one item can carry several field changes at once.
    let fields = if let Some(fields_raw) = item.get("fields").and_then(Value::as_array) {
        if fields_raw.is_empty() {
            return Err(Error::validation("fields must be a non-empty array"));
        }
        fields_raw.iter().map(parse_update_field).collect::<Result<Vec<_>>>()?
    } else if item.get("field").is_some() {
        vec![parse_update_field(item)?]
    } else {
        return Err(Error::validation("update item must supply either `field`/`value` or a `fields` array"));
    };
    Ok((issue_id, fields))
}

fn parse_update_field(entry: &Value) -> Result<UpdateField> {
    let field = entry.get("field").and_then(Value::as_str).ok_or_else(|| Error::validation("field name is required"))?;
    let value = entry.get("value");

    match field {
        "title" => {
            let title = value.and_then(Value::as_str).ok_or_else(|| Error::invalid_field("issue", "title"))?;
            Ok(UpdateField::Title(title.to_string()))
        }
        "description" => {
            let text = value.and_then(Value::as_str).ok_or_else(|| Error::invalid_field("issue", "description"))?;
            Ok(UpdateField::Description(text.to_string()))
        }
        "status" => {
            let status = value.and_then(Value::as_str).ok_or_else(|| Error::invalid_field("issue", "status"))?;
            Ok(UpdateField::Status(normalize_status(status)?))
        }
        "priority" => {
            let priority = value.and_then(Value::as_str).ok_or_else(|| Error::invalid_field("issue", "priority"))?;
            Ok(UpdateField::Priority(normalize_priority(priority)?))
        }
        "component" => Ok(UpdateField::Component(value.and_then(Value::as_str).map(str::to_string))),
        "milestone" => Ok(UpdateField::Milestone(value.and_then(Value::as_str).map(str::to_string))),
        other => Err(Error::invalid_field("issue", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::BulkEngine;
    use crate::deletion::DeletionPlanner;
    use crate::expand::TemplateExpander;
    use crate::issues::{IssueOps, NewIssue};
    use crate::model::{Priority, Project};
    use crate::sequence::SequenceAllocator;
    use crate::store::memory::MemoryStore;
    use std::sync::Arc;

    #[test]
    fn parse_update_field_normalizes_status_and_priority() {
        assert_eq!(parse_update_field(&json!({"field": "status", "value": "WIP"})).unwrap(), UpdateField::Status("in_progress".to_string()));
        assert_eq!(parse_update_field(&json!({"field": "priority", "value": "critical"})).unwrap(), UpdateField::Priority(Priority::Urgent));
    }

    #[test]
    fn parse_update_field_rejects_unknown_field() {
        assert!(parse_update_field(&json!({"field": "nonsense", "value": "x"})).is_err());
    }

    #[test]
    fn parse_update_field_clears_component_on_null_value() {
        assert_eq!(parse_update_field(&json!({"field": "component", "value": null})).unwrap(), UpdateField::Component(None));
    }

    async fn setup() -> (Context, String) {
        let store = Arc::new(MemoryStore::new());
        store.seed_project(Project::new("proj_1", "ENG", "Engineering"));
        let store: Arc<dyn crate::store::StoreAdapter> = store;
        let sequence = Arc::new(SequenceAllocator::new(store.clone()));
        let engine = Arc::new(BulkEngine::new());
        let issues = Arc::new(IssueOps::new(store.clone(), sequence.clone(), engine.clone(), Priority::Medium));
        let deletion = Arc::new(DeletionPlanner::new(store.clone(), engine.clone()));
        let expander = Arc::new(TemplateExpander::new(store.clone(), sequence.clone()));

        let issue = issues.create("proj_1", NewIssue::new("Original title")).await.unwrap();
        let context = Context { store, sequence, engine, issues, deletion, expander };
        (context, issue.identifier)
    }

    /// Spec §8 scenario 3: a dry-run bulk update reports validity without
    /// touching any issue, using the single `{field, value}` item shape
    /// §6 documents (not the `fields` array).
    #[tokio::test]
    async fn dry_run_reports_counts_without_mutating_issues() {
        let (context, identifier) = setup().await;
        let tool = BulkUpdateIssuesTool;
        let input = json!({
            "updates": [
                {"issue_identifier": identifier, "field": "status", "value": "done"},
                {"issue_identifier": "ENG-999", "field": "status", "value": "done"},
            ],
            "options": {"dry_run": true},
        });

        let output = tool.execute(&context, input).await.unwrap();
        assert_eq!(output["dry_run"], json!(true));
        assert_eq!(output["valid_count"], json!(1));
        assert_eq!(output["invalid_count"], json!(1));

        let issue_id = resolve_issue_id(&*context.store, &identifier).await.unwrap();
        let stored = context
            .store
            .find_one(crate::store::EntityKind::Issue, crate::store::Selector::ById(issue_id))
            .await
            .unwrap()
            .and_then(crate::store::Entity::into_issue)
            .unwrap();
        assert_eq!(stored.title, "Original title");
        assert_eq!(stored.status, "backlog");
    }

    #[tokio::test]
    async fn single_field_shape_applies_live_update() {
        let (context, identifier) = setup().await;
        let tool = BulkUpdateIssuesTool;
        let input = json!({"updates": [{"issue_identifier": identifier, "field": "title", "value": "Changed"}]});

        let output = tool.execute(&context, input).await.unwrap();
        assert_eq!(output["success"], json!(true));
        assert_eq!(output["updated_issues"][0]["title"], json!("Changed"));
    }

    #[tokio::test]
    async fn live_update_applies_field_and_reports_success() {
        let (context, identifier) = setup().await;
        let tool = BulkUpdateIssuesTool;
        let input = json!({
            "updates": [{"issue_identifier": identifier, "fields": [{"field": "title", "value": "Changed"}]}],
        });

        let output = tool.execute(&context, input).await.unwrap();
        assert_eq!(output["success"], json!(true));
        assert_eq!(output["summary"]["succeeded"], json!(1));
        assert_eq!(output["updated_issues"][0]["title"], json!("Changed"));
    }
}
