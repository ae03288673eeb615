use async_trait::async_trait;
use serde_json::{json, Value};

use crate::bulk::BulkOptions;
use crate::error::{Error, Result};
use crate::issues::{NewIssue, MAX_BATCH_SIZE_CREATE};
use crate::model::Priority;
use crate::validate::normalize_priority;

use super::{resolve_project_id, Context, Tool};

/// Bulk create limit from §6: `bulk create ≤100 items`.
const MAX_ITEMS: usize = 100;

pub struct BulkCreateIssuesTool;

#[async_trait]
impl Tool for BulkCreateIssuesTool {
    fn name(&self) -> &'static str {
        "bulk_create_issues"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["project_identifier", "issues"],
            "properties": {
                "project_identifier": {"type": "string"},
                "issues": {"type": "array", "items": {"type": "object"}},
                "defaults": {"type": "object"},
                "options": {"type": "object"},
            }
        })
    }

    fn validate(&self, input: &Value) -> Result<()> {
        if input.get("project_identifier").and_then(Value::as_str).is_none() {
            return Err(Error::validation("project_identifier is required"));
        }
        let issues = input
            .get("issues")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::validation("issues must be a non-empty array"))?;
        if issues.is_empty() {
            return Err(Error::NoItems);
        }
        if issues.len() > MAX_ITEMS {
            return Err(Error::validation(format!("bulk create accepts at most {MAX_ITEMS} items")));
        }
        Ok(())
    }

    async fn execute(&self, context: &Context, input: Value) -> Result<Value> {
        let project_identifier = input["project_identifier"].as_str().unwrap_or_default();
        let project_id = resolve_project_id(&*context.store, project_identifier).await?;

        let defaults = input.get("defaults").cloned().unwrap_or(Value::Null);
        let items = input["issues"].as_array().cloned().unwrap_or_default();
        let dry_run = input.get("options").and_then(|o| o.get("dry_run")).and_then(Value::as_bool).unwrap_or(false);

        let mut specs = Vec::with_capacity(items.len());
        let mut validation_errors = Vec::new();
        for (index, item) in items.iter().enumerate() {
            match parse_new_issue(item, &defaults) {
                Ok(spec) => specs.push(spec),
                Err(err) => validation_errors.push(json!({"index": index, "error": err.to_structured_json()})),
            }
        }

        if dry_run {
            return Ok(json!({
                "success": true,
                "dry_run": true,
                "valid_count": specs.len(),
                "invalid_count": validation_errors.len(),
                "validation_errors": validation_errors,
            }));
        }

        if specs.is_empty() {
            return Ok(json!({
                "success": false,
                "summary": {"total": items.len(), "succeeded": 0, "failed": validation_errors.len(), "elapsed_ms": 0},
                "created_issues": [],
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
        options.batch_size = options.capped_batch_size(MAX_BATCH_SIZE_CREATE);

        let summary = context.issues.bulk_create(&project_id, specs, options).await?;

        let validation_error_count = validation_errors.len();
        let created_issues: Vec<Value> = summary.items.iter().filter(|i| i.succeeded).filter_map(|i| i.result.clone()).collect();
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
            "created_issues": created_issues,
            "failed_issues": failed_issues,
        }))
    }
}

fn parse_new_issue(item: &Value, defaults: &Value) -> Result<NewIssue> {
    let field = |key: &str| item.get(key).filter(|v| !v.is_null()).or_else(|| defaults.get(key));

    let title = field("title")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::validation("title must be a non-empty string"))?;

    let priority = match field("priority").and_then(Value::as_str) {
        Some(raw) => Some(normalize_priority(raw)?),
        None => None::<Priority>,
    };

    let mut spec = NewIssue::new(title);
    spec.status = field("status").and_then(Value::as_str).map(str::to_string);
    spec.priority = priority;
    spec.component_id = field("component").and_then(Value::as_str).map(str::to_string);
    spec.milestone_id = field("milestone").and_then(Value::as_str).map(str::to_string);
    spec.description = field("description").and_then(Value::as_str).map(str::to_string);
    spec.parent_issue = item.get("parent_issue").and_then(Value::as_str).map(str::to_string);
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_new_issue_merges_defaults_with_item_precedence() {
        let defaults = json!({"priority": "low", "status": "todo"});
        let item = json!({"title": "Fix it", "priority": "urgent"});
        let spec = parse_new_issue(&item, &defaults).unwrap();
        assert_eq!(spec.title, "Fix it");
        assert_eq!(spec.priority, Some(Priority::Urgent));
        assert_eq!(spec.status.as_deref(), Some("todo"));
    }

    #[test]
    fn parse_new_issue_rejects_missing_title() {
        let err = parse_new_issue(&json!({}), &Value::Null).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }
}
