use async_trait::async_trait;
use serde_json::{json, Value};

use crate::bulk::BulkOptions;
use crate::error::{Error, Result};
use crate::issues::MAX_BATCH_SIZE_CREATE as MAX_BATCH_SIZE_DELETE;

use super::{resolve_issue_id, Context, Tool};

const MAX_ITEMS: usize = 1000;

pub struct BulkDeleteIssuesTool;

#[async_trait]
impl Tool for BulkDeleteIssuesTool {
    fn name(&self) -> &'static str {
        "bulk_delete_issues"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["issue_identifiers"],
            "properties": {
                "issue_identifiers": {"type": "array", "items": {"type": "string"}},
                "options": {"type": "object"},
            }
        })
    }

    fn validate(&self, input: &Value) -> Result<()> {
        let identifiers = input
            .get("issue_identifiers")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::validation("issue_identifiers must be a non-empty array"))?;
        if identifiers.is_empty() {
            return Err(Error::NoItems);
        }
        if identifiers.len() > MAX_ITEMS {
            return Err(Error::validation(format!("bulk delete accepts at most {MAX_ITEMS} items")));
        }
        Ok(())
    }

    async fn execute(&self, context: &Context, input: Value) -> Result<Value> {
        let identifiers: Vec<String> =
            input["issue_identifiers"].as_array().cloned().unwrap_or_default().iter().filter_map(Value::as_str).map(str::to_string).collect();

        let options_in = input.get("options").cloned().unwrap_or(Value::Null);
        let cascade = options_in.get("cascade").and_then(Value::as_bool).unwrap_or(false);
        let dry_run = options_in.get("dry_run").and_then(Value::as_bool).unwrap_or(false);

        let mut ids = Vec::with_capacity(identifiers.len());
        let mut validation_errors = Vec::new();
        for (index, identifier) in identifiers.iter().enumerate() {
            match resolve_issue_id(&*context.store, identifier).await {
                Ok(id) => ids.push(id),
                Err(err) => validation_errors.push(json!({"index": index, "error": err.to_structured_json()})),
            }
        }

        if dry_run {
            let mut total_affected = 0usize;
            let mut previews = Vec::with_capacity(ids.len());
            for id in &ids {
                let plan = context.deletion.plan_issue(id).await?;
                total_affected += plan.total_affected();
                previews.push(json!({"issue_id": id, "affected_count": plan.total_affected()}));
            }
            return Ok(json!({
                "success": true,
                "dry_run": true,
                "unique_count": ids.len(),
                "total_affected": total_affected,
                "previews": previews,
                "validation_errors": validation_errors,
            }));
        }

        if ids.is_empty() {
            return Ok(json!({
                "success": false,
                "summary": {"total": identifiers.len(), "succeeded": 0, "failed": validation_errors.len(), "skipped": 0, "deleted_count": 0, "elapsed_ms": 0},
                "failed_issues": validation_errors,
            }));
        }

        let mut options = BulkOptions::new();
        if let Some(batch_size) = options_in.get("batch_size").and_then(Value::as_u64) {
            options = options.with_batch_size(batch_size as usize);
        }
        if let Some(continue_on_error) = options_in.get("continue_on_error").and_then(Value::as_bool) {
            options = options.with_continue_on_error(continue_on_error);
        }
        options.batch_size = options.capped_batch_size(MAX_BATCH_SIZE_DELETE);

        let summary = context.deletion.bulk_delete_issues(ids, cascade, options).await?;

        let deleted_count: u64 = summary.items.iter().filter(|i| i.succeeded).filter_map(|i| i.result.as_ref()?.as_u64()).sum();
        let validation_error_count = validation_errors.len();
        let failed_issues: Vec<Value> = summary
            .items
            .iter()
            .filter(|i| !i.succeeded)
            .map(|i| json!({"index": i.index, "error": i.error}))
            .chain(validation_errors)
            .collect();

        Ok(json!({
            "success": summary.failed == 0 && validation_error_count == 0,
            "summary": {
                "total": summary.total + validation_error_count,
                "succeeded": summary.succeeded,
                "failed": summary.failed + validation_error_count,
                "skipped": summary.skipped,
                "deleted_count": deleted_count,
                "elapsed_ms": summary.elapsed.as_millis() as u64,
            },
            "failed_issues": failed_issues,
        }))
    }
}
