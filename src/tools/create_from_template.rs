use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::expand::ExpandOverrides;
use crate::model::Issue;
use crate::validate::normalize_priority;

use super::{Context, Tool};

pub struct CreateIssueFromTemplateTool;

#[async_trait]
impl Tool for CreateIssueFromTemplateTool {
    fn name(&self) -> &'static str {
        "create_issue_from_template"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["template_id"],
            "properties": {
                "template_id": {"type": "string"},
                "overrides": {"type": "object"},
            }
        })
    }

    fn validate(&self, input: &Value) -> Result<()> {
        if input.get("template_id").and_then(Value::as_str).filter(|s| !s.is_empty()).is_none() {
            return Err(Error::validation("template_id is required"));
        }
        Ok(())
    }

    async fn execute(&self, context: &Context, input: Value) -> Result<Value> {
        let template_id = input["template_id"].as_str().unwrap_or_default();

        let mut overrides = ExpandOverrides::default();
        if let Some(raw) = input.get("overrides") {
            overrides.title = raw.get("title").and_then(Value::as_str).map(str::to_string);
            if let Some(priority) = raw.get("priority").and_then(Value::as_str) {
                overrides.priority = Some(normalize_priority(priority)?);
            }
        }

        let expanded = context.expander.expand(template_id, overrides).await?;

        Ok(json!({
            "success": true,
            "parent_issue": issue_to_json(&expanded.parent),
            "child_issues": expanded.children.iter().map(issue_to_json).collect::<Vec<_>>(),
        }))
    }
}

fn issue_to_json(issue: &Issue) -> Value {
    serde_json::to_value(issue).unwrap_or(Value::Null)
}
