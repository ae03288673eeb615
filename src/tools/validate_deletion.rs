use async_trait::async_trait;
use serde_json::{json, Value};

use crate::deletion::ImpactPlan;
use crate::error::{Error, Result};
use crate::store::EntityKind;

use super::{resolve_issue_id, resolve_project_id, Context, Tool};

pub struct ValidateDeletionTool;

#[async_trait]
impl Tool for ValidateDeletionTool {
    fn name(&self) -> &'static str {
        "validate_deletion"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["entity_type", "entity_identifier"],
            "properties": {
                "entity_type": {"type": "string", "enum": ["issue", "project", "component", "milestone"]},
                "entity_identifier": {"type": "string"},
            }
        })
    }

    fn validate(&self, input: &Value) -> Result<()> {
        let entity_type = input.get("entity_type").and_then(Value::as_str).ok_or_else(|| Error::validation("entity_type is required"))?;
        if !["issue", "project", "component", "milestone"].contains(&entity_type) {
            return Err(Error::invalid_value("entity_type", entity_type, "unrecognized entity type", Some("use one of: issue, project, component, milestone".to_string())));
        }
        if input.get("entity_identifier").and_then(Value::as_str).filter(|s| !s.is_empty()).is_none() {
            return Err(Error::validation("entity_identifier is required"));
        }
        Ok(())
    }

    async fn execute(&self, context: &Context, input: Value) -> Result<Value> {
        let entity_type = input["entity_type"].as_str().unwrap_or_default();
        let entity_identifier = input["entity_identifier"].as_str().unwrap_or_default();

        let plan = match entity_type {
            "issue" => {
                let issue_id = resolve_issue_id(&*context.store, entity_identifier).await?;
                context.deletion.plan_issue(&issue_id).await?
            }
            "project" => {
                let project_id = resolve_project_id(&*context.store, entity_identifier).await?;
                context.deletion.plan_project(&project_id).await?
            }
            "component" => context.deletion.plan_label(EntityKind::Component, "", entity_identifier).await?,
            "milestone" => context.deletion.plan_label(EntityKind::Milestone, "", entity_identifier).await?,
            other => return Err(Error::invalid_field("validate_deletion", other)),
        };

        Ok(plan_to_json(entity_type, entity_identifier, &plan))
    }
}

fn plan_to_json(entity_type: &str, entity_identifier: &str, plan: &ImpactPlan) -> Value {
    let counts: serde_json::Map<String, Value> =
        plan.counts.iter().map(|(kind, count)| (format!("{kind:?}").to_lowercase(), json!(count))).collect();

    json!({
        "entity_type": entity_type,
        "entity_identifier": entity_identifier,
        "blocked": plan.is_blocked(),
        "blockers": plan.blockers,
        "affected_counts": counts,
        "total_affected": plan.total_affected(),
    })
}
