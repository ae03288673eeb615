//! External tool surface (§6): a thin, name-dispatched façade over C2-C6,
//! matching the design note "define a trait/interface `tool` with `name`,
//! `input_schema`, `validate`, `execute(context)`; dispatch by name
//! through a registry populated at startup."
//!
//! Wire framing, auth, and transport are out of scope — this registry is
//! the seam a real RPC layer would call into.

mod bulk_create;
mod bulk_delete;
mod bulk_update;
mod create_from_template;
mod validate_deletion;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::bulk::BulkEngine;
use crate::deletion::DeletionPlanner;
use crate::error::{Error, Result};
use crate::expand::TemplateExpander;
use crate::issues::IssueOps;
use crate::sequence::SequenceAllocator;
use crate::store::{EntityKind, Selector, StoreAdapter};

/// Shared services a tool needs to do its work, threaded from the process
/// entry point rather than held as global state.
pub struct Context {
    pub store: Arc<dyn StoreAdapter>,
    pub sequence: Arc<SequenceAllocator>,
    pub engine: Arc<BulkEngine>,
    pub issues: Arc<IssueOps>,
    pub deletion: Arc<DeletionPlanner>,
    pub expander: Arc<TemplateExpander>,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn input_schema(&self) -> Value;
    fn validate(&self, input: &Value) -> Result<()>;
    async fn execute(&self, context: &Context, input: Value) -> Result<Value>;
}

/// Name-dispatched registry of tools, populated once at startup.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name(), tool);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// The five tools named in §6, registered under their canonical names.
    #[must_use]
    pub fn with_default_tools() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(bulk_create::BulkCreateIssuesTool));
        registry.register(Arc::new(bulk_update::BulkUpdateIssuesTool));
        registry.register(Arc::new(bulk_delete::BulkDeleteIssuesTool));
        registry.register(Arc::new(create_from_template::CreateIssueFromTemplateTool));
        registry.register(Arc::new(validate_deletion::ValidateDeletionTool));
        registry
    }

    pub async fn dispatch(&self, context: &Context, name: &str, input: Value) -> Result<Value> {
        let tool = self.get(name).ok_or_else(|| Error::invalid_field("tool registry", name))?;
        tool.validate(&input)?;
        tool.execute(context, input).await
    }
}

/// Split `"ENG-42"` into (`"ENG"`, `42`). Shared by every tool that takes
/// an `issue_identifier`.
pub(crate) fn parse_issue_identifier(identifier: &str) -> Result<(String, u64)> {
    let (project_identifier, number_part) = identifier
        .rsplit_once('-')
        .ok_or_else(|| Error::invalid_value("issue_identifier", identifier, "expected <PROJECT>-<number>", None))?;
    let number: u64 = number_part
        .parse()
        .map_err(|_| Error::invalid_value("issue_identifier", identifier, "number segment is not a positive integer", None))?;
    if number == 0 || !crate::model::Project::is_valid_identifier(project_identifier) {
        return Err(Error::invalid_value("issue_identifier", identifier, "expected <PROJECT>-<number>", None));
    }
    Ok((project_identifier.to_string(), number))
}

pub(crate) async fn resolve_issue_id(store: &dyn StoreAdapter, identifier: &str) -> Result<String> {
    let (project_identifier, number) = parse_issue_identifier(identifier)?;
    store
        .find_one(EntityKind::Issue, Selector::ByIdentifier { project_identifier, number })
        .await?
        .map(|entity| entity.id().to_string())
        .ok_or_else(|| Error::not_found(format!("issue {identifier}")))
}

pub(crate) async fn resolve_project_id(store: &dyn StoreAdapter, project_identifier: &str) -> Result<String> {
    store
        .find_one(EntityKind::Project, Selector::ByIdentifier { project_identifier: project_identifier.to_string(), number: 0 })
        .await?
        .map(|entity| entity.id().to_string())
        .ok_or_else(|| Error::ProjectNotFound(project_identifier.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_issue_identifier_accepts_canonical_form() {
        assert_eq!(parse_issue_identifier("ENG-42").unwrap(), ("ENG".to_string(), 42));
    }

    #[test]
    fn parse_issue_identifier_rejects_malformed_input() {
        assert!(parse_issue_identifier("ENG").is_err());
        assert!(parse_issue_identifier("eng-1").is_err());
        assert!(parse_issue_identifier("ENG-0").is_err());
        assert!(parse_issue_identifier("ENG-abc").is_err());
    }
}
