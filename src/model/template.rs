//! Template model: a project-scoped issue skeleton with ordered children.
//!
//! Instantiation (see [`crate::expand`]) produces one parent issue plus one
//! sub-issue per child, each drawing a distinct number from the sequence
//! allocator.

use serde::{Deserialize, Serialize};

use crate::model::issue::Priority;

/// A child descriptor within a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateChild {
    pub title: String,
    pub priority: Priority,
    pub description: Option<String>,
}

/// A reusable issue skeleton, scoped to a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub priority: Priority,
    pub description: Option<String>,
    pub children: Vec<TemplateChild>,
}
