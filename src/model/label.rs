//! Project-scoped labels referenced weakly by issues.

use serde::{Deserialize, Serialize};

/// A component label, owned by a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub project_id: String,
    pub name: String,
}

/// A milestone label, owned by a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub project_id: String,
    pub name: String,
}
