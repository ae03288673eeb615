//! Project model for the issue-tracker workspace.
//!
//! A project is the top-level scope holding issues, components, milestones,
//! and templates. Its `sequence` counter is the only persisted state this
//! core adds to the store's existing schema (see [`crate::sequence`]).

use serde::{Deserialize, Serialize};

/// A project in the tracker workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Stable id (opaque to the core).
    pub id: String,

    /// Short identifier, 1-5 uppercase letters (e.g. "ENG").
    pub identifier: String,

    /// Display name.
    pub name: String,

    /// Monotonically increasing per-project issue counter. Absent until the
    /// first allocation, per [`crate::sequence`]'s cold-start path.
    pub sequence: Option<u64>,

    /// Whether the project has been archived.
    pub archived: bool,
}

impl Project {
    /// Create a new project with no issues allocated yet.
    #[must_use]
    pub fn new(id: impl Into<String>, identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            identifier: identifier.into(),
            name: name.into(),
            sequence: None,
            archived: false,
        }
    }

    /// Whether `identifier` matches the project identifier syntax
    /// (`^[A-Z]{1,5}$`).
    #[must_use]
    pub fn is_valid_identifier(identifier: &str) -> bool {
        (1..=5).contains(&identifier.len())
            && identifier.bytes().all(|b| b.is_ascii_uppercase())
    }

    /// Format an issue identifier from this project's identifier and a
    /// given issue number: `<identifier>-<number>`.
    #[must_use]
    pub fn format_issue_identifier(&self, number: u64) -> String {
        format!("{}-{number}", self.identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_project_has_no_sequence() {
        let project = Project::new("proj_1", "ENG", "Engineering");
        assert_eq!(project.sequence, None);
        assert!(!project.archived);
    }

    #[test]
    fn identifier_syntax_accepts_one_to_five_uppercase() {
        assert!(Project::is_valid_identifier("A"));
        assert!(Project::is_valid_identifier("ENG"));
        assert!(Project::is_valid_identifier("ABCDE"));
        assert!(!Project::is_valid_identifier("ABCDEF"));
        assert!(!Project::is_valid_identifier("eng"));
        assert!(!Project::is_valid_identifier(""));
        assert!(!Project::is_valid_identifier("EN-G"));
    }

    #[test]
    fn format_issue_identifier() {
        let project = Project::new("proj_1", "ENG", "Engineering");
        assert_eq!(project.format_issue_identifier(42), "ENG-42");
    }
}
