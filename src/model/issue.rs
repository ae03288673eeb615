//! Issue model, priority enum, and the tagged `UpdateField` variant.
//!
//! String-keyed field updates (`field: "status"`) from the external tool
//! surface are parsed at the edge into [`UpdateField`]; core code never
//! branches on the field name string again.

use serde::{Deserialize, Serialize};

/// Issue priority, ordered low to high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    None,
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Canonical lowercase string for storage and display.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tagged field update, parsed from the external tool surface's
/// `{field: "status", value: "..."}` shape.
///
/// `Component` and `Milestone` carry `None` to clear the reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateField {
    Title(String),
    Description(String),
    Status(String),
    Priority(Priority),
    Component(Option<String>),
    Milestone(Option<String>),
}

/// An issue (or sub-issue) within a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Stable id (opaque to the core).
    pub id: String,

    /// Owning project id.
    pub project_id: String,

    /// Project-unique integer number, assigned by the sequence allocator.
    pub number: u64,

    /// Derived `<project.identifier>-<number>`, stable for the issue's
    /// lifetime.
    pub identifier: String,

    pub title: String,

    /// Status category (store-defined; normalized via [`crate::validate`]
    /// before being written here).
    pub status: String,

    pub priority: Priority,

    pub component_id: Option<String>,
    pub milestone_id: Option<String>,

    /// Parent issue id, forming a tree scoped to the project.
    pub parent_id: Option<String>,

    /// Out-of-line reference to the description markup. `None` means no
    /// description was ever uploaded — distinct from an empty description.
    pub description_ref: Option<String>,
}

impl Issue {
    /// Whether this issue is a sub-issue (has a parent).
    #[must_use]
    pub fn is_sub_issue(&self) -> bool {
        self.parent_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_default_is_medium() {
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn priority_ordering() {
        assert!(Priority::None < Priority::Low);
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Urgent);
    }

    #[test]
    fn priority_round_trips_through_str() {
        for p in [
            Priority::None,
            Priority::Low,
            Priority::Medium,
            Priority::High,
            Priority::Urgent,
        ] {
            assert_eq!(p.to_string(), p.as_str());
        }
    }
}
