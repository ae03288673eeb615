//! Value normalization for agent-facing fields: priority and status.
//!
//! Provides O(1) validation sets and synonym maps so callers can use
//! natural-language variants. Two-tier resolution: exact match → synonym
//! lookup → error with accepted-forms suggestion. Both normalizers are
//! idempotent: `normalize(normalize(x)) == normalize(x)`.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::error::Error;
use crate::model::issue::Priority;

// ── Priority ──────────────────────────────────────────────────

pub static PRIORITY_SYNONYMS: LazyLock<HashMap<&str, Priority>> = LazyLock::new(|| {
    [
        ("nopriority", Priority::None),
        ("no-priority", Priority::None),
        ("none", Priority::None),
        ("low", Priority::Low),
        ("minor", Priority::Low),
        ("medium", Priority::Medium),
        ("normal", Priority::Medium),
        ("default", Priority::Medium),
        ("high", Priority::High),
        ("important", Priority::High),
        ("urgent", Priority::Urgent),
        ("critical", Priority::Urgent),
        ("blocker", Priority::Urgent),
    ]
    .into_iter()
    .collect()
});

/// Normalize a priority string, case-insensitively, accepting hyphen
/// variants and common synonyms.
///
/// # Errors
///
/// Returns `InvalidValue` listing the accepted forms if `input` matches
/// neither a canonical name nor a known synonym.
pub fn normalize_priority(input: &str) -> Result<Priority, Error> {
    let lower = input.trim().to_lowercase();

    if let Some(&priority) = PRIORITY_SYNONYMS.get(lower.as_str()) {
        return Ok(priority);
    }

    Err(Error::invalid_value(
        "priority",
        input,
        "unrecognized priority",
        Some("use one of: none, low, medium, high, urgent".to_string()),
    ))
}

// ── Status ────────────────────────────────────────────────────

pub static VALID_STATUSES: LazyLock<HashSet<&str>> = LazyLock::new(|| {
    ["backlog", "todo", "in_progress", "in_review", "done", "cancelled"]
        .into_iter()
        .collect()
});

pub static STATUS_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("new", "backlog"),
        ("open", "todo"),
        ("to-do", "todo"),
        ("wip", "in_progress"),
        ("in-progress", "in_progress"),
        ("doing", "in_progress"),
        ("active", "in_progress"),
        ("review", "in_review"),
        ("in-review", "in_review"),
        ("complete", "done"),
        ("completed", "done"),
        ("closed", "done"),
        ("resolved", "done"),
        ("canceled", "cancelled"),
        ("wontfix", "cancelled"),
        ("won't-fix", "cancelled"),
    ]
    .into_iter()
    .collect()
});

/// Normalize a status string, case-insensitively, accepting hyphen/space
/// variants and common synonyms.
///
/// # Errors
///
/// Returns `InvalidValue` listing the accepted forms if `input` matches
/// neither a canonical status nor a known synonym.
pub fn normalize_status(input: &str) -> Result<String, Error> {
    let raw = input.trim().to_lowercase();
    let underscored = raw.replace([' ', '-'], "_");

    if VALID_STATUSES.contains(underscored.as_str()) {
        return Ok(underscored);
    }

    if let Some(&canonical) = STATUS_SYNONYMS
        .get(raw.as_str())
        .or_else(|| STATUS_SYNONYMS.get(underscored.as_str()))
    {
        return Ok(canonical.to_string());
    }

    Err(Error::invalid_value(
        "status",
        input,
        "unrecognized status",
        Some("use one of: backlog, todo, in_progress, in_review, done, cancelled".to_string()),
    ))
}
