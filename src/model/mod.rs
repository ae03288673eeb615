//! Data models for the issue-tracker workspace.
//!
//! This module contains all domain models:
//! - [`project`] — workspace scope, sequence counter
//! - [`issue`] — work items, priority, update fields
//! - [`label`] — components and milestones
//! - [`template`] — reusable issue skeletons

pub mod issue;
pub mod label;
pub mod project;
pub mod template;

pub use issue::{Issue, Priority, UpdateField};
pub use label::{Component, Milestone};
pub use project::Project;
pub use template::{Template, TemplateChild};
