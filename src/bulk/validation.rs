//! Input-side validation for a prospective bulk operation, distinct from
//! `BulkEngine::execute`'s per-item accounting: this runs before any item
//! is submitted to an operation, checking for problems that apply to the
//! whole list (empties, duplicate keys) in addition to per-item rules a
//! caller supplies.

use serde::Serialize;

use crate::error::Result;

/// One rejected item from a `validate` pass.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub index: Option<usize>,
    pub message: String,
}

/// Result of auditing a list of items before running them through
/// `execute`. `valid_count + issues.len()` does not necessarily equal
/// `total`: a whole-list issue (an empty list) carries no index and
/// short-circuits before any item is individually counted.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub total: usize,
    pub valid_count: usize,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self { total, valid_count: 0, issues: Vec::new() }
    }

    pub fn add_error(&mut self, index: Option<usize>, message: String) {
        self.issues.push(ValidationIssue { index, message });
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    #[must_use]
    pub fn invalid_count(&self) -> usize {
        self.issues.len()
    }
}

type KeyFn<T> = Box<dyn Fn(&T) -> String + Send + Sync>;
type ItemValidator<T> = Box<dyn Fn(&T) -> Result<()> + Send + Sync>;

/// Configuration for `BulkEngine::validate`. Both checks are optional: a
/// caller that only cares about duplicates skips `validate_item`, and vice
/// versa.
#[derive(Default)]
pub struct ValidationOptions<T> {
    pub key_of: Option<KeyFn<T>>,
    pub validate_item: Option<ItemValidator<T>>,
}

impl<T> ValidationOptions<T> {
    #[must_use]
    pub fn new() -> Self {
        Self { key_of: None, validate_item: None }
    }

    #[must_use]
    pub fn with_key_of(mut self, key_of: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        self.key_of = Some(Box::new(key_of));
        self
    }

    #[must_use]
    pub fn with_validate_item(mut self, validate_item: impl Fn(&T) -> Result<()> + Send + Sync + 'static) -> Self {
        self.validate_item = Some(Box::new(validate_item));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::BulkEngine;
    use crate::error::Error;

    #[test]
    fn empty_list_is_a_single_whole_list_error() {
        let engine = BulkEngine::new();
        let items: Vec<u32> = Vec::new();
        let report = engine.validate(&items, &ValidationOptions::new());
        assert!(!report.is_valid());
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].index, None);
    }

    #[test]
    fn duplicate_keys_are_flagged_by_index() {
        let engine = BulkEngine::new();
        let items = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        let options = ValidationOptions::new().with_key_of(|s: &String| s.clone());
        let report = engine.validate(&items, &options);

        assert_eq!(report.valid_count, 2);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].index, Some(2));
    }

    #[test]
    fn per_item_validator_rejects_individually() {
        let engine = BulkEngine::new();
        let items = vec![1u32, 0, 3];
        let options = ValidationOptions::new().with_validate_item(|item: &u32| {
            if *item == 0 {
                Err(Error::validation("item cannot be zero"))
            } else {
                Ok(())
            }
        });
        let report = engine.validate(&items, &options);

        assert_eq!(report.valid_count, 2);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].index, Some(1));
    }

    #[test]
    fn combined_key_and_item_checks_short_circuit_on_duplicate() {
        let engine = BulkEngine::new();
        let items = vec![2u32, 2u32];
        let options = ValidationOptions::new()
            .with_key_of(|item: &u32| item.to_string())
            .with_validate_item(|_: &u32| Err(Error::validation("should never run for the duplicate")));
        let report = engine.validate(&items, &options);

        assert_eq!(report.valid_count, 1);
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].message.contains("duplicate"));
    }
}
