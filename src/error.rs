//! Error types for the bulk issue-tracker core.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Retryability flags, so a caller knows whether retrying with the same
//!   input could ever succeed
//! - Context-aware recovery hints
//! - Structured JSON rendering for the external tool surface

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes, grouped by category.
///
/// Matches the taxonomy in the bulk-operation design: callers branch on the
/// code string rather than on `Display` text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotFound,
    Conflict,
    PermissionDenied,
    Validation,
    InvalidField,
    InvalidValue,
    ConnectionLost,
    Timeout,
    DeletionBlocked,
    AlreadyArchived,
    BulkPartialFailure,
    TransactionFailed,
    Unknown,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Validation => "VALIDATION",
            Self::InvalidField => "INVALID_FIELD",
            Self::InvalidValue => "INVALID_VALUE",
            Self::ConnectionLost => "CONNECTION_LOST",
            Self::Timeout => "TIMEOUT",
            Self::DeletionBlocked => "DELETION_BLOCKED",
            Self::AlreadyArchived => "ALREADY_ARCHIVED",
            Self::BulkPartialFailure => "BULK_PARTIAL_FAILURE",
            Self::TransactionFailed => "TRANSACTION_FAILED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether a caller should retry the same input unchanged.
    ///
    /// True only for connection-class failures, which the adapter already
    /// retries internally — a caller seeing one of these after internal
    /// retries were exhausted can reasonably try again later. False for
    /// validation and not-found errors, which will not change outcome on
    /// retry without different input.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionLost | Self::Timeout)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur anywhere in the bulk-operation core.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("not found: {context}")]
    NotFound { context: String },

    #[error("conflict: {context}")]
    Conflict { context: String },

    #[error("permission denied: {context}")]
    PermissionDenied { context: String },

    #[error("validation failed: {message}")]
    Validation {
        message: String,
        suggestion: Option<String>,
    },

    #[error("unknown field '{field}' on {entity}")]
    InvalidField { entity: String, field: String },

    #[error("invalid value '{value}' for field '{field}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
        suggestion: Option<String>,
    },

    #[error("connection lost: {message}")]
    ConnectionLost { message: String },

    #[error("operation timed out after {elapsed_ms}ms: {context}")]
    Timeout { context: String, elapsed_ms: u64 },

    #[error("deletion blocked: {} blocker(s)", blockers.len())]
    DeletionBlocked { blockers: Vec<String> },

    #[error("already archived: {context}")]
    AlreadyArchived { context: String },

    #[error("bulk operation failed after {completed} item(s): {cause}")]
    BulkPartialFailure { completed: usize, cause: String },

    #[error("no items supplied")]
    NoItems,

    #[error("operation failed: {0}")]
    OperationFailed(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("allocation failed for project {0}")]
    AllocationFailed(String),

    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Unknown(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } | Self::ProjectNotFound(_) => ErrorCode::NotFound,
            Self::Conflict { .. } => ErrorCode::Conflict,
            Self::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            Self::Validation { .. } | Self::NoItems => ErrorCode::Validation,
            Self::InvalidField { .. } => ErrorCode::InvalidField,
            Self::InvalidValue { .. } => ErrorCode::InvalidValue,
            Self::ConnectionLost { .. } => ErrorCode::ConnectionLost,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::DeletionBlocked { .. } => ErrorCode::DeletionBlocked,
            Self::AlreadyArchived { .. } => ErrorCode::AlreadyArchived,
            Self::BulkPartialFailure { .. } => ErrorCode::BulkPartialFailure,
            Self::TransactionFailed(_) => ErrorCode::TransactionFailed,
            Self::Cancelled
            | Self::OperationFailed(_)
            | Self::AllocationFailed(_)
            | Self::Config(_)
            | Self::Unknown(_) => ErrorCode::Unknown,
        }
    }

    /// Context-aware recovery hint for callers.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Validation { suggestion, .. } | Self::InvalidValue { suggestion, .. } => {
                suggestion.clone()
            }
            Self::InvalidField { entity, field } => {
                Some(format!("'{field}' is not a recognized field on {entity}"))
            }
            Self::DeletionBlocked { blockers } => {
                Some(format!("resolve or pass force=true: {}", blockers.join(", ")))
            }
            Self::ConnectionLost { .. } | Self::Timeout { .. } => {
                Some("the store adapter already retried internally; try again later".to_string())
            }
            _ => None,
        }
    }

    /// Structured JSON representation for the external tool surface.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["suggestion"] = serde_json::Value::String(hint);
        }

        obj
    }

    /// Factory: validation error with a suggestion.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            suggestion: None,
        }
    }

    /// Factory: not-found error with a context string.
    #[must_use]
    pub fn not_found(context: impl Into<String>) -> Self {
        Self::NotFound {
            context: context.into(),
        }
    }

    /// Factory: invalid-field error.
    #[must_use]
    pub fn invalid_field(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidField {
            entity: entity.into(),
            field: field.into(),
        }
    }

    /// Factory: invalid-value error with accepted-forms suggestion.
    #[must_use]
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
        suggestion: Option<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            suggestion,
        }
    }

    /// Factory: connection-class error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionLost {
            message: message.into(),
        }
    }

    /// Factory: permission error.
    #[must_use]
    pub fn permission(context: impl Into<String>) -> Self {
        Self::PermissionDenied {
            context: context.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_maps_retryability() {
        assert!(ErrorCode::ConnectionLost.is_retryable());
        assert!(ErrorCode::Timeout.is_retryable());
        assert!(!ErrorCode::Validation.is_retryable());
        assert!(!ErrorCode::NotFound.is_retryable());
    }

    #[test]
    fn structured_json_has_code_and_message() {
        let err = Error::invalid_value(
            "priority",
            "urgentish",
            "unrecognized priority",
            Some("use none, low, medium, high, or urgent".to_string()),
        );
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "INVALID_VALUE");
        assert!(json["error"]["suggestion"].is_string());
    }

    #[test]
    fn deletion_blocked_hint_lists_blockers() {
        let err = Error::DeletionBlocked {
            blockers: vec!["3 referencing issues".to_string()],
        };
        assert!(err.hint().unwrap().contains("3 referencing issues"));
    }
}
