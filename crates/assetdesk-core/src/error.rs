//! Error types for the AssetDesk registry.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What went wrong with a single field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A required field was absent or blank.
    Missing,
    /// The value could not be parsed (dates, numbers, UUIDs).
    InvalidFormat,
    /// The value parsed but is not allowed (unknown enum value, negative cost).
    InvalidValue,
    /// The request as a whole exceeds a configured ceiling.
    LimitExceeded,
}

/// One structured validation problem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: String,
    pub kind: IssueKind,
    pub message: String,
}

impl FieldIssue {
    pub fn missing(field: &str) -> Self {
        Self {
            field: field.into(),
            kind: IssueKind::Missing,
            message: format!("{field} is required"),
        }
    }

    pub fn invalid_format(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: IssueKind::InvalidFormat,
            message: message.into(),
        }
    }

    pub fn invalid_value(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: IssueKind::InvalidValue,
            message: message.into(),
        }
    }

    pub fn limit_exceeded(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: IssueKind::LimitExceeded,
            message: message.into(),
        }
    }
}

/// The registry-wide error taxonomy.
///
/// A row that exists under another tenant is reported exactly like a row
/// that does not exist at all: [`RegistryError::NotFound`]. There is no
/// variant that could reveal cross-tenant existence.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Unique constraint conflict on {index}")]
    UniqueConflict { index: String },

    #[error("{operation}: gave up after {attempts} attempts")]
    RetryExhausted { operation: String, attempts: u32 },

    #[error("Validation failed: {} issue(s)", issues.len())]
    Validation { issues: Vec<FieldIssue> },

    #[error("Authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RegistryError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// A single-issue validation failure.
    pub fn invalid(issue: FieldIssue) -> Self {
        Self::Validation {
            issues: vec![issue],
        }
    }

    /// Whether the caller should back off and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DependencyUnavailable(_))
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
