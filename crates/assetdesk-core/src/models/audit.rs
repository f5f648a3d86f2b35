//! Audit log domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::Role;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActorType {
    /// A signed-in human user.
    User,
    /// Background jobs and maintenance commands.
    System,
    /// Authentication events that may not resolve to a user.
    AuthAttempt,
}

impl ActorType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActorType::User => "User",
            ActorType::System => "System",
            ActorType::AuthAttempt => "AuthAttempt",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "User" => Some(ActorType::User),
            "System" => Some(ActorType::System),
            "AuthAttempt" => Some(ActorType::AuthAttempt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

impl AuditOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditOutcome::Success => "Success",
            AuditOutcome::Failure => "Failure",
            AuditOutcome::Denied => "Denied",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Success" => Some(AuditOutcome::Success),
            "Failure" => Some(AuditOutcome::Failure),
            "Denied" => Some(AuditOutcome::Denied),
            _ => None,
        }
    }
}

/// Who acted, frozen at the time of the action.
///
/// This is a copy, not a reference: later changes to the user's email or
/// role do not rewrite history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActorSnapshot {
    pub actor_type: ActorType,
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl ActorSnapshot {
    pub fn user(user_id: Uuid, email: impl Into<String>, role: Role) -> Self {
        Self {
            actor_type: ActorType::User,
            user_id: Some(user_id),
            email: Some(email.into()),
            role: Some(role),
        }
    }

    pub fn system() -> Self {
        Self {
            actor_type: ActorType::System,
            user_id: None,
            email: Some("system".into()),
            role: None,
        }
    }

    /// An authentication attempt, identified only by the email typed in.
    pub fn auth_attempt(email: Option<String>) -> Self {
        Self {
            actor_type: ActorType::AuthAttempt,
            user_id: None,
            email,
            role: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    /// `None` only for authentication attempts that never resolved a tenant.
    pub tenant_id: Option<Uuid>,
    pub actor: ActorSnapshot,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub outcome: AuditOutcome,
    pub before_state: Option<serde_json::Value>,
    pub after_state: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Fields required to append an audit entry. Snapshots must already be
/// redacted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditLogEntry {
    pub tenant_id: Option<Uuid>,
    pub actor: ActorSnapshot,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub outcome: AuditOutcome,
    pub before_state: Option<serde_json::Value>,
    pub after_state: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}
