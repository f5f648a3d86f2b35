//! First-admin lock outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::User;

/// The per-tenant claim row. At most one exists per tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminLock {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub admin_user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Result of trying to bootstrap a tenant's first administrator.
#[derive(Debug, Clone)]
pub enum FirstAdminOutcome {
    /// This caller won the race; the returned user is the super-admin.
    Created(User),
    /// Someone else already holds the lock. The caller should be told to
    /// contact their administrator.
    AlreadyExists,
}

impl FirstAdminOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FirstAdminOutcome::Created(_))
    }

    pub fn already_exists(&self) -> bool {
        matches!(self, FirstAdminOutcome::AlreadyExists)
    }

    pub fn into_user(self) -> Option<User> {
        match self {
            FirstAdminOutcome::Created(user) => Some(user),
            FirstAdminOutcome::AlreadyExists => None,
        }
    }
}

/// Summary of a lock backfill run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackfillReport {
    /// Tenants examined (those with an administrator).
    pub examined: u64,
    /// Locks written by this run.
    pub created: u64,
    /// Tenants that were already locked; not an error.
    pub already_locked: u64,
    /// Tenants whose lock could not be written for another reason.
    pub failed: u64,
}
