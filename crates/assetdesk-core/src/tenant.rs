//! Tenant scope threaded through every data access.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The tenant an operation is confined to.
///
/// Resolved once by the request layer after authentication and passed by
/// value into every repository call. Repositories AND it into every
/// predicate; a primary-key lookup without it is a defect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantScope(Uuid);

impl TenantScope {
    pub fn new(tenant_id: Uuid) -> Self {
        Self(tenant_id)
    }

    pub fn tenant_id(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for TenantScope {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

