//! Tenant domain model.
//!
//! A tenant is one customer organization and the unit of data isolation.
//! Every other entity belongs to exactly one tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Organization-wide preferences editable from the settings page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TenantSettings {
    /// IANA timezone name (e.g. `Europe/Berlin`).
    pub timezone: String,
    /// ISO 4217 currency code used for cost fields.
    pub currency: String,
    pub date_format: String,
    /// How long audit entries are kept before archival.
    pub retention_days: u32,
    /// Whether the dashboard suggests replacements automatically.
    pub auto_recommendations: bool,
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            timezone: "UTC".into(),
            currency: "USD".into(),
            date_format: "YYYY-MM-DD".into(),
            retention_days: 365,
            auto_recommendations: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    /// Display name as entered at signup.
    pub name: String,
    pub settings: TenantSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a new tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub name: String,
    pub settings: Option<TenantSettings>,
}

/// Fields that can be updated on an existing tenant.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateTenant {
    pub name: Option<String>,
    pub settings: Option<TenantSettings>,
}

/// Uniqueness key for tenant names: trimmed and lowercased.
pub fn tenant_name_key(name: &str) -> String {
    name.trim().to_lowercase()
}
