//! Per-user UI preferences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreferences {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    /// Free-form object (theme, table density, notification toggles).
    pub preferences: serde_json::Value,
    /// `None` until the user first saves.
    pub updated_at: Option<DateTime<Utc>>,
}
