//! Service-layer configuration.

use chrono::Duration;

/// Configuration for bulk import, dashboards and account flows.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Rows accepted in one import batch (default: 5000).
    pub max_import_rows: usize,
    /// Size of the uploaded file in bytes (default: 5 MiB).
    pub max_import_bytes: u64,
    /// How long an invitation token stays valid (default: 7 days).
    pub invitation_lifetime: Duration,
    /// Warranty, AMC and renewal look-ahead in days (default: 30).
    pub expiry_window_days: i64,
    /// Optional pepper prepended to passwords before Argon2id hashing.
    pub pepper: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_import_rows: 5000,
            max_import_bytes: 5 * 1024 * 1024,
            invitation_lifetime: Duration::days(7),
            expiry_window_days: 30,
            pepper: None,
        }
    }
}
