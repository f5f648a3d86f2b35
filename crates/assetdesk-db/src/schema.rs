//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 - initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Tenants (global scope)
-- =======================================================================
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD name ON TABLE tenant TYPE string;
DEFINE FIELD name_key ON TABLE tenant TYPE string;
DEFINE FIELD settings ON TABLE tenant TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tenant_name_key ON TABLE tenant \
    COLUMNS name_key UNIQUE;

-- =======================================================================
-- Users (tenant scope)
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD first_name ON TABLE user TYPE string;
DEFINE FIELD last_name ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD role ON TABLE user TYPE string \
    ASSERT $value IN ['technician', 'it-manager', 'admin', 'super-admin'];
DEFINE FIELD employee_id ON TABLE user TYPE int;
DEFINE FIELD is_active ON TABLE user TYPE bool DEFAULT true;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_tenant_email ON TABLE user \
    COLUMNS tenant_id, email UNIQUE;
DEFINE INDEX idx_user_tenant_employee ON TABLE user \
    COLUMNS tenant_id, employee_id UNIQUE;

-- =======================================================================
-- First-admin lock (one row per tenant, record id = tenant id)
-- =======================================================================
DEFINE TABLE admin_lock SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE admin_lock TYPE string;
DEFINE FIELD admin_user_id ON TABLE admin_lock TYPE string;
DEFINE FIELD created_at ON TABLE admin_lock TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_admin_lock_tenant ON TABLE admin_lock \
    COLUMNS tenant_id UNIQUE;

-- =======================================================================
-- Invitations (tenant scope)
-- =======================================================================
DEFINE TABLE invitation SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE invitation TYPE string;
DEFINE FIELD email ON TABLE invitation TYPE string;
DEFINE FIELD role ON TABLE invitation TYPE string \
    ASSERT $value IN ['technician', 'it-manager', 'admin'];
DEFINE FIELD token_hash ON TABLE invitation TYPE string;
DEFINE FIELD status ON TABLE invitation TYPE string \
    ASSERT $value IN ['Pending', 'Accepted', 'Expired'];
DEFINE FIELD invited_by ON TABLE invitation TYPE option<string>;
DEFINE FIELD expires_at ON TABLE invitation TYPE datetime;
DEFINE FIELD accepted_at ON TABLE invitation TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE invitation TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_invitation_token ON TABLE invitation \
    COLUMNS token_hash UNIQUE;
DEFINE INDEX idx_invitation_tenant ON TABLE invitation \
    COLUMNS tenant_id, status;

-- =======================================================================
-- Assets (tenant scope)
-- =======================================================================
DEFINE TABLE asset SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE asset TYPE string;
DEFINE FIELD name ON TABLE asset TYPE string;
DEFINE FIELD asset_type ON TABLE asset TYPE string \
    ASSERT $value IN ['Hardware', 'Software', 'Peripherals', 'Others'];
DEFINE FIELD status ON TABLE asset TYPE string \
    ASSERT $value IN ['in-stock', 'deployed', 'in-repair', 'disposed'];
DEFINE FIELD category ON TABLE asset TYPE option<string>;
DEFINE FIELD manufacturer ON TABLE asset TYPE option<string>;
DEFINE FIELD model ON TABLE asset TYPE option<string>;
DEFINE FIELD serial_number ON TABLE asset TYPE option<string>;
DEFINE FIELD assigned_user_id ON TABLE asset TYPE option<string>;
DEFINE FIELD assigned_user_name ON TABLE asset TYPE option<string>;
DEFINE FIELD location ON TABLE asset TYPE option<string>;
DEFINE FIELD vendor ON TABLE asset TYPE option<string>;
DEFINE FIELD company ON TABLE asset TYPE option<string>;
DEFINE FIELD purchase_date ON TABLE asset TYPE option<string>;
DEFINE FIELD purchase_cost ON TABLE asset TYPE option<float>;
DEFINE FIELD warranty_expiry ON TABLE asset TYPE option<string>;
DEFINE FIELD amc_expiry ON TABLE asset TYPE option<string>;
DEFINE FIELD software_version ON TABLE asset TYPE option<string>;
DEFINE FIELD license_key ON TABLE asset TYPE option<string>;
DEFINE FIELD renewal_date ON TABLE asset TYPE option<string>;
DEFINE FIELD notes ON TABLE asset TYPE option<string>;
DEFINE FIELD created_at ON TABLE asset TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE asset TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_asset_tenant_type ON TABLE asset \
    COLUMNS tenant_id, asset_type, status;
DEFINE INDEX idx_asset_tenant_assignee ON TABLE asset \
    COLUMNS tenant_id, assigned_user_id;

-- =======================================================================
-- Software licenses (tenant scope)
-- =======================================================================
DEFINE TABLE software_license SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE software_license TYPE string;
DEFINE FIELD software_name ON TABLE software_license TYPE string;
DEFINE FIELD vendor ON TABLE software_license TYPE option<string>;
DEFINE FIELD total_licenses ON TABLE software_license TYPE int;
DEFINE FIELD used_licenses ON TABLE software_license TYPE int;
DEFINE FIELD cost_per_license ON TABLE software_license \
    TYPE option<float>;
DEFINE FIELD purchase_date ON TABLE software_license \
    TYPE option<string>;
DEFINE FIELD renewal_date ON TABLE software_license TYPE option<string>;
DEFINE FIELD notes ON TABLE software_license TYPE option<string>;
DEFINE FIELD created_at ON TABLE software_license TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE software_license TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_license_tenant ON TABLE software_license \
    COLUMNS tenant_id;

-- =======================================================================
-- Tickets (tenant scope, number unique across the store)
-- =======================================================================
DEFINE TABLE ticket SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE ticket TYPE string;
DEFINE FIELD ticket_number ON TABLE ticket TYPE string;
DEFINE FIELD title ON TABLE ticket TYPE string;
DEFINE FIELD description ON TABLE ticket TYPE string;
DEFINE FIELD priority ON TABLE ticket TYPE string \
    ASSERT $value IN ['low', 'medium', 'high', 'critical'];
DEFINE FIELD category ON TABLE ticket TYPE option<string>;
DEFINE FIELD status ON TABLE ticket TYPE string \
    ASSERT $value IN ['open', 'in-progress', 'resolved', 'closed'];
DEFINE FIELD requestor_id ON TABLE ticket TYPE string;
DEFINE FIELD requestor_name ON TABLE ticket TYPE string;
DEFINE FIELD assignee_id ON TABLE ticket TYPE option<string>;
DEFINE FIELD assignee_name ON TABLE ticket TYPE option<string>;
DEFINE FIELD asset_id ON TABLE ticket TYPE option<string>;
DEFINE FIELD resolution ON TABLE ticket TYPE option<string>;
DEFINE FIELD assigned_at ON TABLE ticket TYPE option<datetime>;
DEFINE FIELD started_at ON TABLE ticket TYPE option<datetime>;
DEFINE FIELD resolved_at ON TABLE ticket TYPE option<datetime>;
DEFINE FIELD closed_at ON TABLE ticket TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE ticket TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE ticket TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_ticket_number ON TABLE ticket \
    COLUMNS ticket_number UNIQUE;
DEFINE INDEX idx_ticket_tenant_status ON TABLE ticket \
    COLUMNS tenant_id, status;
DEFINE INDEX idx_ticket_tenant_assignee ON TABLE ticket \
    COLUMNS tenant_id, assignee_id;

-- =======================================================================
-- Ticket comments and activities (append-only children of a ticket)
-- =======================================================================
DEFINE TABLE ticket_comment SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE ticket_comment TYPE string;
DEFINE FIELD ticket_id ON TABLE ticket_comment TYPE string;
DEFINE FIELD author_id ON TABLE ticket_comment TYPE option<string>;
DEFINE FIELD author_name ON TABLE ticket_comment TYPE string;
DEFINE FIELD body ON TABLE ticket_comment TYPE string;
DEFINE FIELD is_internal ON TABLE ticket_comment TYPE bool \
    DEFAULT false;
DEFINE FIELD created_at ON TABLE ticket_comment TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_comment_ticket ON TABLE ticket_comment \
    COLUMNS tenant_id, ticket_id;

DEFINE TABLE ticket_activity SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE ticket_activity TYPE string;
DEFINE FIELD ticket_id ON TABLE ticket_activity TYPE string;
DEFINE FIELD activity_type ON TABLE ticket_activity TYPE string \
    ASSERT $value IN ['created', 'assigned', 'status_changed', \
    'commented'];
DEFINE FIELD actor_id ON TABLE ticket_activity TYPE option<string>;
DEFINE FIELD actor_name ON TABLE ticket_activity TYPE string;
DEFINE FIELD from_value ON TABLE ticket_activity TYPE option<string>;
DEFINE FIELD to_value ON TABLE ticket_activity TYPE option<string>;
DEFINE FIELD notes ON TABLE ticket_activity TYPE option<string>;
DEFINE FIELD created_at ON TABLE ticket_activity TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_activity_ticket ON TABLE ticket_activity \
    COLUMNS tenant_id, ticket_id;

-- =======================================================================
-- Master data and preferences (tenant scope)
-- =======================================================================
DEFINE TABLE master_data SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE master_data TYPE string;
DEFINE FIELD kind ON TABLE master_data TYPE string \
    ASSERT $value IN ['manufacturer', 'model', 'category', 'location', \
    'vendor', 'company'];
DEFINE FIELD value ON TABLE master_data TYPE string;
DEFINE FIELD created_at ON TABLE master_data TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_master_data_tenant_kind ON TABLE master_data \
    COLUMNS tenant_id, kind;

DEFINE TABLE user_preference SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE user_preference TYPE string;
DEFINE FIELD user_id ON TABLE user_preference TYPE string;
DEFINE FIELD preferences ON TABLE user_preference TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD updated_at ON TABLE user_preference TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_preference_tenant_user ON TABLE user_preference \
    COLUMNS tenant_id, user_id UNIQUE;

-- =======================================================================
-- Audit Log (tenant scope, append-only)
-- =======================================================================
DEFINE TABLE audit_log SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD tenant_id ON TABLE audit_log TYPE option<string>;
DEFINE FIELD actor_type ON TABLE audit_log TYPE string \
    ASSERT $value IN ['User', 'System', 'AuthAttempt'];
DEFINE FIELD actor_id ON TABLE audit_log TYPE option<string>;
DEFINE FIELD actor_email ON TABLE audit_log TYPE option<string>;
DEFINE FIELD actor_role ON TABLE audit_log TYPE option<string>;
DEFINE FIELD action ON TABLE audit_log TYPE string;
DEFINE FIELD resource_type ON TABLE audit_log TYPE string;
DEFINE FIELD resource_id ON TABLE audit_log TYPE option<string>;
DEFINE FIELD outcome ON TABLE audit_log TYPE string \
    ASSERT $value IN ['Success', 'Failure', 'Denied'];
DEFINE FIELD before_state ON TABLE audit_log TYPE option<object> \
    FLEXIBLE;
DEFINE FIELD after_state ON TABLE audit_log TYPE option<object> \
    FLEXIBLE;
DEFINE FIELD ip_address ON TABLE audit_log TYPE option<string>;
DEFINE FIELD user_agent ON TABLE audit_log TYPE option<string>;
DEFINE FIELD timestamp ON TABLE audit_log TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_audit_tenant_time ON TABLE audit_log \
    COLUMNS tenant_id, timestamp;
DEFINE INDEX idx_audit_tenant_actor ON TABLE audit_log \
    COLUMNS tenant_id, actor_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
/// All DEFINE statements are idempotent so re-running is safe.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    // Ensure migration tracking table exists (idempotent).
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    // Determine current schema version.
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            // Record the applied migration.
            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_v1_is_nonempty() {
        assert!(!SCHEMA_V1.is_empty());
    }

    #[test]
    fn exclusivity_indexes_are_unique() {
        for index in [
            "idx_admin_lock_tenant",
            "idx_ticket_number",
            "idx_user_tenant_email",
            "idx_user_tenant_employee",
            "idx_tenant_name_key",
            "idx_invitation_token",
        ] {
            let at = SCHEMA_V1
                .find(&format!("DEFINE INDEX {index} "))
                .unwrap_or_else(|| panic!("{index} not defined"));
            let stmt = &SCHEMA_V1[at..];
            let stmt = &stmt[..stmt.find(';').unwrap()];
            assert!(stmt.ends_with("UNIQUE"), "{index} must be UNIQUE");
        }
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }
}
