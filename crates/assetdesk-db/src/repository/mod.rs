//! SurrealDB repository implementations.
//!
//! Every tenant-owned query ANDs `tenant_id = $tenant_id` into its
//! predicate. Rows are read back with `meta::id(id) AS record_id` so the
//! UUID is recovered from the record id.

mod admin_lock;
mod asset;
mod audit;
mod invitation;
mod license;
mod master_data;
mod preference;
mod tenant;
mod ticket;
mod user;

use std::time::Duration;

use chrono::NaiveDate;
use rand::Rng;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbError;

pub use admin_lock::SurrealAdminLockRepository;
pub use asset::SurrealAssetRepository;
pub use audit::SurrealAuditLogRepository;
pub use invitation::{SurrealInvitationRepository, hash_token};
pub use license::SurrealLicenseRepository;
pub use master_data::SurrealMasterDataRepository;
pub use preference::SurrealPreferenceRepository;
pub use tenant::SurrealTenantRepository;
pub use ticket::SurrealTicketRepository;
pub use user::SurrealUserRepository;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub total: u64,
}

pub(crate) fn total_of(rows: &[CountRow]) -> u64 {
    rows.first().map(|r| r.total).unwrap_or(0)
}

pub(crate) fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw).map_err(|e| DbError::Decode(format!("invalid {what} UUID: {e}")))
}

pub(crate) fn parse_opt_uuid(raw: Option<String>, what: &str) -> Result<Option<Uuid>, DbError> {
    raw.map(|s| parse_uuid(&s, what)).transpose()
}

pub(crate) fn parse_date(raw: Option<String>, what: &str) -> Result<Option<NaiveDate>, DbError> {
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map_err(|e| DbError::Decode(format!("invalid {what} date '{s}': {e}")))
    })
    .transpose()
}

pub(crate) fn date_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Confirm that `table:id` exists and belongs to `tenant_id`.
///
/// Absence and foreign ownership both come back as `NotFound` for the
/// referenced entity.
pub(crate) async fn ensure_in_tenant<C: Connection>(
    db: &Surreal<C>,
    table: &str,
    id: Uuid,
    tenant_id: Uuid,
) -> Result<(), DbError> {
    let mut result = db
        .query(
            "SELECT VALUE meta::id(id) FROM type::record($table, $id) \
             WHERE tenant_id = $tenant_id",
        )
        .bind(("table", table.to_string()))
        .bind(("id", id.to_string()))
        .bind(("tenant_id", tenant_id.to_string()))
        .await
        .map_err(DbError::from)?;
    let found: Vec<String> = result.take(0).map_err(DbError::from)?;
    if found.is_empty() {
        return Err(DbError::NotFound {
            entity: table.into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Attempts made for a unit of work that keeps hitting transaction
/// conflicts.
pub(crate) const MAX_CONFLICT_ATTEMPTS: u32 = 8;

/// Re-run `op` while it fails with a transaction conflict.
///
/// Only [`DbError::Conflict`] is retried; every other outcome is returned
/// as is. The last conflict is returned once the attempts run out.
pub(crate) async fn retry_on_conflict<T, F, Fut>(what: &str, mut op: F) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if err.is_conflict() && attempt < MAX_CONFLICT_ATTEMPTS => {
                debug!(operation = what, attempt, "transaction conflict, retrying");
                let jitter = rand::rng().random_range(0..5u64);
                tokio::time::sleep(Duration::from_millis(u64::from(attempt) * 5 + jitter)).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}
