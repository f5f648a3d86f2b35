//! SurrealDB implementation of [`AdminLockRepository`].
//!
//! The lock row uses the tenant id as its record id and is additionally
//! covered by `idx_admin_lock_tenant`, so the store rejects a second claim
//! no matter how the claims interleave. Claim and user creation commit
//! together or not at all.

use assetdesk_core::TenantScope;
use assetdesk_core::error::RegistryResult;
use assetdesk_core::models::admin_lock::{AdminLock, BackfillReport, FirstAdminOutcome};
use assetdesk_core::models::user::{CreateUser, Role};
use assetdesk_core::repository::AdminLockRepository;
use chrono::{DateTime, Utc};
use surrealdb::Connection;
use surrealdb_types::SurrealValue;
use tracing::{info, warn};
use uuid::Uuid;

use super::user::{
    CREATE_USER_STMT, SELECT_USER_BY_ID, UserRow, employee_race_as_conflict, new_user_content,
};
use super::{parse_uuid, retry_on_conflict};
use crate::error::DbError;
use crate::store::Store;

pub(crate) const ADMIN_LOCK_INDEX: &str = "idx_admin_lock_tenant";

const CREATE_LOCK_STMT: &str = "\
CREATE type::record('admin_lock', $tenant_id) SET \
    tenant_id = $tenant_id, admin_user_id = $user_id;";

#[derive(Debug, SurrealValue)]
struct AdminLockRow {
    record_id: String,
    tenant_id: String,
    admin_user_id: String,
    created_at: DateTime<Utc>,
}

impl AdminLockRow {
    fn try_into_lock(self) -> Result<AdminLock, DbError> {
        Ok(AdminLock {
            id: parse_uuid(&self.record_id, "admin_lock")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            admin_user_id: parse_uuid(&self.admin_user_id, "user")?,
            created_at: self.created_at,
        })
    }
}

/// An administrator that could own a backfilled lock.
#[derive(Debug, SurrealValue)]
struct AdminCandidateRow {
    record_id: String,
    role: String,
    created_at: DateTime<Utc>,
}

/// Pick the lock owner: the earliest super-admin, else the earliest admin.
fn choose_owner(mut candidates: Vec<AdminCandidateRow>) -> Option<AdminCandidateRow> {
    candidates.sort_by_key(|c| c.created_at);
    let rank = |c: &AdminCandidateRow| match Role::normalize(&c.role) {
        Some(Role::SuperAdmin) => 0,
        Some(Role::Admin) => 1,
        _ => 2,
    };
    candidates
        .into_iter()
        .filter(|c| rank(c) < 2)
        .min_by_key(|c| rank(c))
}

/// Whether a unique violation means "this tenant is already locked".
fn is_lock_taken(err: &DbError) -> bool {
    match err {
        DbError::UniqueViolation { index } => {
            index == ADMIN_LOCK_INDEX || index.starts_with("admin_lock:")
        }
        _ => false,
    }
}

/// SurrealDB implementation of the first-admin lock.
#[derive(Clone)]
pub struct SurrealAdminLockRepository<C: Connection> {
    store: Store<C>,
}

impl<C: Connection> SurrealAdminLockRepository<C> {
    pub fn new(store: Store<C>) -> Self {
        Self { store }
    }

    async fn tenant_ids(&self) -> Result<Vec<Uuid>, DbError> {
        let _permit = self.store.acquire().await?;
        let mut result = self
            .store
            .client()
            .query("SELECT VALUE meta::id(id) FROM tenant ORDER BY created_at ASC")
            .await?;
        let ids: Vec<String> = result.take(0)?;
        ids.iter().map(|s| parse_uuid(s, "tenant")).collect()
    }

    /// Lock one tenant that already has an administrator.
    ///
    /// `Ok(None)` means the tenant has no administrator and was skipped.
    async fn backfill_tenant(&self, tenant_id: Uuid) -> Result<Option<()>, DbError> {
        let _permit = self.store.acquire().await?;
        let mut result = self
            .store
            .client()
            .query(
                "SELECT meta::id(id) AS record_id, role, created_at FROM user \
                 WHERE tenant_id = $tenant_id AND role IN ['super-admin', 'admin']",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await?;
        let candidates: Vec<AdminCandidateRow> = result.take(0)?;
        let Some(owner) = choose_owner(candidates) else {
            return Ok(None);
        };

        self.store
            .client()
            .query(CREATE_LOCK_STMT)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("user_id", owner.record_id))
            .await?
            .check()?;
        Ok(Some(()))
    }
}

impl<C: Connection> AdminLockRepository for SurrealAdminLockRepository<C> {
    async fn claim_first_admin(
        &self,
        scope: TenantScope,
        input: CreateUser,
    ) -> RegistryResult<FirstAdminOutcome> {
        let tenant_id = scope.tenant_id();
        let _permit = self.store.acquire().await?;
        ensure_tenant_exists(&self.store, tenant_id).await?;

        let user_id = Uuid::new_v4().to_string();
        let content = new_user_content(tenant_id, &input, Role::SuperAdmin);
        let query = format!(
            "BEGIN TRANSACTION; \
             {CREATE_LOCK_STMT} \
             {CREATE_USER_STMT} \
             COMMIT TRANSACTION;"
        );

        let claimed = retry_on_conflict("admin_lock.claim", || async {
            self.store
                .client()
                .query(&query)
                .bind(("tenant_id", tenant_id.to_string()))
                .bind(("user_id", user_id.clone()))
                .bind(("user", content.clone()))
                .await?
                .check()
                .map_err(|e| employee_race_as_conflict(DbError::from(e)).aborted_as_conflict())?;
            Ok(())
        })
        .await;

        match claimed {
            Ok(()) => {}
            Err(err) if is_lock_taken(&err) => {
                info!(tenant_id = %tenant_id, "first-admin lock already held");
                return Ok(FirstAdminOutcome::AlreadyExists);
            }
            Err(err) => return Err(err.into()),
        }

        let mut result = self
            .store
            .client()
            .query(SELECT_USER_BY_ID)
            .bind(("id", user_id.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let user = rows
            .into_iter()
            .next()
            .ok_or(DbError::NotFound {
                entity: "user".into(),
                id: user_id,
            })?
            .try_into_user()?;

        info!(tenant_id = %tenant_id, user_id = %user.id, "first admin created");
        Ok(FirstAdminOutcome::Created(user))
    }

    async fn get(&self, scope: TenantScope) -> RegistryResult<AdminLock> {
        let _permit = self.store.acquire().await?;
        let tenant_id = scope.tenant_id().to_string();
        let mut result = self
            .store
            .client()
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('admin_lock', $tenant_id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("tenant_id", tenant_id.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AdminLockRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "admin_lock".into(),
            id: tenant_id,
        })?;
        Ok(row.try_into_lock()?)
    }

    async fn backfill(&self) -> RegistryResult<BackfillReport> {
        let mut report = BackfillReport::default();

        for tenant_id in self.tenant_ids().await? {
            match self.backfill_tenant(tenant_id).await {
                Ok(None) => {}
                Ok(Some(())) => {
                    report.examined += 1;
                    report.created += 1;
                }
                Err(err) if is_lock_taken(&err) => {
                    report.examined += 1;
                    report.already_locked += 1;
                }
                Err(err) => {
                    report.examined += 1;
                    report.failed += 1;
                    warn!(tenant_id = %tenant_id, error = %err, "admin lock backfill failed");
                }
            }
        }

        info!(
            examined = report.examined,
            created = report.created,
            already_locked = report.already_locked,
            failed = report.failed,
            "admin lock backfill finished"
        );
        Ok(report)
    }
}

async fn ensure_tenant_exists<C: Connection>(
    store: &Store<C>,
    tenant_id: Uuid,
) -> Result<(), DbError> {
    let mut result = store
        .client()
        .query("SELECT VALUE meta::id(id) FROM type::record('tenant', $id)")
        .bind(("id", tenant_id.to_string()))
        .await?;
    let found: Vec<String> = result.take(0)?;
    if found.is_empty() {
        return Err(DbError::NotFound {
            entity: "tenant".into(),
            id: tenant_id.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candidate(role: &str, minute: u32) -> AdminCandidateRow {
        AdminCandidateRow {
            record_id: format!("{role}-{minute}"),
            role: role.into(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
        }
    }

    #[test]
    fn super_admin_wins_over_earlier_admin() {
        let owner = choose_owner(vec![
            candidate("admin", 1),
            candidate("super-admin", 5),
            candidate("super-admin", 3),
        ])
        .unwrap();
        assert_eq!(owner.record_id, "super-admin-3");
    }

    #[test]
    fn earliest_admin_is_the_fallback() {
        let owner = choose_owner(vec![candidate("admin", 9), candidate("admin", 2)]).unwrap();
        assert_eq!(owner.record_id, "admin-2");
    }

    #[test]
    fn tenants_without_admins_are_skipped() {
        assert!(choose_owner(vec![candidate("technician", 1)]).is_none());
        assert!(choose_owner(Vec::new()).is_none());
    }

    #[test]
    fn duplicate_lock_record_counts_as_taken() {
        assert!(is_lock_taken(&DbError::UniqueViolation {
            index: ADMIN_LOCK_INDEX.into()
        }));
        assert!(is_lock_taken(&DbError::UniqueViolation {
            index: "admin_lock:⟨6a1f⟩".into()
        }));
        assert!(!is_lock_taken(&DbError::UniqueViolation {
            index: "idx_user_tenant_email".into()
        }));
    }
}
