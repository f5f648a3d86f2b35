//! SurrealDB implementation of [`UserRepository`].
//!
//! Passwords arrive already hashed. Employee numbers are assigned by the
//! store as `max + 1` within the tenant; the `(tenant_id, employee_id)`
//! unique index turns a race on the same number into a retry.

use std::collections::BTreeSet;

use assetdesk_core::TenantScope;
use assetdesk_core::error::{RegistryError, RegistryResult};
use assetdesk_core::models::user::{CreateUser, Role, UpdateUserProfile, User, normalize_email};
use assetdesk_core::repository::{PaginatedResult, Pagination, UserRepository};
use chrono::{DateTime, Utc};
use surrealdb::Connection;
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_uuid, retry_on_conflict, total_of};
use crate::error::DbError;
use crate::store::Store;

pub(crate) const EMPLOYEE_INDEX: &str = "idx_user_tenant_employee";

/// Creates `user:$user_id` from the bound `$user` object, numbering it
/// after the highest employee id in the tenant.
pub(crate) const CREATE_USER_STMT: &str = "\
CREATE type::record('user', $user_id) SET \
    tenant_id = $user.tenant_id, \
    email = $user.email, \
    first_name = $user.first_name, \
    last_name = $user.last_name, \
    password_hash = $user.password_hash, \
    role = $user.role, \
    is_active = true, \
    employee_id = math::max(array::concat([0], \
        (SELECT VALUE employee_id FROM user \
         WHERE tenant_id = $user.tenant_id))) + 1;";

pub(crate) const SELECT_USER: &str = "SELECT meta::id(id) AS record_id, * FROM user";

/// Point lookup of `user:$id` confined to `$tenant_id`.
pub(crate) const SELECT_USER_BY_ID: &str = "SELECT meta::id(id) AS record_id, * \
    FROM type::record('user', $id) WHERE tenant_id = $tenant_id";

#[derive(Debug, SurrealValue)]
pub(crate) struct UserRow {
    record_id: String,
    tenant_id: String,
    email: String,
    first_name: String,
    last_name: String,
    password_hash: String,
    role: String,
    employee_id: u32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    pub(crate) fn try_into_user(self) -> Result<User, DbError> {
        let role = Role::normalize(&self.role)
            .ok_or_else(|| DbError::Decode(format!("unknown role: {}", self.role)))?;
        Ok(User {
            id: parse_uuid(&self.record_id, "user")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            password_hash: self.password_hash,
            role,
            employee_id: self.employee_id,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// The `$user` object consumed by [`CREATE_USER_STMT`].
pub(crate) fn new_user_content(tenant_id: Uuid, input: &CreateUser, role: Role) -> serde_json::Value {
    serde_json::json!({
        "tenant_id": tenant_id.to_string(),
        "email": normalize_email(&input.email),
        "first_name": input.first_name.trim(),
        "last_name": input.last_name.trim(),
        "password_hash": input.password_hash,
        "role": role.as_str(),
    })
}

/// A lost race for an employee number is retried like a conflict.
pub(crate) fn employee_race_as_conflict(err: DbError) -> DbError {
    if err.is_unique_violation_on(EMPLOYEE_INDEX) {
        DbError::Conflict(format!("employee number taken ({EMPLOYEE_INDEX})"))
    } else {
        err
    }
}

fn first_user(rows: Vec<UserRow>, id: String) -> Result<User, DbError> {
    rows.into_iter()
        .next()
        .ok_or(DbError::NotFound {
            entity: "user".into(),
            id,
        })?
        .try_into_user()
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    store: Store<C>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(store: Store<C>) -> Self {
        Self { store }
    }

    /// Apply `sets` to one tenant-owned user and return the result.
    async fn update_fields(
        &self,
        scope: TenantScope,
        id: Uuid,
        sets: &[&str],
        binds: Vec<(&'static str, serde_json::Value)>,
    ) -> RegistryResult<User> {
        let _permit = self.store.acquire().await?;
        let id_str = id.to_string();

        let query = format!(
            "UPDATE type::record('user', $id) SET {}, updated_at = time::now() \
             WHERE tenant_id = $tenant_id; \
             {SELECT_USER_BY_ID};",
            sets.join(", ")
        );
        let mut builder = self
            .store
            .client()
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", scope.tenant_id().to_string()));
        for bind in binds {
            builder = builder.bind(bind);
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;
        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_user(rows, id_str)?)
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, scope: TenantScope, input: CreateUser) -> RegistryResult<User> {
        if input.role == Role::SuperAdmin {
            return Err(RegistryError::AuthorizationDenied {
                reason: "super-admin is only created by the first-admin claim".into(),
            });
        }
        let id_str = Uuid::new_v4().to_string();
        let content = new_user_content(scope.tenant_id(), &input, input.role);
        let query = format!(
            "{CREATE_USER_STMT} \
             SELECT meta::id(id) AS record_id, * FROM type::record('user', $user_id) \
             WHERE tenant_id = $user.tenant_id;"
        );

        let _permit = self.store.acquire().await?;
        let rows = retry_on_conflict("user.create", || async {
            let result = self
                .store
                .client()
                .query(&query)
                .bind(("user_id", id_str.clone()))
                .bind(("user", content.clone()))
                .await
                .map_err(DbError::from)?;
            let mut result = result
                .check()
                .map_err(|e| employee_race_as_conflict(DbError::from(e)))?;
            let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
            Ok(rows)
        })
        .await?;

        Ok(first_user(rows, id_str)?)
    }

    async fn get_by_id(&self, scope: TenantScope, id: Uuid) -> RegistryResult<User> {
        let _permit = self.store.acquire().await?;
        let id_str = id.to_string();
        let mut result = self
            .store
            .client()
            .query(SELECT_USER_BY_ID)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", scope.tenant_id().to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_user(rows, id_str)?)
    }

    async fn get_by_email(&self, scope: TenantScope, email: &str) -> RegistryResult<User> {
        let _permit = self.store.acquire().await?;
        let query = format!("{SELECT_USER} WHERE tenant_id = $tenant_id AND email = $email");
        let mut result = self
            .store
            .client()
            .query(&query)
            .bind(("tenant_id", scope.tenant_id().to_string()))
            .bind(("email", normalize_email(email)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_user(rows, format!("email={email}"))?)
    }

    async fn list(
        &self,
        scope: TenantScope,
        pagination: Pagination,
    ) -> RegistryResult<PaginatedResult<User>> {
        let _permit = self.store.acquire().await?;
        let query = format!(
            "SELECT count() AS total FROM user WHERE tenant_id = $tenant_id GROUP ALL; \
             {SELECT_USER} WHERE tenant_id = $tenant_id \
             ORDER BY employee_id ASC LIMIT $limit START $offset;"
        );
        let mut result = self
            .store
            .client()
            .query(&query)
            .bind(("tenant_id", scope.tenant_id().to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(UserRow::try_into_user)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: total_of(&count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn update_role(&self, scope: TenantScope, id: Uuid, role: Role) -> RegistryResult<User> {
        if role == Role::SuperAdmin {
            return Err(RegistryError::AuthorizationDenied {
                reason: "super-admin cannot be granted".into(),
            });
        }
        self.update_fields(
            scope,
            id,
            &["role = $role"],
            vec![("role", role.as_str().into())],
        )
        .await
    }

    async fn set_active(&self, scope: TenantScope, id: Uuid, active: bool) -> RegistryResult<User> {
        self.update_fields(
            scope,
            id,
            &["is_active = $is_active"],
            vec![("is_active", active.into())],
        )
        .await
    }

    async fn update_profile(
        &self,
        scope: TenantScope,
        id: Uuid,
        input: UpdateUserProfile,
    ) -> RegistryResult<User> {
        let mut sets = Vec::new();
        let mut binds = Vec::new();
        if let Some(first_name) = input.first_name {
            sets.push("first_name = $first_name");
            binds.push(("first_name", first_name.trim().into()));
        }
        if let Some(last_name) = input.last_name {
            sets.push("last_name = $last_name");
            binds.push(("last_name", last_name.trim().into()));
        }
        if let Some(email) = input.email {
            sets.push("email = $email");
            binds.push(("email", normalize_email(&email).into()));
        }
        if sets.is_empty() {
            return self.get_by_id(scope, id).await;
        }
        self.update_fields(scope, id, &sets, binds).await
    }

    async fn existing_ids(
        &self,
        scope: TenantScope,
        ids: BTreeSet<Uuid>,
    ) -> RegistryResult<BTreeSet<Uuid>> {
        if ids.is_empty() {
            return Ok(BTreeSet::new());
        }
        let _permit = self.store.acquire().await?;
        let wanted: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        let mut result = self
            .store
            .client()
            .query(
                "SELECT VALUE meta::id(id) FROM user \
                 WHERE tenant_id = $tenant_id AND meta::id(id) IN $ids",
            )
            .bind(("tenant_id", scope.tenant_id().to_string()))
            .bind(("ids", serde_json::json!(wanted)))
            .await
            .map_err(DbError::from)?;

        let found: Vec<String> = result.take(0).map_err(DbError::from)?;
        Ok(found
            .iter()
            .map(|id| parse_uuid(id, "user"))
            .collect::<Result<BTreeSet<_>, DbError>>()?)
    }
}
