//! SurrealDB implementation of [`PreferenceRepository`].
//!
//! One `user_preference` record per user, keyed by the user's id.

use assetdesk_core::TenantScope;
use assetdesk_core::error::{FieldIssue, RegistryError, RegistryResult};
use assetdesk_core::models::preference::UserPreferences;
use assetdesk_core::repository::PreferenceRepository;
use chrono::{DateTime, Utc};
use serde_json::Value;
use surrealdb::Connection;
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{ensure_in_tenant, parse_uuid};
use crate::error::DbError;
use crate::store::Store;

const SELECT_PREFERENCES: &str = "SELECT * FROM type::record('user_preference', $user_id) \
    WHERE tenant_id = $tenant_id";

#[derive(Debug, SurrealValue)]
struct PreferenceRow {
    tenant_id: String,
    user_id: String,
    preferences: Value,
    updated_at: DateTime<Utc>,
}

impl PreferenceRow {
    fn try_into_preferences(self) -> Result<UserPreferences, DbError> {
        Ok(UserPreferences {
            user_id: parse_uuid(&self.user_id, "user")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            preferences: self.preferences,
            updated_at: Some(self.updated_at),
        })
    }
}

/// SurrealDB implementation of the preferences repository.
#[derive(Clone)]
pub struct SurrealPreferenceRepository<C: Connection> {
    store: Store<C>,
}

impl<C: Connection> SurrealPreferenceRepository<C> {
    pub fn new(store: Store<C>) -> Self {
        Self { store }
    }
}

impl<C: Connection> PreferenceRepository for SurrealPreferenceRepository<C> {
    /// A user who never saved preferences gets an empty object.
    async fn get(&self, scope: TenantScope, user_id: Uuid) -> RegistryResult<UserPreferences> {
        let _permit = self.store.acquire().await?;
        let tenant_id = scope.tenant_id();
        ensure_in_tenant(self.store.client(), "user", user_id, tenant_id).await?;

        let mut result = self
            .store
            .client()
            .query(SELECT_PREFERENCES)
            .bind(("user_id", user_id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<PreferenceRow> = result.take(0).map_err(DbError::from)?;

        match rows.into_iter().next() {
            Some(row) => Ok(row.try_into_preferences()?),
            None => Ok(UserPreferences {
                user_id,
                tenant_id,
                preferences: Value::Object(Default::default()),
                updated_at: None,
            }),
        }
    }

    async fn upsert(
        &self,
        scope: TenantScope,
        user_id: Uuid,
        preferences: Value,
    ) -> RegistryResult<UserPreferences> {
        if !preferences.is_object() {
            return Err(RegistryError::invalid(FieldIssue::invalid_format(
                "preferences",
                "must be an object",
            )));
        }

        let _permit = self.store.acquire().await?;
        let tenant_id = scope.tenant_id();
        ensure_in_tenant(self.store.client(), "user", user_id, tenant_id).await?;

        let query = format!(
            "UPSERT type::record('user_preference', $user_id) SET \
                 tenant_id = $tenant_id, user_id = $user_id, \
                 preferences = $preferences, updated_at = time::now(); \
             {SELECT_PREFERENCES};"
        );
        let result = self
            .store
            .client()
            .query(&query)
            .bind(("user_id", user_id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("preferences", preferences))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<PreferenceRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "user_preference".into(),
            id: user_id.to_string(),
        })?;
        Ok(row.try_into_preferences()?)
    }
}
