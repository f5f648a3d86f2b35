//! SurrealDB implementation of [`TenantRepository`].

use assetdesk_core::error::RegistryResult;
use assetdesk_core::models::tenant::{
    CreateTenant, Tenant, TenantSettings, UpdateTenant, tenant_name_key,
};
use assetdesk_core::repository::{PaginatedResult, Pagination, TenantRepository};
use chrono::{DateTime, Utc};
use surrealdb::Connection;
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_uuid, total_of};
use crate::error::DbError;
use crate::store::Store;

const SELECT_TENANT: &str = "SELECT meta::id(id) AS record_id, * FROM tenant";

#[derive(Debug, SurrealValue)]
struct TenantRow {
    record_id: String,
    name: String,
    settings: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TenantRow {
    fn try_into_tenant(self) -> Result<Tenant, DbError> {
        // Settings written by older builds may lack newer keys.
        let settings = serde_json::from_value::<TenantSettings>(self.settings)
            .unwrap_or_default();
        Ok(Tenant {
            id: parse_uuid(&self.record_id, "tenant")?,
            name: self.name,
            settings,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn settings_value(settings: &TenantSettings) -> Result<serde_json::Value, DbError> {
    serde_json::to_value(settings).map_err(|e| DbError::Decode(e.to_string()))
}

/// SurrealDB implementation of the Tenant repository.
#[derive(Clone)]
pub struct SurrealTenantRepository<C: Connection> {
    store: Store<C>,
}

impl<C: Connection> SurrealTenantRepository<C> {
    pub fn new(store: Store<C>) -> Self {
        Self { store }
    }
}

impl<C: Connection> TenantRepository for SurrealTenantRepository<C> {
    async fn create(&self, input: CreateTenant) -> RegistryResult<Tenant> {
        let _permit = self.store.acquire().await?;
        let id_str = Uuid::new_v4().to_string();
        let settings = settings_value(&input.settings.unwrap_or_default())?;

        let result = self
            .store
            .client()
            .query(
                "CREATE type::record('tenant', $id) SET \
                 name = $name, name_key = $name_key, settings = $settings; \
                 SELECT meta::id(id) AS record_id, * FROM type::record('tenant', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name.trim().to_string()))
            .bind(("name_key", tenant_name_key(&input.name)))
            .bind(("settings", settings))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: id_str,
        })?;
        Ok(row.try_into_tenant()?)
    }

    async fn get_by_id(&self, id: Uuid) -> RegistryResult<Tenant> {
        let _permit = self.store.acquire().await?;
        let id_str = id.to_string();
        let mut result = self
            .store
            .client()
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('tenant', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: id_str,
        })?;
        Ok(row.try_into_tenant()?)
    }

    async fn get_by_name(&self, name: &str) -> RegistryResult<Tenant> {
        let _permit = self.store.acquire().await?;
        let query = format!("{SELECT_TENANT} WHERE name_key = $name_key");
        let mut result = self
            .store
            .client()
            .query(&query)
            .bind(("name_key", tenant_name_key(name)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: format!("name={name}"),
        })?;
        Ok(row.try_into_tenant()?)
    }

    async fn update(&self, id: Uuid, input: UpdateTenant) -> RegistryResult<Tenant> {
        let _permit = self.store.acquire().await?;
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name, name_key = $name_key");
        }
        if input.settings.is_some() {
            sets.push("settings = $settings");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('tenant', $id) SET {}; \
             SELECT meta::id(id) AS record_id, * FROM type::record('tenant', $id);",
            sets.join(", ")
        );

        let mut builder = self
            .store
            .client()
            .query(&query)
            .bind(("id", id_str.clone()));
        if let Some(name) = input.name {
            builder = builder
                .bind(("name_key", tenant_name_key(&name)))
                .bind(("name", name.trim().to_string()));
        }
        if let Some(settings) = input.settings {
            builder = builder.bind(("settings", settings_value(&settings)?));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<TenantRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "tenant".into(),
            id: id_str,
        })?;
        Ok(row.try_into_tenant()?)
    }

    async fn list(&self, pagination: Pagination) -> RegistryResult<PaginatedResult<Tenant>> {
        let _permit = self.store.acquire().await?;
        let query = format!(
            "SELECT count() AS total FROM tenant GROUP ALL; \
             {SELECT_TENANT} ORDER BY created_at ASC LIMIT $limit START $offset;"
        );
        let mut result = self
            .store
            .client()
            .query(&query)
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<TenantRow> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(TenantRow::try_into_tenant)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: total_of(&count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
