//! SurrealDB implementation of [`MasterDataRepository`].

use std::collections::BTreeSet;

use assetdesk_core::TenantScope;
use assetdesk_core::error::{FieldIssue, RegistryError, RegistryResult};
use assetdesk_core::models::master_data::{MasterDataEntry, MasterDataKind};
use assetdesk_core::repository::MasterDataRepository;
use chrono::{DateTime, Utc};
use surrealdb::Connection;
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::parse_uuid;
use crate::error::DbError;
use crate::store::Store;

#[derive(Debug, SurrealValue)]
struct MasterDataRow {
    record_id: String,
    tenant_id: String,
    kind: String,
    value: String,
    created_at: DateTime<Utc>,
}

impl MasterDataRow {
    fn try_into_entry(self) -> Result<MasterDataEntry, DbError> {
        let kind = MasterDataKind::parse(&self.kind)
            .ok_or_else(|| DbError::Decode(format!("unknown master data kind: {}", self.kind)))?;
        Ok(MasterDataEntry {
            id: parse_uuid(&self.record_id, "master_data")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            kind,
            value: self.value,
            created_at: self.created_at,
        })
    }
}

/// Case-insensitive de-duplication keeping the first spelling seen.
fn distinct_values(values: Vec<String>, limit: usize) -> Vec<String> {
    let mut seen = BTreeSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.to_lowercase()))
        .take(limit)
        .collect()
}

/// SurrealDB implementation of the master data repository.
#[derive(Clone)]
pub struct SurrealMasterDataRepository<C: Connection> {
    store: Store<C>,
}

impl<C: Connection> SurrealMasterDataRepository<C> {
    pub fn new(store: Store<C>) -> Self {
        Self { store }
    }
}

impl<C: Connection> MasterDataRepository for SurrealMasterDataRepository<C> {
    async fn add(
        &self,
        scope: TenantScope,
        kind: MasterDataKind,
        value: &str,
    ) -> RegistryResult<MasterDataEntry> {
        let value = value.trim();
        if value.is_empty() {
            return Err(RegistryError::invalid(FieldIssue::missing("value")));
        }

        let _permit = self.store.acquire().await?;
        let id_str = Uuid::new_v4().to_string();
        let result = self
            .store
            .client()
            .query(
                "CREATE type::record('master_data', $id) SET \
                     tenant_id = $tenant_id, kind = $kind, value = $value; \
                 SELECT meta::id(id) AS record_id, * FROM type::record('master_data', $id) \
                     WHERE tenant_id = $tenant_id;",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", scope.tenant_id().to_string()))
            .bind(("kind", kind.as_str().to_string()))
            .bind(("value", value.to_string()))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<MasterDataRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "master_data".into(),
            id: id_str,
        })?;
        Ok(row.try_into_entry()?)
    }

    async fn list(
        &self,
        scope: TenantScope,
        kind: Option<MasterDataKind>,
    ) -> RegistryResult<Vec<MasterDataEntry>> {
        let _permit = self.store.acquire().await?;
        let clause = if kind.is_some() {
            "tenant_id = $tenant_id AND kind = $kind"
        } else {
            "tenant_id = $tenant_id"
        };
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM master_data \
             WHERE {clause} ORDER BY kind ASC, value ASC"
        );
        let mut builder = self
            .store
            .client()
            .query(&query)
            .bind(("tenant_id", scope.tenant_id().to_string()));
        if let Some(kind) = kind {
            builder = builder.bind(("kind", kind.as_str().to_string()));
        }
        let mut result = builder.await.map_err(DbError::from)?;

        let rows: Vec<MasterDataRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(MasterDataRow::try_into_entry)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn suggest(
        &self,
        scope: TenantScope,
        kind: MasterDataKind,
        prefix: &str,
        limit: u64,
    ) -> RegistryResult<Vec<String>> {
        let _permit = self.store.acquire().await?;
        let mut result = self
            .store
            .client()
            .query(
                "SELECT VALUE value FROM master_data \
                 WHERE tenant_id = $tenant_id AND kind = $kind \
                 AND string::starts_with(string::lowercase(value), $prefix)",
            )
            .bind(("tenant_id", scope.tenant_id().to_string()))
            .bind(("kind", kind.as_str().to_string()))
            .bind(("prefix", prefix.trim().to_lowercase()))
            .await
            .map_err(DbError::from)?;

        let mut values: Vec<String> = result.take(0).map_err(DbError::from)?;
        values.sort();
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(distinct_values(values, limit))
    }
}
