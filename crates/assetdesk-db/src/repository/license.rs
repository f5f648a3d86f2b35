//! SurrealDB implementation of [`LicenseRepository`].
//!
//! Seat over-allocation (`used > total`) is stored as given and only
//! logged; reporting surfaces it through the metrics snapshot.

use assetdesk_core::TenantScope;
use assetdesk_core::error::RegistryResult;
use assetdesk_core::models::license::{CreateLicense, SoftwareLicense, UpdateLicense};
use assetdesk_core::repository::{LicenseRepository, PaginatedResult, Pagination};
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use surrealdb::Connection;
use surrealdb_types::SurrealValue;
use tracing::warn;
use uuid::Uuid;

use super::{CountRow, date_string, parse_date, parse_uuid, total_of};
use crate::error::DbError;
use crate::store::Store;

const SELECT_LICENSE: &str = "SELECT meta::id(id) AS record_id, * FROM software_license";

const SELECT_LICENSE_BY_ID: &str = "SELECT meta::id(id) AS record_id, * \
    FROM type::record('software_license', $id) WHERE tenant_id = $tenant_id";

#[derive(Debug, SurrealValue)]
struct LicenseRow {
    record_id: String,
    tenant_id: String,
    software_name: String,
    vendor: Option<String>,
    total_licenses: u32,
    used_licenses: u32,
    cost_per_license: Option<f64>,
    purchase_date: Option<String>,
    renewal_date: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl LicenseRow {
    fn try_into_license(self) -> Result<SoftwareLicense, DbError> {
        Ok(SoftwareLicense {
            id: parse_uuid(&self.record_id, "license")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            software_name: self.software_name,
            vendor: self.vendor,
            total_licenses: self.total_licenses,
            used_licenses: self.used_licenses,
            cost_per_license: self.cost_per_license,
            purchase_date: parse_date(self.purchase_date, "purchase")?,
            renewal_date: parse_date(self.renewal_date, "renewal")?,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn first_license(rows: Vec<LicenseRow>, id: String) -> Result<SoftwareLicense, DbError> {
    let license = rows
        .into_iter()
        .next()
        .ok_or(DbError::NotFound {
            entity: "software_license".into(),
            id,
        })?
        .try_into_license()?;
    if license.is_over_allocated() {
        warn!(
            tenant_id = %license.tenant_id,
            license_id = %license.id,
            used = license.used_licenses,
            total = license.total_licenses,
            "license seats over-allocated"
        );
    }
    Ok(license)
}

fn cost_value(cost: f64) -> Option<Value> {
    serde_json::Number::from_f64(cost).map(Value::Number)
}

/// SurrealDB implementation of the software license repository.
#[derive(Clone)]
pub struct SurrealLicenseRepository<C: Connection> {
    store: Store<C>,
}

impl<C: Connection> SurrealLicenseRepository<C> {
    pub fn new(store: Store<C>) -> Self {
        Self { store }
    }
}

impl<C: Connection> LicenseRepository for SurrealLicenseRepository<C> {
    async fn create(
        &self,
        scope: TenantScope,
        input: CreateLicense,
    ) -> RegistryResult<SoftwareLicense> {
        let _permit = self.store.acquire().await?;
        let id_str = Uuid::new_v4().to_string();

        let mut content = json!({
            "tenant_id": scope.tenant_id().to_string(),
            "software_name": input.software_name.trim(),
            "total_licenses": input.total_licenses,
            "used_licenses": input.used_licenses,
        });
        if let Some(obj) = content.as_object_mut() {
            if let Some(vendor) = input.vendor {
                obj.insert("vendor".into(), json!(vendor));
            }
            if let Some(cost) = input.cost_per_license.and_then(cost_value) {
                obj.insert("cost_per_license".into(), cost);
            }
            if let Some(d) = input.purchase_date {
                obj.insert("purchase_date".into(), json!(date_string(d)));
            }
            if let Some(d) = input.renewal_date {
                obj.insert("renewal_date".into(), json!(date_string(d)));
            }
            if let Some(notes) = input.notes {
                obj.insert("notes".into(), json!(notes));
            }
        }

        let query = format!(
            "CREATE type::record('software_license', $id) CONTENT $content; \
             {SELECT_LICENSE_BY_ID};"
        );
        let result = self
            .store
            .client()
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", scope.tenant_id().to_string()))
            .bind(("content", content))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<LicenseRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_license(rows, id_str)?)
    }

    async fn get_by_id(&self, scope: TenantScope, id: Uuid) -> RegistryResult<SoftwareLicense> {
        let _permit = self.store.acquire().await?;
        let id_str = id.to_string();
        let mut result = self
            .store
            .client()
            .query(SELECT_LICENSE_BY_ID)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", scope.tenant_id().to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<LicenseRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_license(rows, id_str)?)
    }

    async fn list(
        &self,
        scope: TenantScope,
        pagination: Pagination,
    ) -> RegistryResult<PaginatedResult<SoftwareLicense>> {
        let _permit = self.store.acquire().await?;
        let query = format!(
            "SELECT count() AS total FROM software_license \
             WHERE tenant_id = $tenant_id GROUP ALL; \
             {SELECT_LICENSE} WHERE tenant_id = $tenant_id \
             ORDER BY software_name ASC LIMIT $limit START $offset;"
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
        let rows: Vec<LicenseRow> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(LicenseRow::try_into_license)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: total_of(&count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_all(&self, scope: TenantScope) -> RegistryResult<Vec<SoftwareLicense>> {
        let _permit = self.store.acquire().await?;
        let query =
            format!("{SELECT_LICENSE} WHERE tenant_id = $tenant_id ORDER BY software_name ASC");
        let mut result = self
            .store
            .client()
            .query(&query)
            .bind(("tenant_id", scope.tenant_id().to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<LicenseRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(LicenseRow::try_into_license)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn update(
        &self,
        scope: TenantScope,
        id: Uuid,
        input: UpdateLicense,
    ) -> RegistryResult<SoftwareLicense> {
        let _permit = self.store.acquire().await?;
        let id_str = id.to_string();

        let mut sets: Vec<&str> = Vec::new();
        let mut binds: Vec<(&'static str, Value)> = Vec::new();
        if let Some(name) = input.software_name {
            sets.push("software_name = $software_name");
            binds.push(("software_name", json!(name.trim())));
        }
        if let Some(total) = input.total_licenses {
            sets.push("total_licenses = $total_licenses");
            binds.push(("total_licenses", json!(total)));
        }
        if let Some(used) = input.used_licenses {
            sets.push("used_licenses = $used_licenses");
            binds.push(("used_licenses", json!(used)));
        }
        match input.cost_per_license.map(|c| c.and_then(cost_value)) {
            Some(Some(cost)) => {
                sets.push("cost_per_license = $cost_per_license");
                binds.push(("cost_per_license", cost));
            }
            Some(None) => sets.push("cost_per_license = NONE"),
            None => {}
        }
        match input.renewal_date {
            Some(Some(d)) => {
                sets.push("renewal_date = $renewal_date");
                binds.push(("renewal_date", json!(date_string(d))));
            }
            Some(None) => sets.push("renewal_date = NONE"),
            None => {}
        }
        match input.notes {
            Some(Some(notes)) => {
                sets.push("notes = $notes");
                binds.push(("notes", json!(notes)));
            }
            Some(None) => sets.push("notes = NONE"),
            None => {}
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('software_license', $id) SET {} \
             WHERE tenant_id = $tenant_id; \
             {SELECT_LICENSE_BY_ID};",
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
        let rows: Vec<LicenseRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_license(rows, id_str)?)
    }

    async fn delete(&self, scope: TenantScope, id: Uuid) -> RegistryResult<()> {
        let _permit = self.store.acquire().await?;
        let mut result = self
            .store
            .client()
            .query(
                "DELETE type::record('software_license', $id) \
                 WHERE tenant_id = $tenant_id RETURN BEFORE",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", scope.tenant_id().to_string()))
            .await
            .map_err(DbError::from)?;

        let deleted: Vec<surrealdb_types::Value> = result.take(0).map_err(DbError::from)?;
        if deleted.is_empty() {
            return Err(DbError::NotFound {
                entity: "software_license".into(),
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }
}
