//! SurrealDB implementation of [`AssetRepository`].

use std::collections::{BTreeSet, HashMap};

use assetdesk_core::TenantScope;
use assetdesk_core::error::RegistryResult;
use assetdesk_core::models::asset::{
    Asset, AssetCount, AssetFilter, AssetStatus, AssetType, CreateAsset, UpdateAsset,
};
use assetdesk_core::repository::{AssetRepository, PaginatedResult, Pagination};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value, json};
use surrealdb::Connection;
use surrealdb_types::SurrealValue;
use tracing::info;
use uuid::Uuid;

use super::{
    CountRow, date_string, ensure_in_tenant, parse_date, parse_opt_uuid, parse_uuid,
    retry_on_conflict, total_of,
};
use crate::error::DbError;
use crate::store::Store;

const SELECT_ASSET: &str = "SELECT meta::id(id) AS record_id, * FROM asset";

const SELECT_ASSET_BY_ID: &str = "SELECT meta::id(id) AS record_id, * \
    FROM type::record('asset', $id) WHERE tenant_id = $tenant_id";

#[derive(Debug, SurrealValue)]
struct AssetRow {
    record_id: String,
    tenant_id: String,
    name: String,
    asset_type: String,
    status: String,
    category: Option<String>,
    manufacturer: Option<String>,
    model: Option<String>,
    serial_number: Option<String>,
    assigned_user_id: Option<String>,
    assigned_user_name: Option<String>,
    location: Option<String>,
    vendor: Option<String>,
    company: Option<String>,
    purchase_date: Option<String>,
    purchase_cost: Option<f64>,
    warranty_expiry: Option<String>,
    amc_expiry: Option<String>,
    software_version: Option<String>,
    license_key: Option<String>,
    renewal_date: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AssetRow {
    fn try_into_asset(self) -> Result<Asset, DbError> {
        let asset_type = AssetType::parse(&self.asset_type)
            .ok_or_else(|| DbError::Decode(format!("unknown asset type: {}", self.asset_type)))?;
        let status = AssetStatus::parse(&self.status)
            .ok_or_else(|| DbError::Decode(format!("unknown asset status: {}", self.status)))?;
        Ok(Asset {
            id: parse_uuid(&self.record_id, "asset")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            name: self.name,
            asset_type,
            status,
            category: self.category,
            manufacturer: self.manufacturer,
            model: self.model,
            serial_number: self.serial_number,
            assigned_user_id: parse_opt_uuid(self.assigned_user_id, "user")?,
            assigned_user_name: self.assigned_user_name,
            location: self.location,
            vendor: self.vendor,
            company: self.company,
            purchase_date: parse_date(self.purchase_date, "purchase")?,
            purchase_cost: self.purchase_cost,
            warranty_expiry: parse_date(self.warranty_expiry, "warranty")?,
            amc_expiry: parse_date(self.amc_expiry, "amc")?,
            software_version: self.software_version,
            license_key: self.license_key,
            renewal_date: parse_date(self.renewal_date, "renewal")?,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct AssetCountRow {
    asset_type: String,
    status: String,
    total: u64,
}

/// Record content for a new asset. Absent optional fields are left out
/// entirely so the store keeps them as NONE.
fn asset_content(tenant_id: Uuid, input: &CreateAsset) -> Value {
    let mut map = Map::new();
    map.insert("tenant_id".into(), json!(tenant_id.to_string()));
    map.insert("name".into(), json!(input.name.trim()));
    map.insert("asset_type".into(), json!(input.asset_type.as_str()));
    map.insert("status".into(), json!(input.status.as_str()));

    let text = [
        ("category", &input.category),
        ("manufacturer", &input.manufacturer),
        ("model", &input.model),
        ("serial_number", &input.serial_number),
        ("assigned_user_name", &input.assigned_user_name),
        ("location", &input.location),
        ("vendor", &input.vendor),
        ("company", &input.company),
        ("software_version", &input.software_version),
        ("license_key", &input.license_key),
        ("notes", &input.notes),
    ];
    for (key, value) in text {
        if let Some(v) = value {
            map.insert(key.into(), json!(v));
        }
    }

    let dates = [
        ("purchase_date", input.purchase_date),
        ("warranty_expiry", input.warranty_expiry),
        ("amc_expiry", input.amc_expiry),
        ("renewal_date", input.renewal_date),
    ];
    for (key, value) in dates {
        if let Some(d) = value {
            map.insert(key.into(), json!(date_string(d)));
        }
    }

    if let Some(uid) = input.assigned_user_id {
        map.insert("assigned_user_id".into(), json!(uid.to_string()));
    }
    if let Some(cost) = input.purchase_cost.and_then(serde_json::Number::from_f64) {
        map.insert("purchase_cost".into(), Value::Number(cost));
    }
    Value::Object(map)
}

/// WHERE clause and bindings for a listing filter.
fn filter_clause(filter: &AssetFilter) -> (String, Vec<(&'static str, String)>) {
    let mut clause = String::from("tenant_id = $tenant_id");
    let mut binds = Vec::new();
    if let Some(t) = filter.asset_type {
        clause.push_str(" AND asset_type = $asset_type");
        binds.push(("asset_type", t.as_str().to_string()));
    }
    if let Some(s) = filter.status {
        clause.push_str(" AND status = $status");
        binds.push(("status", s.as_str().to_string()));
    }
    if let Some(c) = &filter.category {
        clause.push_str(" AND category = $category");
        binds.push(("category", c.clone()));
    }
    if let Some(q) = filter.search.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        clause.push_str(
            " AND (string::contains(string::lowercase(name), $search) \
             OR string::contains(string::lowercase(serial_number ?? ''), $search) \
             OR string::contains(string::lowercase(model ?? ''), $search) \
             OR string::contains(string::lowercase(assigned_user_name ?? ''), $search))",
        );
        binds.push(("search", q.to_lowercase()));
    }
    (clause, binds)
}

fn first_asset(rows: Vec<AssetRow>, id: String) -> Result<Asset, DbError> {
    rows.into_iter()
        .next()
        .ok_or(DbError::NotFound {
            entity: "asset".into(),
            id,
        })?
        .try_into_asset()
}

/// SurrealDB implementation of the Asset repository.
#[derive(Clone)]
pub struct SurrealAssetRepository<C: Connection> {
    store: Store<C>,
}

impl<C: Connection> SurrealAssetRepository<C> {
    pub fn new(store: Store<C>) -> Self {
        Self { store }
    }

    /// Every referenced assignee must be a user of this tenant.
    async fn ensure_assignees(&self, tenant_id: Uuid, ids: BTreeSet<Uuid>) -> Result<(), DbError> {
        if ids.is_empty() {
            return Ok(());
        }
        let wanted: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        let mut result = self
            .store
            .client()
            .query(
                "SELECT VALUE meta::id(id) FROM user \
                 WHERE tenant_id = $tenant_id AND meta::id(id) IN $ids",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("ids", json!(wanted)))
            .await?;
        let found: Vec<String> = result.take(0)?;
        match wanted.into_iter().find(|id| !found.contains(id)) {
            Some(missing) => Err(DbError::NotFound {
                entity: "user".into(),
                id: missing,
            }),
            None => Ok(()),
        }
    }
}

impl<C: Connection> AssetRepository for SurrealAssetRepository<C> {
    async fn create(&self, scope: TenantScope, input: CreateAsset) -> RegistryResult<Asset> {
        let _permit = self.store.acquire().await?;
        let tenant_id = scope.tenant_id();
        if let Some(uid) = input.assigned_user_id {
            ensure_in_tenant(self.store.client(), "user", uid, tenant_id).await?;
        }

        let id_str = Uuid::new_v4().to_string();
        let query = format!(
            "CREATE type::record('asset', $id) CONTENT $content; \
             {SELECT_ASSET_BY_ID};"
        );
        let result = self
            .store
            .client()
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("content", asset_content(tenant_id, &input)))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<AssetRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_asset(rows, id_str)?)
    }

    async fn get_by_id(&self, scope: TenantScope, id: Uuid) -> RegistryResult<Asset> {
        let _permit = self.store.acquire().await?;
        let id_str = id.to_string();
        let mut result = self
            .store
            .client()
            .query(SELECT_ASSET_BY_ID)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", scope.tenant_id().to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AssetRow> = result.take(0).map_err(DbError::from)?;
        Ok(first_asset(rows, id_str)?)
    }

    async fn list(
        &self,
        scope: TenantScope,
        filter: AssetFilter,
        pagination: Pagination,
    ) -> RegistryResult<PaginatedResult<Asset>> {
        let _permit = self.store.acquire().await?;
        let (clause, binds) = filter_clause(&filter);
        let query = format!(
            "SELECT count() AS total FROM asset WHERE {clause} GROUP ALL; \
             {SELECT_ASSET} WHERE {clause} \
             ORDER BY created_at DESC LIMIT $limit START $offset;"
        );

        let mut builder = self
            .store
            .client()
            .query(&query)
            .bind(("tenant_id", scope.tenant_id().to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        for bind in binds {
            builder = builder.bind(bind);
        }
        let mut result = builder.await.map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<AssetRow> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(AssetRow::try_into_asset)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: total_of(&count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_all(&self, scope: TenantScope) -> RegistryResult<Vec<Asset>> {
        let _permit = self.store.acquire().await?;
        let query = format!("{SELECT_ASSET} WHERE tenant_id = $tenant_id ORDER BY created_at ASC");
        let mut result = self
            .store
            .client()
            .query(&query)
            .bind(("tenant_id", scope.tenant_id().to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AssetRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(AssetRow::try_into_asset)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn update(
        &self,
        scope: TenantScope,
        id: Uuid,
        input: UpdateAsset,
    ) -> RegistryResult<Asset> {
        let _permit = self.store.acquire().await?;
        let tenant_id = scope.tenant_id();
        let id_str = id.to_string();
        if let Some(Some(uid)) = input.assigned_user_id {
            ensure_in_tenant(self.store.client(), "user", uid, tenant_id).await?;
        }

        let mut sets: Vec<String> = Vec::new();
        let mut binds: Vec<(&'static str, Value)> = Vec::new();
        let mut set = |field: &'static str, value: Option<Option<Value>>| match value {
            Some(Some(v)) => {
                sets.push(format!("{field} = ${field}"));
                binds.push((field, v));
            }
            Some(None) => sets.push(format!("{field} = NONE")),
            None => {}
        };

        let text = |v: Option<Option<String>>| v.map(|v| v.map(|s| json!(s)));
        let date = |v: Option<Option<NaiveDate>>| v.map(|v| v.map(|d| json!(date_string(d))));

        set("name", input.name.map(|n| Some(json!(n.trim()))));
        set("asset_type", input.asset_type.map(|t| Some(json!(t.as_str()))));
        set("status", input.status.map(|s| Some(json!(s.as_str()))));
        set("category", text(input.category));
        set("manufacturer", text(input.manufacturer));
        set("model", text(input.model));
        set("serial_number", text(input.serial_number));
        set(
            "assigned_user_id",
            input.assigned_user_id.map(|v| v.map(|u| json!(u.to_string()))),
        );
        set("assigned_user_name", text(input.assigned_user_name));
        set("location", text(input.location));
        set("vendor", text(input.vendor));
        set("company", text(input.company));
        set("purchase_date", date(input.purchase_date));
        set(
            "purchase_cost",
            input
                .purchase_cost
                .map(|v| v.and_then(serde_json::Number::from_f64).map(Value::Number)),
        );
        set("warranty_expiry", date(input.warranty_expiry));
        set("amc_expiry", date(input.amc_expiry));
        set("software_version", text(input.software_version));
        set("license_key", text(input.license_key));
        set("renewal_date", date(input.renewal_date));
        set("notes", text(input.notes));
        sets.push("updated_at = time::now()".into());

        let query = format!(
            "UPDATE type::record('asset', $id) SET {} WHERE tenant_id = $tenant_id; \
             {SELECT_ASSET_BY_ID};",
            sets.join(", ")
        );
        let mut builder = self
            .store
            .client()
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", tenant_id.to_string()));
        for bind in binds {
            builder = builder.bind(bind);
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;
        let rows: Vec<AssetRow> = result.take(1).map_err(DbError::from)?;
        Ok(first_asset(rows, id_str)?)
    }

    async fn delete(&self, scope: TenantScope, id: Uuid) -> RegistryResult<()> {
        let _permit = self.store.acquire().await?;
        let mut result = self
            .store
            .client()
            .query(
                "DELETE type::record('asset', $id) \
                 WHERE tenant_id = $tenant_id RETURN BEFORE",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", scope.tenant_id().to_string()))
            .await
            .map_err(DbError::from)?;

        let deleted: Vec<surrealdb_types::Value> = result.take(0).map_err(DbError::from)?;
        if deleted.is_empty() {
            return Err(DbError::NotFound {
                entity: "asset".into(),
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn create_bulk(
        &self,
        scope: TenantScope,
        rows: Vec<CreateAsset>,
    ) -> RegistryResult<Vec<Asset>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let _permit = self.store.acquire().await?;
        let tenant_id = scope.tenant_id();
        self.ensure_assignees(
            tenant_id,
            rows.iter().filter_map(|r| r.assigned_user_id).collect(),
        )
        .await?;

        let ids: Vec<String> = rows.iter().map(|_| Uuid::new_v4().to_string()).collect();
        let payload: Vec<Value> = ids
            .iter()
            .zip(&rows)
            .map(|(id, row)| json!({ "id": id, "content": asset_content(tenant_id, row) }))
            .collect();
        let payload = Value::Array(payload);

        retry_on_conflict("asset.create_bulk", || async {
            self.store
                .client()
                .query(
                    "BEGIN TRANSACTION; \
                     FOR $row IN $rows { \
                         CREATE type::record('asset', $row.id) CONTENT $row.content; \
                     }; \
                     COMMIT TRANSACTION;",
                )
                .bind(("rows", payload.clone()))
                .await?
                .check()?;
            Ok(())
        })
        .await?;

        let query = format!(
            "{SELECT_ASSET} WHERE tenant_id = $tenant_id AND meta::id(id) IN $ids"
        );
        let mut result = self
            .store
            .client()
            .query(&query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("ids", json!(ids)))
            .await
            .map_err(DbError::from)?;
        let stored: Vec<AssetRow> = result.take(0).map_err(DbError::from)?;

        let position: HashMap<&str, usize> =
            ids.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();
        let mut inserted = stored
            .into_iter()
            .map(AssetRow::try_into_asset)
            .collect::<Result<Vec<_>, DbError>>()?;
        inserted.sort_by_key(|a| position.get(a.id.to_string().as_str()).copied());

        info!(tenant_id = %tenant_id, inserted = inserted.len(), "bulk asset insert committed");
        Ok(inserted)
    }

    async fn count_by_type_and_status(&self, scope: TenantScope) -> RegistryResult<Vec<AssetCount>> {
        let _permit = self.store.acquire().await?;
        let mut result = self
            .store
            .client()
            .query(
                "SELECT asset_type, status, count() AS total FROM asset \
                 WHERE tenant_id = $tenant_id GROUP BY asset_type, status",
            )
            .bind(("tenant_id", scope.tenant_id().to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AssetCountRow> = result.take(0).map_err(DbError::from)?;
        let mut counts = rows
            .into_iter()
            .map(|row| {
                Ok(AssetCount {
                    asset_type: AssetType::parse(&row.asset_type).ok_or_else(|| {
                        DbError::Decode(format!("unknown asset type: {}", row.asset_type))
                    })?,
                    status: AssetStatus::parse(&row.status).ok_or_else(|| {
                        DbError::Decode(format!("unknown asset status: {}", row.status))
                    })?,
                    total: row.total,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;
        counts.sort_by_key(|c| (c.asset_type, c.status));
        Ok(counts)
    }
}
