//! SurrealDB implementation of [`AuditLogRepository`].
//!
//! The table only permits create and select; this repository exposes no
//! way to change an entry once written.

use assetdesk_core::TenantScope;
use assetdesk_core::error::RegistryResult;
use assetdesk_core::models::audit::{
    ActorSnapshot, ActorType, AuditLogEntry, AuditOutcome, CreateAuditLogEntry,
};
use assetdesk_core::models::user::Role;
use assetdesk_core::repository::{
    AuditLogFilter, AuditLogRepository, PaginatedResult, Pagination,
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use surrealdb::Connection;
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, parse_opt_uuid, parse_uuid, total_of};
use crate::error::DbError;
use crate::store::Store;

#[derive(Debug, SurrealValue)]
struct AuditLogRow {
    record_id: String,
    tenant_id: Option<String>,
    actor_type: String,
    actor_id: Option<String>,
    actor_email: Option<String>,
    actor_role: Option<String>,
    action: String,
    resource_type: String,
    resource_id: Option<String>,
    outcome: String,
    before_state: Option<Value>,
    after_state: Option<Value>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    timestamp: DateTime<Utc>,
}

impl AuditLogRow {
    fn try_into_entry(self) -> Result<AuditLogEntry, DbError> {
        let actor_type = ActorType::parse(&self.actor_type)
            .ok_or_else(|| DbError::Decode(format!("unknown actor type: {}", self.actor_type)))?;
        let outcome = AuditOutcome::parse(&self.outcome)
            .ok_or_else(|| DbError::Decode(format!("unknown outcome: {}", self.outcome)))?;
        Ok(AuditLogEntry {
            id: parse_uuid(&self.record_id, "audit_log")?,
            tenant_id: parse_opt_uuid(self.tenant_id, "tenant")?,
            actor: ActorSnapshot {
                actor_type,
                user_id: parse_opt_uuid(self.actor_id, "actor")?,
                email: self.actor_email,
                role: self.actor_role.as_deref().and_then(Role::normalize),
            },
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            outcome,
            before_state: self.before_state,
            after_state: self.after_state,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            timestamp: self.timestamp,
        })
    }
}

/// States are stored as objects; anything else is wrapped.
fn state_object(state: Value) -> Value {
    match state {
        Value::Object(_) => state,
        other => json!({ "value": other }),
    }
}

fn entry_content(input: CreateAuditLogEntry) -> Value {
    let mut map = Map::new();
    map.insert("actor_type".into(), json!(input.actor.actor_type.as_str()));
    map.insert("action".into(), json!(input.action));
    map.insert("resource_type".into(), json!(input.resource_type));
    map.insert("outcome".into(), json!(input.outcome.as_str()));

    let optional = [
        ("tenant_id", input.tenant_id.map(|id| json!(id.to_string()))),
        ("actor_id", input.actor.user_id.map(|id| json!(id.to_string()))),
        ("actor_email", input.actor.email.map(Value::String)),
        ("actor_role", input.actor.role.map(|r| json!(r.as_str()))),
        ("resource_id", input.resource_id.map(Value::String)),
        ("before_state", input.before_state.map(state_object)),
        ("after_state", input.after_state.map(state_object)),
        ("ip_address", input.ip_address.map(Value::String)),
        ("user_agent", input.user_agent.map(Value::String)),
    ];
    for (key, value) in optional {
        if let Some(v) = value {
            map.insert(key.into(), v);
        }
    }
    Value::Object(map)
}

/// SurrealDB implementation of the append-only audit log.
#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    store: Store<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(store: Store<C>) -> Self {
        Self { store }
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn append(&self, input: CreateAuditLogEntry) -> RegistryResult<AuditLogEntry> {
        let _permit = self.store.acquire().await?;
        let id_str = Uuid::new_v4().to_string();

        let result = self
            .store
            .client()
            .query(
                "CREATE type::record('audit_log', $id) CONTENT $entry; \
                 SELECT meta::id(id) AS record_id, * FROM type::record('audit_log', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("entry", entry_content(input)))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<AuditLogRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "audit_log".into(),
            id: id_str,
        })?;
        Ok(row.try_into_entry()?)
    }

    async fn list(
        &self,
        scope: TenantScope,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> RegistryResult<PaginatedResult<AuditLogEntry>> {
        let _permit = self.store.acquire().await?;

        let mut conditions = vec!["tenant_id = $tenant_id"];
        let mut binds: Vec<(&'static str, Value)> = Vec::new();
        if let Some(actor_id) = filter.actor_id {
            conditions.push("actor_id = $actor_id");
            binds.push(("actor_id", json!(actor_id.to_string())));
        }
        if let Some(action) = filter.action {
            conditions.push("action = $action");
            binds.push(("action", json!(action)));
        }
        if let Some(resource_type) = filter.resource_type {
            conditions.push("resource_type = $resource_type");
            binds.push(("resource_type", json!(resource_type)));
        }
        if let Some(resource_id) = filter.resource_id {
            conditions.push("resource_id = $resource_id");
            binds.push(("resource_id", json!(resource_id)));
        }
        if let Some(from) = filter.from {
            conditions.push("timestamp >= <datetime> $from");
            binds.push(("from", json!(from.to_rfc3339())));
        }
        if let Some(to) = filter.to {
            conditions.push("timestamp <= <datetime> $to");
            binds.push(("to", json!(to.to_rfc3339())));
        }
        let clause = conditions.join(" AND ");

        let query = format!(
            "SELECT count() AS total FROM audit_log WHERE {clause} GROUP ALL; \
             SELECT meta::id(id) AS record_id, * FROM audit_log WHERE {clause} \
             ORDER BY timestamp DESC LIMIT $limit START $offset;"
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
        let rows: Vec<AuditLogRow> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(AuditLogRow::try_into_entry)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: total_of(&count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_states_are_wrapped() {
        assert_eq!(state_object(json!(3)), json!({ "value": 3 }));
        assert_eq!(state_object(json!({ "a": 1 })), json!({ "a": 1 }));
    }

    #[test]
    fn system_actor_has_no_id_or_role() {
        let content = entry_content(CreateAuditLogEntry {
            tenant_id: None,
            actor: ActorSnapshot::system(),
            action: "admin_lock.backfill".into(),
            resource_type: "admin_lock".into(),
            resource_id: None,
            outcome: AuditOutcome::Success,
            before_state: None,
            after_state: Some(json!({ "created": 2 })),
            ip_address: None,
            user_agent: None,
        });
        let obj = content.as_object().unwrap();
        assert_eq!(obj["actor_type"], "System");
        assert_eq!(obj["actor_email"], "system");
        assert!(!obj.contains_key("actor_id"));
        assert!(!obj.contains_key("actor_role"));
        assert!(!obj.contains_key("tenant_id"));
    }
}
