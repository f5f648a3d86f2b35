//! Best-effort audit trail with secret redaction.
//!
//! [`AuditLogger::record`] never fails the caller. A store error is
//! reported through `tracing::error!` and dropped; the business operation
//! being described has already happened and must not be rolled back
//! because its log line could not be written.

use assetdesk_core::TenantScope;
use assetdesk_core::error::RegistryResult;
use assetdesk_core::models::audit::{
    ActorSnapshot, AuditLogEntry, AuditOutcome, CreateAuditLogEntry,
};
use assetdesk_core::models::user::User;
use assetdesk_core::repository::{AuditLogFilter, AuditLogRepository, PaginatedResult, Pagination};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

/// Replacement for any value stored under a sensitive key.
pub const REDACTED: &str = "[REDACTED]";

/// Key fragments (lowercase) whose values never reach the audit log.
const SENSITIVE_KEY_FRAGMENTS: [&str; 5] = ["password", "token", "secret", "key", "authorization"];

fn is_sensitive(key: &str) -> bool {
    let key = key.to_lowercase();
    SENSITIVE_KEY_FRAGMENTS
        .iter()
        .any(|fragment| key.contains(fragment))
}

/// Return a copy of `value` with every sensitive key masked, at any depth.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let v = if is_sensitive(k) {
                        Value::String(REDACTED.into())
                    } else {
                        redact(v)
                    };
                    (k.clone(), v)
                })
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

/// Who is acting and where the request came from.
#[derive(Debug, Clone)]
pub struct AuditContext {
    /// `None` for sign-in attempts that never resolved a tenant.
    pub tenant: Option<TenantScope>,
    pub actor: ActorSnapshot,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditContext {
    pub fn user(user: &User) -> Self {
        Self {
            tenant: Some(TenantScope::new(user.tenant_id)),
            actor: ActorSnapshot::user(user.id, user.email.clone(), user.role),
            ip_address: None,
            user_agent: None,
        }
    }

    /// Background jobs and maintenance commands.
    pub fn system(tenant: Option<TenantScope>) -> Self {
        Self {
            tenant,
            actor: ActorSnapshot::system(),
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn auth_attempt(tenant: Option<TenantScope>, email: Option<String>) -> Self {
        Self {
            tenant,
            actor: ActorSnapshot::auth_attempt(email),
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn with_request(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

/// One auditable action, built fluently.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub outcome: AuditOutcome,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl AuditEvent {
    pub fn new(action: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: None,
            outcome: AuditOutcome::Success,
            before: None,
            after: None,
        }
    }

    pub fn resource(mut self, id: impl ToString) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }

    pub fn outcome(mut self, outcome: AuditOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn before<T: Serialize>(mut self, state: &T) -> Self {
        self.before = snapshot(&self.action, state);
        self
    }

    pub fn after<T: Serialize>(mut self, state: &T) -> Self {
        self.after = snapshot(&self.action, state);
        self
    }
}

fn snapshot<T: Serialize>(action: &str, state: &T) -> Option<Value> {
    match serde_json::to_value(state) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(action, error = %e, "audit snapshot could not be serialized");
            None
        }
    }
}

/// Writes redacted audit entries and answers audit queries.
#[derive(Clone)]
pub struct AuditLogger<A: AuditLogRepository> {
    repo: A,
}

impl<A: AuditLogRepository> AuditLogger<A> {
    pub fn new(repo: A) -> Self {
        Self { repo }
    }

    /// Append an entry. Failures are logged and swallowed.
    pub async fn record(&self, ctx: &AuditContext, event: AuditEvent) {
        let entry = CreateAuditLogEntry {
            tenant_id: ctx.tenant.map(|t| t.tenant_id()),
            actor: ctx.actor.clone(),
            action: event.action,
            resource_type: event.resource_type,
            resource_id: event.resource_id,
            outcome: event.outcome,
            before_state: event.before.as_ref().map(redact),
            after_state: event.after.as_ref().map(redact),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
        };
        let action = entry.action.clone();
        let resource_type = entry.resource_type.clone();

        match self.repo.append(entry).await {
            Ok(stored) => debug!(audit_id = %stored.id, %action, "audit entry recorded"),
            Err(e) => error!(
                %action,
                %resource_type,
                tenant_id = ?ctx.tenant.map(|t| t.tenant_id()),
                error = %e,
                "failed to record audit entry"
            ),
        }
    }

    /// A tenant's entries, newest first.
    pub async fn query(
        &self,
        scope: TenantScope,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> RegistryResult<PaginatedResult<AuditLogEntry>> {
        self.repo.list(scope, filter, pagination).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use assetdesk_core::error::RegistryError;
    use assetdesk_core::models::audit::ActorType;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    #[derive(Clone, Default)]
    struct MemoryAudit {
        entries: Arc<Mutex<Vec<CreateAuditLogEntry>>>,
    }

    impl AuditLogRepository for MemoryAudit {
        fn append(
            &self,
            input: CreateAuditLogEntry,
        ) -> impl Future<Output = RegistryResult<AuditLogEntry>> + Send {
            self.entries.lock().unwrap().push(input.clone());
            async move {
                Ok(AuditLogEntry {
                    id: Uuid::new_v4(),
                    tenant_id: input.tenant_id,
                    actor: input.actor,
                    action: input.action,
                    resource_type: input.resource_type,
                    resource_id: input.resource_id,
                    outcome: input.outcome,
                    before_state: input.before_state,
                    after_state: input.after_state,
                    ip_address: input.ip_address,
                    user_agent: input.user_agent,
                    timestamp: chrono::Utc::now(),
                })
            }
        }

        fn list(
            &self,
            _scope: TenantScope,
            _filter: AuditLogFilter,
            _pagination: Pagination,
        ) -> impl Future<Output = RegistryResult<PaginatedResult<AuditLogEntry>>> + Send {
            async { Err(RegistryError::Internal("not used".into())) }
        }
    }

    struct BrokenAudit;

    impl AuditLogRepository for BrokenAudit {
        fn append(
            &self,
            _input: CreateAuditLogEntry,
        ) -> impl Future<Output = RegistryResult<AuditLogEntry>> + Send {
            async { Err(RegistryError::DependencyUnavailable("store down".into())) }
        }

        fn list(
            &self,
            _scope: TenantScope,
            _filter: AuditLogFilter,
            _pagination: Pagination,
        ) -> impl Future<Output = RegistryResult<PaginatedResult<AuditLogEntry>>> + Send {
            async { Err(RegistryError::DependencyUnavailable("store down".into())) }
        }
    }

    #[test]
    fn nested_secrets_are_redacted() {
        let before = json!({ "password": "x", "nested": { "token": "y" }, "name": "ok" });
        assert_eq!(
            redact(&before),
            json!({ "password": REDACTED, "nested": { "token": REDACTED }, "name": "ok" })
        );
    }

    #[test]
    fn key_matching_ignores_case_and_reaches_into_arrays() {
        let value = json!({
            "Authorization": "Bearer abc",
            "items": [{ "License_Key": "AAAA-BBBB" }, { "label": "fine" }],
            "clientSecret": { "deep": "whole subtree" },
        });
        assert_eq!(
            redact(&value),
            json!({
                "Authorization": REDACTED,
                "items": [{ "License_Key": REDACTED }, { "label": "fine" }],
                "clientSecret": REDACTED,
            })
        );
    }

    #[test]
    fn scalars_pass_through() {
        assert_eq!(redact(&json!(42)), json!(42));
        assert_eq!(redact(&json!("password")), json!("password"));
    }

    #[tokio::test]
    async fn record_persists_redacted_snapshots() {
        let repo = MemoryAudit::default();
        let logger = AuditLogger::new(repo.clone());
        let scope = TenantScope::new(Uuid::new_v4());

        logger
            .record(
                &AuditContext::system(Some(scope)).with_request(Some("10.0.0.1".into()), None),
                AuditEvent::new("user.update", "user")
                    .resource("u-1")
                    .before(&json!({ "password": "x", "nested": { "token": "y" }, "name": "ok" })),
            )
            .await;

        let entries = repo.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.tenant_id, Some(scope.tenant_id()));
        assert_eq!(entry.actor.actor_type, ActorType::System);
        assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(
            entry.before_state,
            Some(json!({ "password": REDACTED, "nested": { "token": REDACTED }, "name": "ok" }))
        );
        assert!(entry.after_state.is_none());
    }

    #[tokio::test]
    async fn store_failure_is_swallowed() {
        let logger = AuditLogger::new(BrokenAudit);
        logger
            .record(
                &AuditContext::auth_attempt(None, Some("who@where.test".into())),
                AuditEvent::new("auth.login", "session").outcome(AuditOutcome::Failure),
            )
            .await;
    }
}
