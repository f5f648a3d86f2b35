//! Audited organization settings, master data and user preferences.

use assetdesk_core::TenantScope;
use assetdesk_core::error::RegistryResult;
use assetdesk_core::models::audit::AuditOutcome;
use assetdesk_core::models::master_data::{MasterDataEntry, MasterDataKind};
use assetdesk_core::models::preference::UserPreferences;
use assetdesk_core::models::tenant::{Tenant, TenantSettings, UpdateTenant};
use assetdesk_core::models::user::{Role, User};
use assetdesk_core::repository::{
    AuditLogRepository, MasterDataRepository, PreferenceRepository, TenantRepository,
};
use serde_json::Value;

use crate::audit::{AuditContext, AuditEvent, AuditLogger};
use crate::error::ServiceError;

/// Lowest role allowed to change organization settings.
const SETTINGS_ROLE: Role = Role::Admin;

pub struct WorkspaceService<N, M, P, A>
where
    N: TenantRepository,
    M: MasterDataRepository,
    P: PreferenceRepository,
    A: AuditLogRepository,
{
    tenants: N,
    master_data: M,
    preferences: P,
    audit: AuditLogger<A>,
}

impl<N, M, P, A> WorkspaceService<N, M, P, A>
where
    N: TenantRepository,
    M: MasterDataRepository,
    P: PreferenceRepository,
    A: AuditLogRepository,
{
    pub fn new(tenants: N, master_data: M, preferences: P, audit: AuditLogger<A>) -> Self {
        Self {
            tenants,
            master_data,
            preferences,
            audit,
        }
    }

    /// Replace the actor's organization settings. Admins and above only.
    pub async fn update_settings(
        &self,
        actor: &User,
        settings: TenantSettings,
    ) -> RegistryResult<Tenant> {
        if actor.role < SETTINGS_ROLE {
            self.audit
                .record(
                    &AuditContext::user(actor),
                    AuditEvent::new("tenant.settings_update", "tenant")
                        .resource(actor.tenant_id)
                        .outcome(AuditOutcome::Denied),
                )
                .await;
            return Err(ServiceError::RoleTooLow {
                actor: actor.role,
                required: SETTINGS_ROLE,
            }
            .into());
        }

        let before = self.tenants.get_by_id(actor.tenant_id).await?;
        let after = self
            .tenants
            .update(
                actor.tenant_id,
                UpdateTenant {
                    name: None,
                    settings: Some(settings),
                },
            )
            .await?;
        self.audit
            .record(
                &AuditContext::user(actor),
                AuditEvent::new("tenant.settings_update", "tenant")
                    .resource(actor.tenant_id)
                    .before(&before.settings)
                    .after(&after.settings),
            )
            .await;
        Ok(after)
    }

    pub async fn add_master_data(
        &self,
        actor: &User,
        kind: MasterDataKind,
        value: &str,
    ) -> RegistryResult<MasterDataEntry> {
        let entry = self
            .master_data
            .add(TenantScope::new(actor.tenant_id), kind, value)
            .await?;
        self.audit
            .record(
                &AuditContext::user(actor),
                AuditEvent::new("master_data.add", "master_data")
                    .resource(entry.id)
                    .after(&entry),
            )
            .await;
        Ok(entry)
    }

    /// Save the actor's own preferences, replacing what was there.
    pub async fn save_preferences(
        &self,
        actor: &User,
        preferences: Value,
    ) -> RegistryResult<UserPreferences> {
        let scope = TenantScope::new(actor.tenant_id);
        let before = self.preferences.get(scope, actor.id).await?;
        let after = self.preferences.upsert(scope, actor.id, preferences).await?;
        self.audit
            .record(
                &AuditContext::user(actor),
                AuditEvent::new("preference.update", "user_preference")
                    .resource(actor.id)
                    .before(&before.preferences)
                    .after(&after.preferences),
            )
            .await;
        Ok(after)
    }
}
