//! Audited asset and license writes.

use assetdesk_core::TenantScope;
use assetdesk_core::error::RegistryResult;
use assetdesk_core::models::asset::{Asset, CreateAsset, UpdateAsset};
use assetdesk_core::models::license::{CreateLicense, SoftwareLicense, UpdateLicense};
use assetdesk_core::models::user::User;
use assetdesk_core::repository::{AssetRepository, AuditLogRepository, LicenseRepository};
use uuid::Uuid;

use crate::audit::{AuditContext, AuditEvent, AuditLogger};

/// Asset and license mutations within the actor's tenant. Each
/// successful write is recorded with its before and after state.
pub struct InventoryService<R, L, A>
where
    R: AssetRepository,
    L: LicenseRepository,
    A: AuditLogRepository,
{
    assets: R,
    licenses: L,
    audit: AuditLogger<A>,
}

impl<R, L, A> InventoryService<R, L, A>
where
    R: AssetRepository,
    L: LicenseRepository,
    A: AuditLogRepository,
{
    pub fn new(assets: R, licenses: L, audit: AuditLogger<A>) -> Self {
        Self {
            assets,
            licenses,
            audit,
        }
    }

    pub async fn create_asset(&self, actor: &User, input: CreateAsset) -> RegistryResult<Asset> {
        let asset = self
            .assets
            .create(TenantScope::new(actor.tenant_id), input)
            .await?;
        self.audit
            .record(
                &AuditContext::user(actor),
                AuditEvent::new("asset.create", "asset")
                    .resource(asset.id)
                    .after(&asset),
            )
            .await;
        Ok(asset)
    }

    pub async fn update_asset(
        &self,
        actor: &User,
        id: Uuid,
        input: UpdateAsset,
    ) -> RegistryResult<Asset> {
        let scope = TenantScope::new(actor.tenant_id);
        let before = self.assets.get_by_id(scope, id).await?;
        let after = self.assets.update(scope, id, input).await?;
        self.audit
            .record(
                &AuditContext::user(actor),
                AuditEvent::new("asset.update", "asset")
                    .resource(id)
                    .before(&before)
                    .after(&after),
            )
            .await;
        Ok(after)
    }

    pub async fn delete_asset(&self, actor: &User, id: Uuid) -> RegistryResult<()> {
        let scope = TenantScope::new(actor.tenant_id);
        let before = self.assets.get_by_id(scope, id).await?;
        self.assets.delete(scope, id).await?;
        self.audit
            .record(
                &AuditContext::user(actor),
                AuditEvent::new("asset.delete", "asset")
                    .resource(id)
                    .before(&before),
            )
            .await;
        Ok(())
    }

    pub async fn create_license(
        &self,
        actor: &User,
        input: CreateLicense,
    ) -> RegistryResult<SoftwareLicense> {
        let license = self
            .licenses
            .create(TenantScope::new(actor.tenant_id), input)
            .await?;
        self.audit
            .record(
                &AuditContext::user(actor),
                AuditEvent::new("license.create", "software_license")
                    .resource(license.id)
                    .after(&license),
            )
            .await;
        Ok(license)
    }

    pub async fn update_license(
        &self,
        actor: &User,
        id: Uuid,
        input: UpdateLicense,
    ) -> RegistryResult<SoftwareLicense> {
        let scope = TenantScope::new(actor.tenant_id);
        let before = self.licenses.get_by_id(scope, id).await?;
        let after = self.licenses.update(scope, id, input).await?;
        self.audit
            .record(
                &AuditContext::user(actor),
                AuditEvent::new("license.update", "software_license")
                    .resource(id)
                    .before(&before)
                    .after(&after),
            )
            .await;
        Ok(after)
    }

    pub async fn delete_license(&self, actor: &User, id: Uuid) -> RegistryResult<()> {
        let scope = TenantScope::new(actor.tenant_id);
        let before = self.licenses.get_by_id(scope, id).await?;
        self.licenses.delete(scope, id).await?;
        self.audit
            .record(
                &AuditContext::user(actor),
                AuditEvent::new("license.delete", "software_license")
                    .resource(id)
                    .before(&before),
            )
            .await;
        Ok(())
    }
}
