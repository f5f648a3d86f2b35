//! Account orchestration: tenant sign-up, user management, invitations
//! and sign-in, each audited.

use std::sync::Arc;

use assetdesk_core::error::{FieldIssue, RegistryError, RegistryResult};
use assetdesk_core::models::admin_lock::FirstAdminOutcome;
use assetdesk_core::models::audit::AuditOutcome;
use assetdesk_core::models::invitation::{AcceptInvitation, CreateInvitation, Invitation};
use assetdesk_core::models::tenant::{CreateTenant, Tenant};
use assetdesk_core::models::user::{CreateUser, Role, User};
use assetdesk_core::repository::{
    AdminLockRepository, AuditLogRepository, InvitationRepository, TenantRepository,
    UserRepository,
};
use assetdesk_core::{Clock, TenantScope};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditContext, AuditEvent, AuditLogger};
use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::password;

/// Sign-up for a new (or not yet claimed) organization.
#[derive(Debug, Clone)]
pub struct RegisterTenant {
    pub tenant_name: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub enum Registration {
    /// The caller became the tenant's super-admin.
    Created { tenant: Tenant, admin: User },
    /// The tenant already has its first administrator; the caller should
    /// ask them for an invitation.
    AlreadyExists { tenant: Tenant },
}

/// A user created directly by an administrator.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: Role,
}

/// Profile supplied by an invitee.
#[derive(Debug, Clone)]
pub struct InviteeProfile {
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SignIn {
    pub tenant_name: String,
    pub email: String,
    pub password: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

fn require(issues: &mut Vec<FieldIssue>, field: &str, value: &str) {
    if value.trim().is_empty() {
        issues.push(FieldIssue::missing(field));
    }
}

fn check(issues: Vec<FieldIssue>) -> RegistryResult<()> {
    if issues.is_empty() {
        Ok(())
    } else {
        Err(RegistryError::Validation { issues })
    }
}

/// Enforce the assignable-role table for `actor` handing out `target`.
pub fn ensure_assignable(actor: Role, target: Role) -> Result<(), ServiceError> {
    if actor.can_assign(target) {
        Ok(())
    } else {
        Err(ServiceError::RoleNotAssignable { actor, target })
    }
}

/// `actor` may only manage accounts whose current role it could assign.
fn ensure_manageable(actor: &User, target: &User) -> Result<(), ServiceError> {
    if actor.id == target.id {
        return Err(ServiceError::SelfManagement);
    }
    if !actor.role.can_assign(target.role) {
        return Err(ServiceError::TargetOutranksActor {
            actor: actor.role,
            target: target.role,
        });
    }
    Ok(())
}

/// Account flows over the tenant, user, lock, invitation and audit stores.
pub struct AccountService<T, U, L, I, A>
where
    T: TenantRepository,
    U: UserRepository,
    L: AdminLockRepository,
    I: InvitationRepository,
    A: AuditLogRepository,
{
    tenants: T,
    users: U,
    locks: L,
    invitations: I,
    audit: AuditLogger<A>,
    config: ServiceConfig,
    clock: Arc<dyn Clock>,
}

impl<T, U, L, I, A> AccountService<T, U, L, I, A>
where
    T: TenantRepository,
    U: UserRepository,
    L: AdminLockRepository,
    I: InvitationRepository,
    A: AuditLogRepository,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenants: T,
        users: U,
        locks: L,
        invitations: I,
        audit: AuditLogger<A>,
        config: ServiceConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tenants,
            users,
            locks,
            invitations,
            audit,
            config,
            clock,
        }
    }

    fn hash(&self, password: &str) -> Result<String, ServiceError> {
        password::hash_password(password, self.config.pepper.as_deref())
    }

    /// Find the tenant by name or create it. Losing a creation race to
    /// another sign-up falls back to the winner's row.
    async fn find_or_create_tenant(&self, name: &str) -> RegistryResult<Tenant> {
        match self.tenants.get_by_name(name).await {
            Ok(tenant) => return Ok(tenant),
            Err(RegistryError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }
        let created = self
            .tenants
            .create(CreateTenant {
                name: name.to_string(),
                settings: None,
            })
            .await;
        match created {
            Ok(tenant) => {
                info!(tenant_id = %tenant.id, "tenant created");
                Ok(tenant)
            }
            Err(RegistryError::UniqueConflict { .. }) => self.tenants.get_by_name(name).await,
            Err(e) => Err(e),
        }
    }

    /// Sign up a tenant and, if nobody got there first, its super-admin.
    pub async fn register_tenant(&self, input: RegisterTenant) -> RegistryResult<Registration> {
        let mut issues = Vec::new();
        require(&mut issues, "tenant_name", &input.tenant_name);
        require(&mut issues, "email", &input.email);
        require(&mut issues, "first_name", &input.first_name);
        require(&mut issues, "password", &input.password);
        check(issues)?;

        let tenant = self.find_or_create_tenant(input.tenant_name.trim()).await?;
        let scope = TenantScope::new(tenant.id);
        let password_hash = self.hash(&input.password)?;

        let outcome = self
            .locks
            .claim_first_admin(
                scope,
                CreateUser {
                    email: input.email.clone(),
                    first_name: input.first_name,
                    last_name: input.last_name,
                    password_hash,
                    role: Role::SuperAdmin,
                },
            )
            .await?;

        match outcome {
            FirstAdminOutcome::Created(admin) => {
                self.audit
                    .record(
                        &AuditContext::user(&admin),
                        AuditEvent::new("tenant.register", "tenant")
                            .resource(tenant.id)
                            .after(&json!({ "tenant": tenant.name, "admin_user_id": admin.id })),
                    )
                    .await;
                Ok(Registration::Created { tenant, admin })
            }
            FirstAdminOutcome::AlreadyExists => {
                info!(tenant_id = %tenant.id, "tenant already has an administrator");
                self.audit
                    .record(
                        &AuditContext::auth_attempt(Some(scope), Some(input.email)),
                        AuditEvent::new("tenant.register", "tenant")
                            .resource(tenant.id)
                            .outcome(AuditOutcome::Denied),
                    )
                    .await;
                Ok(Registration::AlreadyExists { tenant })
            }
        }
    }

    pub async fn create_user(&self, actor: &User, input: NewUser) -> RegistryResult<User> {
        ensure_assignable(actor.role, input.role)?;
        let mut issues = Vec::new();
        require(&mut issues, "email", &input.email);
        require(&mut issues, "first_name", &input.first_name);
        require(&mut issues, "password", &input.password);
        check(issues)?;

        let user = self
            .users
            .create(
                TenantScope::new(actor.tenant_id),
                CreateUser {
                    email: input.email,
                    first_name: input.first_name,
                    last_name: input.last_name,
                    password_hash: self.hash(&input.password)?,
                    role: input.role,
                },
            )
            .await?;

        self.audit
            .record(
                &AuditContext::user(actor),
                AuditEvent::new("user.create", "user")
                    .resource(user.id)
                    .after(&user),
            )
            .await;
        Ok(user)
    }

    pub async fn update_role(&self, actor: &User, user_id: Uuid, role: Role) -> RegistryResult<User> {
        let scope = TenantScope::new(actor.tenant_id);
        if let Err(e) = ensure_assignable(actor.role, role) {
            self.record_denied(actor, "user.role_change", user_id).await;
            return Err(e.into());
        }
        let target = self.users.get_by_id(scope, user_id).await?;
        if let Err(e) = ensure_manageable(actor, &target) {
            self.record_denied(actor, "user.role_change", user_id).await;
            return Err(e.into());
        }

        let updated = self.users.update_role(scope, user_id, role).await?;
        self.audit
            .record(
                &AuditContext::user(actor),
                AuditEvent::new("user.role_change", "user")
                    .resource(user_id)
                    .before(&json!({ "role": target.role }))
                    .after(&json!({ "role": updated.role })),
            )
            .await;
        Ok(updated)
    }

    /// Activate or deactivate another account.
    pub async fn set_active(&self, actor: &User, user_id: Uuid, active: bool) -> RegistryResult<User> {
        let scope = TenantScope::new(actor.tenant_id);
        let action = if active { "user.activate" } else { "user.deactivate" };
        let target = self.users.get_by_id(scope, user_id).await?;
        if let Err(e) = ensure_manageable(actor, &target) {
            self.record_denied(actor, action, user_id).await;
            return Err(e.into());
        }

        let updated = self.users.set_active(scope, user_id, active).await?;
        self.audit
            .record(
                &AuditContext::user(actor),
                AuditEvent::new(action, "user")
                    .resource(user_id)
                    .before(&json!({ "is_active": target.is_active }))
                    .after(&json!({ "is_active": updated.is_active })),
            )
            .await;
        Ok(updated)
    }

    /// Invite `email` with `role`. Returns the invitation and the raw
    /// token to deliver to the invitee.
    pub async fn invite(
        &self,
        actor: &User,
        email: &str,
        role: Role,
    ) -> RegistryResult<(Invitation, String)> {
        ensure_assignable(actor.role, role)?;
        let mut issues = Vec::new();
        require(&mut issues, "email", email);
        check(issues)?;

        let (invitation, token) = self
            .invitations
            .create(
                TenantScope::new(actor.tenant_id),
                CreateInvitation {
                    email: email.to_string(),
                    role,
                    invited_by: Some(actor.id),
                    expires_at: self.clock.now() + self.config.invitation_lifetime,
                },
            )
            .await?;

        self.audit
            .record(
                &AuditContext::user(actor),
                AuditEvent::new("invitation.create", "invitation")
                    .resource(invitation.id)
                    .after(&invitation),
            )
            .await;
        Ok((invitation, token))
    }

    /// Redeem an invitation token. Unknown or used tokens are `NotFound`;
    /// expired ones fail validation and are marked expired.
    pub async fn accept_invitation(
        &self,
        token: &str,
        profile: InviteeProfile,
    ) -> RegistryResult<(User, Invitation)> {
        let mut issues = Vec::new();
        require(&mut issues, "first_name", &profile.first_name);
        require(&mut issues, "password", &profile.password);
        check(issues)?;

        let (user, invitation) = self
            .invitations
            .accept(
                token,
                AcceptInvitation {
                    first_name: profile.first_name,
                    last_name: profile.last_name,
                    password_hash: self.hash(&profile.password)?,
                },
                self.clock.now(),
            )
            .await?;

        self.audit
            .record(
                &AuditContext::user(&user),
                AuditEvent::new("invitation.accept", "invitation")
                    .resource(invitation.id)
                    .after(&user),
            )
            .await;
        Ok((user, invitation))
    }

    /// Check a password sign-in. Every failure is audited under the
    /// attempted email and reported as the same generic error.
    pub async fn authenticate(&self, input: SignIn) -> RegistryResult<User> {
        let tenant = match self.tenants.get_by_name(&input.tenant_name).await {
            Ok(tenant) => TenantScope::new(tenant.id),
            Err(RegistryError::NotFound { .. }) => {
                self.record_failed_sign_in(None, &input, "unknown tenant")
                    .await;
                return Err(ServiceError::InvalidCredentials.into());
            }
            Err(e) => return Err(e),
        };

        let user = match self.users.get_by_email(tenant, &input.email).await {
            Ok(user) => user,
            Err(RegistryError::NotFound { .. }) => {
                self.record_failed_sign_in(Some(tenant), &input, "unknown user")
                    .await;
                return Err(ServiceError::InvalidCredentials.into());
            }
            Err(e) => return Err(e),
        };

        let matches = password::verify_password(
            &input.password,
            &user.password_hash,
            self.config.pepper.as_deref(),
        )?;
        if !matches {
            warn!(tenant_id = %tenant, user_id = %user.id, "failed sign-in");
            self.record_failed_sign_in(Some(tenant), &input, "wrong password")
                .await;
            return Err(ServiceError::InvalidCredentials.into());
        }
        if !user.is_active {
            self.record_failed_sign_in(Some(tenant), &input, "inactive account")
                .await;
            return Err(ServiceError::AccountInactive.into());
        }

        self.audit
            .record(
                &AuditContext::user(&user).with_request(input.ip_address, input.user_agent),
                AuditEvent::new("auth.login", "session").resource(user.id),
            )
            .await;
        Ok(user)
    }

    async fn record_failed_sign_in(
        &self,
        tenant: Option<TenantScope>,
        input: &SignIn,
        reason: &str,
    ) {
        let ctx = AuditContext::auth_attempt(tenant, Some(input.email.clone()))
            .with_request(input.ip_address.clone(), input.user_agent.clone());
        self.audit
            .record(
                &ctx,
                AuditEvent::new("auth.login", "session")
                    .outcome(AuditOutcome::Failure)
                    .after(&json!({ "reason": reason })),
            )
            .await;
    }

    async fn record_denied(&self, actor: &User, action: &str, user_id: Uuid) {
        self.audit
            .record(
                &AuditContext::user(actor),
                AuditEvent::new(action, "user")
                    .resource(user_id)
                    .outcome(AuditOutcome::Denied),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_cannot_hand_out_super_admin() {
        assert!(matches!(
            ensure_assignable(Role::Admin, Role::SuperAdmin),
            Err(ServiceError::RoleNotAssignable { .. })
        ));
        assert!(ensure_assignable(Role::Admin, Role::ItManager).is_ok());
        assert!(ensure_assignable(Role::Admin, Role::Technician).is_ok());
    }

    #[test]
    fn technician_assigns_nothing() {
        for role in Role::ALL {
            assert!(ensure_assignable(Role::Technician, role).is_err());
        }
    }

    #[test]
    fn blank_fields_are_reported_together() {
        let mut issues = Vec::new();
        require(&mut issues, "email", " ");
        require(&mut issues, "first_name", "Ana");
        require(&mut issues, "password", "");
        let err = check(issues).unwrap_err();
        match err {
            RegistryError::Validation { issues } => {
                let fields: Vec<_> = issues.iter().map(|i| i.field.as_str()).collect();
                assert_eq!(fields, vec!["email", "password"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
