//! Account flows against in-memory SurrealDB.

use std::sync::Arc;

use assetdesk_core::error::RegistryError;
use assetdesk_core::models::audit::{ActorType, AuditOutcome};
use assetdesk_core::models::user::{Role, User};
use assetdesk_core::repository::{AuditLogFilter, AuditLogRepository, Pagination};
use assetdesk_core::{SystemClock, TenantScope};
use assetdesk_db::Store;
use assetdesk_db::repository::{
    SurrealAdminLockRepository, SurrealAuditLogRepository, SurrealInvitationRepository,
    SurrealTenantRepository, SurrealUserRepository,
};
use assetdesk_service::{
    AccountService, AuditLogger, InviteeProfile, NewUser, RegisterTenant, Registration,
    ServiceConfig, SignIn,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

type Accounts = AccountService<
    SurrealTenantRepository<Db>,
    SurrealUserRepository<Db>,
    SurrealAdminLockRepository<Db>,
    SurrealInvitationRepository<Db>,
    SurrealAuditLogRepository<Db>,
>;

async fn setup() -> (Store<Db>, Accounts) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    assetdesk_db::run_migrations(&db).await.unwrap();
    let store = Store::new(db);

    let accounts = AccountService::new(
        SurrealTenantRepository::new(store.clone()),
        SurrealUserRepository::new(store.clone()),
        SurrealAdminLockRepository::new(store.clone()),
        SurrealInvitationRepository::new(store.clone()),
        AuditLogger::new(SurrealAuditLogRepository::new(store.clone())),
        ServiceConfig {
            pepper: Some("test-pepper".into()),
            ..ServiceConfig::default()
        },
        Arc::new(SystemClock),
    );
    (store, accounts)
}

fn signup(tenant: &str, email: &str) -> RegisterTenant {
    RegisterTenant {
        tenant_name: tenant.into(),
        email: email.into(),
        first_name: "Ada".into(),
        last_name: "Owner".into(),
        password: "correct horse".into(),
    }
}

fn new_user(email: &str, role: Role) -> NewUser {
    NewUser {
        email: email.into(),
        first_name: "Sam".into(),
        last_name: "Staff".into(),
        password: "battery staple".into(),
        role,
    }
}

async fn founder(accounts: &Accounts) -> User {
    match accounts
        .register_tenant(signup("Acme", "ada@acme.test"))
        .await
        .unwrap()
    {
        Registration::Created { admin, .. } => admin,
        Registration::AlreadyExists { .. } => panic!("fresh tenant should be claimable"),
    }
}

#[tokio::test]
async fn second_signup_for_a_tenant_is_told_it_exists() {
    let (store, accounts) = setup().await;
    let admin = founder(&accounts).await;
    assert_eq!(admin.role, Role::SuperAdmin);

    let again = accounts
        .register_tenant(signup(" acme ", "mallory@acme.test"))
        .await
        .unwrap();
    match again {
        Registration::AlreadyExists { tenant } => assert_eq!(tenant.id, admin.tenant_id),
        Registration::Created { .. } => panic!("tenant was already claimed"),
    }

    let denied = SurrealAuditLogRepository::new(store)
        .list(
            TenantScope::new(admin.tenant_id),
            AuditLogFilter {
                action: Some("tenant.register".into()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(denied.total, 2);
    assert_eq!(denied.items[0].outcome, AuditOutcome::Denied);
    assert_eq!(denied.items[0].actor.actor_type, ActorType::AuthAttempt);
}

#[tokio::test]
async fn role_assignment_boundary() {
    let (_store, accounts) = setup().await;
    let owner = founder(&accounts).await;
    let admin = accounts
        .create_user(&owner, new_user("admin@acme.test", Role::Admin))
        .await
        .unwrap();
    let tech = accounts
        .create_user(&admin, new_user("tech@acme.test", Role::Technician))
        .await
        .unwrap();

    let err = accounts
        .update_role(&admin, tech.id, Role::SuperAdmin)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::AuthorizationDenied { .. }));

    let promoted = accounts
        .update_role(&admin, tech.id, Role::ItManager)
        .await
        .unwrap();
    assert_eq!(promoted.role, Role::ItManager);
    let demoted = accounts
        .update_role(&admin, tech.id, Role::Technician)
        .await
        .unwrap();
    assert_eq!(demoted.role, Role::Technician);

    for role in Role::ALL {
        assert!(matches!(
            accounts.update_role(&demoted, admin.id, role).await,
            Err(RegistryError::AuthorizationDenied { .. })
        ));
    }
    assert!(matches!(
        accounts
            .create_user(&demoted, new_user("x@acme.test", Role::Technician))
            .await,
        Err(RegistryError::AuthorizationDenied { .. })
    ));

    // An admin cannot demote the owner or change their own account.
    assert!(accounts.update_role(&admin, owner.id, Role::ItManager).await.is_err());
    assert!(accounts.set_active(&admin, admin.id, false).await.is_err());
}

#[tokio::test]
async fn deactivated_users_cannot_sign_in() {
    let (store, accounts) = setup().await;
    let owner = founder(&accounts).await;
    let tech = accounts
        .create_user(&owner, new_user("tech@acme.test", Role::Technician))
        .await
        .unwrap();

    let sign_in = |password: &str| SignIn {
        tenant_name: "Acme".into(),
        email: "tech@acme.test".into(),
        password: password.into(),
        ip_address: Some("192.0.2.1".into()),
        user_agent: None,
    };

    let user = accounts.authenticate(sign_in("battery staple")).await.unwrap();
    assert_eq!(user.id, tech.id);
    assert!(matches!(
        accounts.authenticate(sign_in("wrong")).await,
        Err(RegistryError::AuthorizationDenied { .. })
    ));

    accounts.set_active(&owner, tech.id, false).await.unwrap();
    assert!(matches!(
        accounts.authenticate(sign_in("battery staple")).await,
        Err(RegistryError::AuthorizationDenied { .. })
    ));

    let failures = SurrealAuditLogRepository::new(store)
        .list(
            TenantScope::new(owner.tenant_id),
            AuditLogFilter {
                action: Some("auth.login".into()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    let outcomes: Vec<_> = failures.items.iter().map(|e| e.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            AuditOutcome::Failure,
            AuditOutcome::Failure,
            AuditOutcome::Success
        ]
    );
    assert_eq!(failures.items[0].actor.email.as_deref(), Some("tech@acme.test"));
    assert_eq!(failures.items[0].ip_address.as_deref(), Some("192.0.2.1"));
}

#[tokio::test]
async fn invitation_round_trip() {
    let (_store, accounts) = setup().await;
    let owner = founder(&accounts).await;

    let (invitation, token) = accounts
        .invite(&owner, "new@acme.test", Role::ItManager)
        .await
        .unwrap();
    assert_eq!(invitation.invited_by, Some(owner.id));

    let profile = InviteeProfile {
        first_name: "New".into(),
        last_name: "Hire".into(),
        password: "new hire pass".into(),
    };
    let (user, accepted) = accounts
        .accept_invitation(&token, profile.clone())
        .await
        .unwrap();
    assert_eq!(user.role, Role::ItManager);
    assert_eq!(accepted.id, invitation.id);
    assert!(matches!(
        accounts.accept_invitation(&token, profile).await,
        Err(RegistryError::NotFound { .. })
    ));

    assert!(matches!(
        accounts.invite(&user, "peer@acme.test", Role::Technician).await,
        Err(RegistryError::AuthorizationDenied { .. })
    ));
}
