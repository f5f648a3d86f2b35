//! Integration tests for users, tenants and invitations using in-memory
//! SurrealDB.

use std::collections::BTreeSet;

use assetdesk_core::TenantScope;
use assetdesk_core::error::RegistryError;
use assetdesk_core::models::invitation::{AcceptInvitation, CreateInvitation, InvitationStatus};
use assetdesk_core::models::tenant::{CreateTenant, TenantSettings, UpdateTenant};
use assetdesk_core::models::user::{CreateUser, Role, UpdateUserProfile};
use assetdesk_core::repository::{
    InvitationRepository, Pagination, TenantRepository, UserRepository,
};
use assetdesk_db::Store;
use assetdesk_db::repository::{
    SurrealInvitationRepository, SurrealTenantRepository, SurrealUserRepository, hash_token,
};
use chrono::{Duration, Utc};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn setup() -> (Store<Db>, TenantScope) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    assetdesk_db::run_migrations(&db).await.unwrap();
    let store = Store::new(db);

    let tenant = SurrealTenantRepository::new(store.clone())
        .create(CreateTenant {
            name: "Acme".into(),
            settings: None,
        })
        .await
        .unwrap();
    (store, TenantScope::new(tenant.id))
}

fn new_user(email: &str, role: Role) -> CreateUser {
    CreateUser {
        email: email.into(),
        first_name: "Alex".into(),
        last_name: "Doe".into(),
        password_hash: "$argon2id$stub".into(),
        role,
    }
}

#[tokio::test]
async fn tenant_names_are_unique_ignoring_case() {
    let (store, scope) = setup().await;
    let repo = SurrealTenantRepository::new(store);

    let err = repo
        .create(CreateTenant {
            name: "  ACME ".into(),
            settings: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::UniqueConflict { .. }));

    let tenant = repo.get_by_name("acme").await.unwrap();
    assert_eq!(tenant.id, scope.tenant_id());
    assert_eq!(tenant.settings, TenantSettings::default());

    let updated = repo
        .update(
            scope.tenant_id(),
            UpdateTenant {
                name: None,
                settings: Some(TenantSettings {
                    currency: "EUR".into(),
                    ..TenantSettings::default()
                }),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.settings.currency, "EUR");
    assert_eq!(repo.list(Pagination::default()).await.unwrap().total, 1);
}

#[tokio::test]
async fn employee_ids_are_sequential_per_tenant() {
    let (store, scope) = setup().await;
    let repo = SurrealUserRepository::new(store);

    let mut ids = Vec::new();
    for email in ["a@acme.test", "b@acme.test", "c@acme.test"] {
        ids.push(
            repo.create(scope, new_user(email, Role::Technician))
                .await
                .unwrap()
                .employee_id,
        );
    }
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn duplicate_email_in_tenant_is_rejected() {
    let (store, scope) = setup().await;
    let repo = SurrealUserRepository::new(store);

    repo.create(scope, new_user("Alex@Acme.test", Role::Technician))
        .await
        .unwrap();
    let err = repo
        .create(scope, new_user("alex@acme.test", Role::ItManager))
        .await
        .unwrap_err();
    assert!(
        matches!(err, RegistryError::UniqueConflict { ref index } if index == "idx_user_tenant_email"),
        "unexpected {err:?}"
    );

    let found = repo.get_by_email(scope, "ALEX@acme.test").await.unwrap();
    assert_eq!(found.email, "alex@acme.test");
}

#[tokio::test]
async fn super_admin_cannot_be_created_or_granted_directly() {
    let (store, scope) = setup().await;
    let repo = SurrealUserRepository::new(store);

    assert!(matches!(
        repo.create(scope, new_user("x@acme.test", Role::SuperAdmin))
            .await
            .unwrap_err(),
        RegistryError::AuthorizationDenied { .. }
    ));

    let user = repo
        .create(scope, new_user("y@acme.test", Role::Technician))
        .await
        .unwrap();
    assert!(matches!(
        repo.update_role(scope, user.id, Role::SuperAdmin)
            .await
            .unwrap_err(),
        RegistryError::AuthorizationDenied { .. }
    ));

    let promoted = repo
        .update_role(scope, user.id, Role::ItManager)
        .await
        .unwrap();
    assert_eq!(promoted.role, Role::ItManager);

    let inactive = repo.set_active(scope, user.id, false).await.unwrap();
    assert!(!inactive.is_active);

    let renamed = repo
        .update_profile(
            scope,
            user.id,
            UpdateUserProfile {
                first_name: Some(" Sam ".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.first_name, "Sam");
}

#[tokio::test]
async fn invitation_accept_creates_user_once() {
    let (store, scope) = setup().await;
    let invitations = SurrealInvitationRepository::new(store.clone());
    let users = SurrealUserRepository::new(store);

    let (invitation, token) = invitations
        .create(
            scope,
            CreateInvitation {
                email: "new.hire@acme.test".into(),
                role: Role::ItManager,
                invited_by: None,
                expires_at: Utc::now() + Duration::days(7),
            },
        )
        .await
        .unwrap();
    assert_eq!(invitation.status, InvitationStatus::Pending);
    assert_eq!(invitation.token_hash, hash_token(&token));

    let accept = AcceptInvitation {
        first_name: "New".into(),
        last_name: "Hire".into(),
        password_hash: "$argon2id$stub".into(),
    };
    let (user, accepted) = invitations
        .accept(&token, accept.clone(), Utc::now())
        .await
        .unwrap();
    assert_eq!(user.role, Role::ItManager);
    assert_eq!(user.tenant_id, scope.tenant_id());
    assert_eq!(accepted.status, InvitationStatus::Accepted);
    assert!(accepted.accepted_at.is_some());

    let again = invitations.accept(&token, accept, Utc::now()).await;
    assert!(matches!(again, Err(RegistryError::NotFound { .. })));
    assert_eq!(
        users.list(scope, Pagination::default()).await.unwrap().total,
        1
    );
}

#[tokio::test]
async fn expired_invitation_is_refused_and_marked() {
    let (store, scope) = setup().await;
    let invitations = SurrealInvitationRepository::new(store);

    let (invitation, token) = invitations
        .create(
            scope,
            CreateInvitation {
                email: "late@acme.test".into(),
                role: Role::Technician,
                invited_by: None,
                expires_at: Utc::now() + Duration::hours(1),
            },
        )
        .await
        .unwrap();

    let err = invitations
        .accept(
            &token,
            AcceptInvitation {
                first_name: "Late".into(),
                last_name: "Comer".into(),
                password_hash: "$argon2id$stub".into(),
            },
            Utc::now() + Duration::hours(2),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Validation { .. }));

    let stored = invitations.get_by_id(scope, invitation.id).await.unwrap();
    assert_eq!(stored.status, InvitationStatus::Expired);
}

#[tokio::test]
async fn invitation_for_existing_email_conflicts() {
    let (store, scope) = setup().await;
    let invitations = SurrealInvitationRepository::new(store.clone());
    SurrealUserRepository::new(store)
        .create(scope, new_user("taken@acme.test", Role::Technician))
        .await
        .unwrap();

    let (_, token) = invitations
        .create(
            scope,
            CreateInvitation {
                email: "taken@acme.test".into(),
                role: Role::Technician,
                invited_by: None,
                expires_at: Utc::now() + Duration::days(1),
            },
        )
        .await
        .unwrap();
    let err = invitations
        .accept(
            &token,
            AcceptInvitation {
                first_name: "Dup".into(),
                last_name: "User".into(),
                password_hash: "$argon2id$stub".into(),
            },
            Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::UniqueConflict { .. }));
}

async fn second_tenant(store: &Store<Db>) -> TenantScope {
    let tenant = SurrealTenantRepository::new(store.clone())
        .create(CreateTenant {
            name: "Globex".into(),
            settings: None,
        })
        .await
        .unwrap();
    TenantScope::new(tenant.id)
}

#[tokio::test]
async fn users_of_another_tenant_are_not_found() {
    let (store, acme) = setup().await;
    let globex = second_tenant(&store).await;
    let users = SurrealUserRepository::new(store);
    let tech = users
        .create(acme, new_user("tech@acme.test", Role::Technician))
        .await
        .unwrap();

    assert!(matches!(
        users.get_by_id(globex, tech.id).await,
        Err(RegistryError::NotFound { .. })
    ));
    assert!(matches!(
        users.get_by_email(globex, "tech@acme.test").await,
        Err(RegistryError::NotFound { .. })
    ));
    assert!(matches!(
        users.update_role(globex, tech.id, Role::Admin).await,
        Err(RegistryError::NotFound { .. })
    ));
    assert!(matches!(
        users.set_active(globex, tech.id, false).await,
        Err(RegistryError::NotFound { .. })
    ));
    assert!(
        users
            .existing_ids(globex, [tech.id].into())
            .await
            .unwrap()
            .is_empty()
    );

    let untouched = users.get_by_id(acme, tech.id).await.unwrap();
    assert_eq!(untouched.role, Role::Technician);
    assert!(untouched.is_active);
    assert_eq!(
        users.existing_ids(acme, [tech.id].into()).await.unwrap(),
        BTreeSet::from([tech.id])
    );
}

#[tokio::test]
async fn invitations_of_another_tenant_are_not_found() {
    let (store, acme) = setup().await;
    let globex = second_tenant(&store).await;
    let invitations = SurrealInvitationRepository::new(store);
    let (invitation, _token) = invitations
        .create(
            acme,
            CreateInvitation {
                email: "guest@acme.test".into(),
                role: Role::Technician,
                invited_by: None,
                expires_at: Utc::now() + Duration::days(1),
            },
        )
        .await
        .unwrap();

    assert!(matches!(
        invitations.get_by_id(globex, invitation.id).await,
        Err(RegistryError::NotFound { .. })
    ));
    assert!(matches!(
        invitations.expire(globex, invitation.id).await,
        Err(RegistryError::NotFound { .. })
    ));
    assert_eq!(
        invitations
            .list(globex, Pagination::default())
            .await
            .unwrap()
            .total,
        0
    );

    let untouched = invitations.get_by_id(acme, invitation.id).await.unwrap();
    assert_eq!(untouched.status, InvitationStatus::Pending);
    let expired = invitations.expire(acme, invitation.id).await.unwrap();
    assert_eq!(expired.status, InvitationStatus::Expired);
}
