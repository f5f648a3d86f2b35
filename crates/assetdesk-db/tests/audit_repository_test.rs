//! Integration tests for the audit log, master data and preferences.

use std::time::Duration;

use assetdesk_core::TenantScope;
use assetdesk_core::error::RegistryError;
use assetdesk_core::models::audit::{ActorSnapshot, AuditOutcome, CreateAuditLogEntry};
use assetdesk_core::models::master_data::MasterDataKind;
use assetdesk_core::models::tenant::CreateTenant;
use assetdesk_core::models::user::{CreateUser, Role};
use assetdesk_core::repository::{
    AuditLogFilter, AuditLogRepository, MasterDataRepository, Pagination, PreferenceRepository,
    TenantRepository, UserRepository,
};
use assetdesk_db::Store;
use assetdesk_db::repository::{
    SurrealAuditLogRepository, SurrealMasterDataRepository, SurrealPreferenceRepository,
    SurrealTenantRepository, SurrealUserRepository,
};
use serde_json::json;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> Store<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    assetdesk_db::run_migrations(&db).await.unwrap();
    Store::new(db)
}

async fn tenant(store: &Store<Db>, name: &str) -> TenantScope {
    let tenant = SurrealTenantRepository::new(store.clone())
        .create(CreateTenant {
            name: name.into(),
            settings: None,
        })
        .await
        .unwrap();
    TenantScope::new(tenant.id)
}

fn entry(scope: TenantScope, action: &str, actor: ActorSnapshot) -> CreateAuditLogEntry {
    CreateAuditLogEntry {
        tenant_id: Some(scope.tenant_id()),
        actor,
        action: action.into(),
        resource_type: "asset".into(),
        resource_id: Some(Uuid::new_v4().to_string()),
        outcome: AuditOutcome::Success,
        before_state: None,
        after_state: Some(json!({ "name": "Laptop" })),
        ip_address: Some("10.0.0.7".into()),
        user_agent: None,
    }
}

#[tokio::test]
async fn audit_entries_list_newest_first_within_tenant() {
    let store = setup().await;
    let acme = tenant(&store, "Acme").await;
    let globex = tenant(&store, "Globex").await;
    let repo = SurrealAuditLogRepository::new(store);
    let admin = ActorSnapshot::user(Uuid::new_v4(), "admin@acme.test", Role::Admin);

    for action in ["asset.create", "asset.update", "asset.delete"] {
        repo.append(entry(acme, action, admin.clone())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    repo.append(entry(globex, "asset.create", ActorSnapshot::system()))
        .await
        .unwrap();

    let page = repo
        .list(acme, AuditLogFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    let actions: Vec<_> = page.items.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["asset.delete", "asset.update", "asset.create"]);
    assert_eq!(page.items[0].actor, admin);
    assert_eq!(page.items[0].after_state, Some(json!({ "name": "Laptop" })));

    let filtered = repo
        .list(
            acme,
            AuditLogFilter {
                action: Some("asset.update".into()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(filtered.total, 1);
}

#[tokio::test]
async fn unresolved_auth_attempts_have_no_tenant() {
    let store = setup().await;
    let acme = tenant(&store, "Acme").await;
    let repo = SurrealAuditLogRepository::new(store);

    let stored = repo
        .append(CreateAuditLogEntry {
            tenant_id: None,
            actor: ActorSnapshot::auth_attempt(Some("ghost@nowhere.test".into())),
            action: "auth.login".into(),
            resource_type: "session".into(),
            resource_id: None,
            outcome: AuditOutcome::Failure,
            before_state: None,
            after_state: None,
            ip_address: None,
            user_agent: Some("curl/8".into()),
        })
        .await
        .unwrap();
    assert!(stored.tenant_id.is_none());
    assert_eq!(stored.outcome, AuditOutcome::Failure);

    let page = repo
        .list(acme, AuditLogFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn master_data_suggestions_are_prefix_matched_and_distinct() {
    let store = setup().await;
    let acme = tenant(&store, "Acme").await;
    let globex = tenant(&store, "Globex").await;
    let repo = SurrealMasterDataRepository::new(store);

    for value in ["Dell", "dell", "Dyson", "Lenovo"] {
        repo.add(acme, MasterDataKind::Manufacturer, value)
            .await
            .unwrap();
    }
    repo.add(globex, MasterDataKind::Manufacturer, "Dragon Corp")
        .await
        .unwrap();
    repo.add(acme, MasterDataKind::Location, "Denver")
        .await
        .unwrap();

    let suggestions = repo
        .suggest(acme, MasterDataKind::Manufacturer, "d", 10)
        .await
        .unwrap();
    assert_eq!(suggestions, vec!["Dell".to_string(), "Dyson".to_string()]);

    let manufacturers = repo
        .list(acme, Some(MasterDataKind::Manufacturer))
        .await
        .unwrap();
    assert_eq!(manufacturers.len(), 4);
    assert_eq!(repo.list(acme, None).await.unwrap().len(), 5);

    assert!(matches!(
        repo.add(acme, MasterDataKind::Vendor, "   ").await.unwrap_err(),
        RegistryError::Validation { .. }
    ));
}

#[tokio::test]
async fn preferences_round_trip_for_own_users_only() {
    let store = setup().await;
    let acme = tenant(&store, "Acme").await;
    let globex = tenant(&store, "Globex").await;
    let user = SurrealUserRepository::new(store.clone())
        .create(
            acme,
            CreateUser {
                email: "pref@acme.test".into(),
                first_name: "Lee".into(),
                last_name: "Jones".into(),
                password_hash: "$argon2id$stub".into(),
                role: Role::Technician,
            },
        )
        .await
        .unwrap();
    let repo = SurrealPreferenceRepository::new(store);

    let empty = repo.get(acme, user.id).await.unwrap();
    assert_eq!(empty.preferences, json!({}));
    assert_eq!(empty.updated_at, None);

    let saved = repo
        .upsert(acme, user.id, json!({ "theme": "dark", "page_size": 25 }))
        .await
        .unwrap();
    assert_eq!(saved.preferences["theme"], "dark");
    assert!(saved.updated_at.is_some());
    let replaced = repo
        .upsert(acme, user.id, json!({ "theme": "light" }))
        .await
        .unwrap();
    assert_eq!(replaced.preferences, json!({ "theme": "light" }));

    assert!(matches!(
        repo.get(globex, user.id).await.unwrap_err(),
        RegistryError::NotFound { .. }
    ));
    assert!(matches!(
        repo.upsert(acme, user.id, json!([1, 2])).await.unwrap_err(),
        RegistryError::Validation { .. }
    ));
}
