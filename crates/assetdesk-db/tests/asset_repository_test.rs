//! Integration tests for assets and licenses using in-memory SurrealDB.

use assetdesk_core::TenantScope;
use assetdesk_core::error::RegistryError;
use assetdesk_core::models::asset::{
    AssetFilter, AssetStatus, AssetType, CreateAsset, UpdateAsset,
};
use assetdesk_core::models::license::{CreateLicense, UpdateLicense};
use assetdesk_core::models::tenant::CreateTenant;
use assetdesk_core::models::user::{CreateUser, Role, User};
use assetdesk_core::repository::{
    AssetRepository, LicenseRepository, Pagination, TenantRepository, UserRepository,
};
use assetdesk_db::Store;
use assetdesk_db::repository::{
    SurrealAssetRepository, SurrealLicenseRepository, SurrealTenantRepository,
    SurrealUserRepository,
};
use chrono::NaiveDate;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

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

async fn user(store: &Store<Db>, scope: TenantScope, email: &str) -> User {
    SurrealUserRepository::new(store.clone())
        .create(
            scope,
            CreateUser {
                email: email.into(),
                first_name: "Kim".into(),
                last_name: "Park".into(),
                password_hash: "$argon2id$stub".into(),
                role: Role::Technician,
            },
        )
        .await
        .unwrap()
}

fn laptop(name: &str, serial: &str) -> CreateAsset {
    CreateAsset {
        serial_number: Some(serial.into()),
        model: Some("ThinkPad T14".into()),
        purchase_date: NaiveDate::from_ymd_opt(2022, 5, 1),
        purchase_cost: Some(1450.0),
        ..CreateAsset::new(name, AssetType::Hardware)
    }
}

#[tokio::test]
async fn create_get_and_search() {
    let store = setup().await;
    let scope = tenant(&store, "Acme").await;
    let repo = SurrealAssetRepository::new(store);

    let created = repo.create(scope, laptop("Dev laptop", "SN-001")).await.unwrap();
    repo.create(scope, CreateAsset::new("Office 365", AssetType::Software))
        .await
        .unwrap();

    let fetched = repo.get_by_id(scope, created.id).await.unwrap();
    assert_eq!(fetched.name, "Dev laptop");
    assert_eq!(fetched.purchase_date, NaiveDate::from_ymd_opt(2022, 5, 1));
    assert_eq!(fetched.purchase_cost, Some(1450.0));
    assert_eq!(fetched.status, AssetStatus::InStock);

    let found = repo
        .list(
            scope,
            AssetFilter {
                search: Some("thinkpad".into()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(found.total, 1);
    assert_eq!(found.items[0].id, created.id);

    let software = repo
        .list(
            scope,
            AssetFilter {
                asset_type: Some(AssetType::Software),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(software.total, 1);
    assert_eq!(software.items[0].name, "Office 365");
}

#[tokio::test]
async fn update_sets_and_clears_fields() {
    let store = setup().await;
    let scope = tenant(&store, "Acme").await;
    let owner = user(&store, scope, "kim@acme.test").await;
    let repo = SurrealAssetRepository::new(store);
    let asset = repo.create(scope, laptop("Laptop", "SN-9")).await.unwrap();

    let updated = repo
        .update(
            scope,
            asset.id,
            UpdateAsset {
                status: Some(AssetStatus::Deployed),
                assigned_user_id: Some(Some(owner.id)),
                assigned_user_name: Some(Some(owner.display_name())),
                serial_number: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, AssetStatus::Deployed);
    assert_eq!(updated.assigned_user_id, Some(owner.id));
    assert_eq!(updated.serial_number, None);
    assert_eq!(updated.model.as_deref(), Some("ThinkPad T14"));

    let retyped = repo
        .update(
            scope,
            asset.id,
            UpdateAsset {
                asset_type: Some(AssetType::Software),
                manufacturer: Some(Some("Lenovo".into())),
                model: Some(None),
                vendor: Some(Some("CDW".into())),
                company: Some(Some("Acme EU".into())),
                purchase_date: Some(NaiveDate::from_ymd_opt(2019, 1, 2)),
                software_version: Some(Some("11.2".into())),
                license_key: Some(Some("KEY-123".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(retyped.asset_type, AssetType::Software);
    assert_eq!(retyped.manufacturer.as_deref(), Some("Lenovo"));
    assert_eq!(retyped.model, None);
    assert_eq!(retyped.vendor.as_deref(), Some("CDW"));
    assert_eq!(retyped.company.as_deref(), Some("Acme EU"));
    assert_eq!(retyped.purchase_date, NaiveDate::from_ymd_opt(2019, 1, 2));
    assert_eq!(retyped.software_version.as_deref(), Some("11.2"));
    assert_eq!(retyped.license_key.as_deref(), Some("KEY-123"));
    assert_eq!(retyped.status, AssetStatus::Deployed);

    let cleared = repo
        .update(
            scope,
            asset.id,
            UpdateAsset {
                purchase_date: Some(None),
                license_key: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.purchase_date, None);
    assert_eq!(cleared.license_key, None);
    assert_eq!(cleared.vendor.as_deref(), Some("CDW"));
}

#[tokio::test]
async fn foreign_tenant_sees_nothing() {
    let store = setup().await;
    let acme = tenant(&store, "Acme").await;
    let globex = tenant(&store, "Globex").await;
    let outsider = user(&store, globex, "eve@globex.test").await;
    let repo = SurrealAssetRepository::new(store);
    let asset = repo.create(acme, laptop("Laptop", "SN-1")).await.unwrap();

    assert!(matches!(
        repo.get_by_id(globex, asset.id).await.unwrap_err(),
        RegistryError::NotFound { .. }
    ));
    assert!(matches!(
        repo.delete(globex, asset.id).await.unwrap_err(),
        RegistryError::NotFound { .. }
    ));
    assert!(matches!(
        repo.update(
            globex,
            asset.id,
            UpdateAsset {
                name: Some("stolen".into()),
                ..Default::default()
            }
        )
        .await
        .unwrap_err(),
        RegistryError::NotFound { .. }
    ));
    assert_eq!(
        repo.list(globex, AssetFilter::default(), Pagination::default())
            .await
            .unwrap()
            .total,
        0
    );

    // Assigning an Acme asset to a Globex user is refused.
    let err = repo
        .update(
            acme,
            asset.id,
            UpdateAsset {
                assigned_user_id: Some(Some(outsider.id)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound { ref entity, .. } if entity == "user"));
    assert_eq!(repo.get_by_id(acme, asset.id).await.unwrap().name, "Laptop");
}

#[tokio::test]
async fn bulk_insert_and_counts() {
    let store = setup().await;
    let scope = tenant(&store, "Acme").await;
    let repo = SurrealAssetRepository::new(store);

    let rows = vec![
        laptop("A", "SN-A"),
        laptop("B", "SN-B"),
        CreateAsset {
            status: AssetStatus::Deployed,
            ..CreateAsset::new("Mouse", AssetType::Peripherals)
        },
    ];
    let inserted = repo.create_bulk(scope, rows).await.unwrap();
    let names: Vec<_> = inserted.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "Mouse"]);
    assert!(inserted.iter().all(|a| a.tenant_id == scope.tenant_id()));

    let counts = repo.count_by_type_and_status(scope).await.unwrap();
    let hardware = counts
        .iter()
        .find(|c| c.asset_type == AssetType::Hardware && c.status == AssetStatus::InStock)
        .unwrap();
    assert_eq!(hardware.total, 2);
    assert_eq!(counts.len(), 2);

    assert!(repo.create_bulk(scope, Vec::new()).await.unwrap().is_empty());
    assert_eq!(repo.list_all(scope).await.unwrap().len(), 3);
}

#[tokio::test]
async fn bulk_insert_rejects_foreign_assignee_as_a_whole() {
    let store = setup().await;
    let acme = tenant(&store, "Acme").await;
    let globex = tenant(&store, "Globex").await;
    let outsider = user(&store, globex, "eve@globex.test").await;
    let repo = SurrealAssetRepository::new(store);

    let err = repo
        .create_bulk(
            acme,
            vec![
                laptop("Fine", "SN-1"),
                CreateAsset {
                    assigned_user_id: Some(outsider.id),
                    ..laptop("Bad", "SN-2")
                },
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound { .. }));
    assert!(repo.list_all(acme).await.unwrap().is_empty());
}

#[tokio::test]
async fn licenses_allow_over_allocation() {
    let store = setup().await;
    let scope = tenant(&store, "Acme").await;
    let repo = SurrealLicenseRepository::new(store);

    let license = repo
        .create(
            scope,
            CreateLicense {
                software_name: "Figma".into(),
                vendor: Some("Figma Inc".into()),
                total_licenses: 10,
                used_licenses: 4,
                cost_per_license: Some(12.5),
                purchase_date: None,
                renewal_date: NaiveDate::from_ymd_opt(2030, 1, 1),
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(license.available(), 6);

    let over = repo
        .update(
            scope,
            license.id,
            UpdateLicense {
                used_licenses: Some(12),
                notes: Some(Some("contractors".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(over.is_over_allocated());
    assert_eq!(over.available(), -2);

    repo.delete(scope, license.id).await.unwrap();
    assert!(matches!(
        repo.get_by_id(scope, license.id).await.unwrap_err(),
        RegistryError::NotFound { .. }
    ));
}

#[tokio::test]
async fn licenses_of_another_tenant_are_not_found() {
    let store = setup().await;
    let acme = tenant(&store, "Acme").await;
    let globex = tenant(&store, "Globex").await;
    let repo = SurrealLicenseRepository::new(store);

    let license = repo
        .create(
            acme,
            CreateLicense {
                software_name: "Slack".into(),
                vendor: None,
                total_licenses: 5,
                used_licenses: 1,
                cost_per_license: None,
                purchase_date: None,
                renewal_date: None,
                notes: None,
            },
        )
        .await
        .unwrap();

    assert!(matches!(
        repo.get_by_id(globex, license.id).await,
        Err(RegistryError::NotFound { .. })
    ));
    assert!(matches!(
        repo.update(
            globex,
            license.id,
            UpdateLicense {
                used_licenses: Some(5),
                ..Default::default()
            },
        )
        .await,
        Err(RegistryError::NotFound { .. })
    ));
    assert!(matches!(
        repo.delete(globex, license.id).await,
        Err(RegistryError::NotFound { .. })
    ));
    assert!(repo.list_all(globex).await.unwrap().is_empty());

    let untouched = repo.get_by_id(acme, license.id).await.unwrap();
    assert_eq!(untouched.used_licenses, 1);
}
