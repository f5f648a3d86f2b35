//! Dashboard snapshot against in-memory SurrealDB.

use std::sync::Arc;

use assetdesk_core::models::asset::{AssetStatus, AssetType, CreateAsset};
use assetdesk_core::models::license::CreateLicense;
use assetdesk_core::models::tenant::CreateTenant;
use assetdesk_core::models::ticket::{CreateTicket, TicketPriority};
use assetdesk_core::models::user::{CreateUser, Role};
use assetdesk_core::repository::{
    AssetRepository, LicenseRepository, TenantRepository, TicketRepository, UserRepository,
};
use assetdesk_core::{FixedClock, TenantScope};
use assetdesk_db::Store;
use assetdesk_db::repository::{
    SurrealAssetRepository, SurrealAuditLogRepository, SurrealLicenseRepository,
    SurrealTenantRepository, SurrealTicketRepository, SurrealUserRepository,
};
use assetdesk_service::{AuditContext, AuditEvent, AuditLogger, MetricsAggregator};
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

fn aggregator(
    store: &Store<Db>,
) -> MetricsAggregator<
    SurrealAssetRepository<Db>,
    SurrealLicenseRepository<Db>,
    SurrealTicketRepository<Db>,
    SurrealAuditLogRepository<Db>,
> {
    MetricsAggregator::new(
        SurrealAssetRepository::new(store.clone()),
        SurrealLicenseRepository::new(store.clone()),
        SurrealTicketRepository::new(store.clone()),
        SurrealAuditLogRepository::new(store.clone()),
        Arc::new(FixedClock(Utc::now())),
        30,
    )
}

#[tokio::test]
async fn empty_tenant_has_an_all_zero_snapshot() {
    let (store, scope) = setup().await;
    let snapshot = aggregator(&store).snapshot(scope).await.unwrap();
    assert_eq!(snapshot.assets_by_type.len(), 4);
    assert!(snapshot.assets_by_type.iter().all(|t| t.total == 0));
    assert_eq!(snapshot.tickets.total, 0);
    assert_eq!(snapshot.licenses.utilization_percent, 0.0);
    assert!(snapshot.recent_activity.is_empty());
}

#[tokio::test]
async fn snapshot_combines_every_section() {
    let (store, scope) = setup().await;
    let today = Utc::now().date_naive();
    let assets = SurrealAssetRepository::new(store.clone());

    assets
        .create_bulk(
            scope,
            vec![
                CreateAsset {
                    serial_number: Some("SN-1".into()),
                    warranty_expiry: Some(today + Duration::days(10)),
                    amc_expiry: Some(today - Duration::days(1)),
                    purchase_date: Some(today - Duration::days(365 * 6)),
                    purchase_cost: Some(900.0),
                    ..CreateAsset::new("Old server", AssetType::Hardware)
                },
                CreateAsset {
                    serial_number: Some("SN-2".into()),
                    status: AssetStatus::Deployed,
                    warranty_expiry: Some(today - Duration::days(3)),
                    purchase_date: Some(today - Duration::days(30)),
                    purchase_cost: Some(1500.0),
                    ..CreateAsset::new("New laptop", AssetType::Hardware)
                },
                CreateAsset {
                    license_key: Some("K-1".into()),
                    purchase_date: Some(today - Duration::days(365 * 10)),
                    ..CreateAsset::new("Legacy suite", AssetType::Software)
                },
            ],
        )
        .await
        .unwrap();

    SurrealLicenseRepository::new(store.clone())
        .create(
            scope,
            CreateLicense {
                software_name: "Figma".into(),
                vendor: None,
                total_licenses: 10,
                used_licenses: 4,
                cost_per_license: None,
                purchase_date: None,
                renewal_date: Some(today + Duration::days(5)),
                notes: None,
            },
        )
        .await
        .unwrap();

    let requestor = SurrealUserRepository::new(store.clone())
        .create(
            scope,
            CreateUser {
                email: "req@acme.test".into(),
                first_name: "Rae".into(),
                last_name: "Quest".into(),
                password_hash: "$argon2id$stub".into(),
                role: Role::Technician,
            },
        )
        .await
        .unwrap();
    SurrealTicketRepository::new(store.clone())
        .create(
            scope,
            CreateTicket {
                title: "Screen flickers".into(),
                description: "Since Monday".into(),
                priority: TicketPriority::High,
                category: None,
                requestor_id: requestor.id,
                requestor_name: requestor.display_name(),
                asset_id: None,
            },
        )
        .await
        .unwrap();

    AuditLogger::new(SurrealAuditLogRepository::new(store.clone()))
        .record(
            &AuditContext::system(Some(scope)),
            AuditEvent::new("asset.bulk_import", "asset"),
        )
        .await;

    let snapshot = aggregator(&store).snapshot(scope).await.unwrap();

    let hardware = &snapshot.assets_by_type[0];
    assert_eq!(hardware.asset_type, AssetType::Hardware);
    assert_eq!((hardware.total, hardware.in_stock, hardware.deployed), (2, 1, 1));
    assert_eq!(snapshot.warranty.expiring_soon, 1);
    assert_eq!(snapshot.warranty.expired, 1);
    assert_eq!(snapshot.amc.expired, 1);
    assert_eq!(snapshot.licenses.total_seats, 10);
    assert_eq!(snapshot.licenses.utilization_percent, 40.0);
    assert_eq!(snapshot.licenses.renewals.expiring_soon, 1);
    assert_eq!(snapshot.tickets.open, 1);
    assert_eq!(snapshot.unused.in_stock_hardware, 1);
    assert_eq!(snapshot.unused.free_seats, 6);
    assert_eq!(snapshot.age.old.count, 1);
    assert_eq!(snapshot.age.old.replacement_cost, 900.0);
    assert_eq!(snapshot.age.new.count, 1);
    assert_eq!(snapshot.age.undated, 0);
    assert_eq!(snapshot.recent_activity.len(), 1);
    assert_eq!(snapshot.recent_activity[0].action, "asset.bulk_import");
    assert_eq!(snapshot.recent_activity[0].relative_time, "just now");
}
