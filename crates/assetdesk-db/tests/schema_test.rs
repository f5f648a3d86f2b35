//! Integration tests for schema initialization using in-memory SurrealDB.

use assetdesk_db::DbError;
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    assetdesk_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    for table in [
        "tenant",
        "user",
        "admin_lock",
        "invitation",
        "asset",
        "software_license",
        "ticket",
        "ticket_comment",
        "ticket_activity",
        "master_data",
        "user_preference",
        "audit_log",
        "_migration",
    ] {
        assert!(info_str.contains(table), "missing {table} table");
    }
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    assetdesk_db::run_migrations(&db).await.unwrap();
    assetdesk_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), 1, "expected exactly one migration record");
}

#[tokio::test]
async fn one_admin_lock_per_tenant() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    assetdesk_db::run_migrations(&db).await.unwrap();

    db.query("CREATE admin_lock SET tenant_id = 't-1', admin_user_id = 'u-1'")
        .await
        .unwrap()
        .check()
        .unwrap();

    let err = db
        .query("CREATE admin_lock SET tenant_id = 't-1', admin_user_id = 'u-2'")
        .await
        .unwrap()
        .check()
        .unwrap_err();
    let err = DbError::from(err);
    assert!(
        err.is_unique_violation_on("idx_admin_lock_tenant"),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn ticket_numbers_are_globally_unique() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    assetdesk_db::run_migrations(&db).await.unwrap();

    let insert = "CREATE ticket SET tenant_id = $tenant_id, ticket_number = 'TKT-000001-AAA', \
                  title = 't', description = 'd', priority = 'low', status = 'open', \
                  requestor_id = 'r', requestor_name = 'R'";
    db.query(insert)
        .bind(("tenant_id", "tenant-a".to_string()))
        .await
        .unwrap()
        .check()
        .unwrap();

    let err = db
        .query(insert)
        .bind(("tenant_id", "tenant-b".to_string()))
        .await
        .unwrap()
        .check()
        .unwrap_err();
    assert!(DbError::from(err).is_unique_violation_on("idx_ticket_number"));
}

#[tokio::test]
async fn enum_fields_reject_unknown_values() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    assetdesk_db::run_migrations(&db).await.unwrap();

    let result = db
        .query(
            "CREATE asset SET tenant_id = 't', name = 'Laptop', \
             asset_type = 'Furniture', status = 'in-stock'",
        )
        .await
        .unwrap()
        .check();
    assert!(result.is_err(), "unknown asset type should be rejected");
}
