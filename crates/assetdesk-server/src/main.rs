//! AssetDesk: process entry point and maintenance commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use assetdesk_core::repository::AdminLockRepository;
use assetdesk_core::{SystemClock, TenantScope};
use assetdesk_db::repository::{
    SurrealAdminLockRepository, SurrealAssetRepository, SurrealAuditLogRepository,
    SurrealLicenseRepository, SurrealTicketRepository,
};
use assetdesk_db::{DbConfig, DbManager};
use assetdesk_service::{AuditContext, AuditEvent, AuditLogger, MetricsAggregator, ServiceConfig};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "assetdesk", version, about = "AssetDesk registry maintenance")]
struct Cli {
    #[command(flatten)]
    db: DbArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct DbArgs {
    /// SurrealDB WebSocket address, e.g. `127.0.0.1:8000`.
    #[arg(long = "db-url", env = "ASSETDESK_DB_URL")]
    url: String,

    #[arg(long = "db-namespace", env = "ASSETDESK_DB_NAMESPACE", default_value = "assetdesk")]
    namespace: String,

    #[arg(long = "db-database", env = "ASSETDESK_DB_DATABASE", default_value = "main")]
    database: String,

    #[arg(long = "db-user", env = "ASSETDESK_DB_USER", default_value = "root")]
    username: String,

    #[arg(long = "db-password", env = "ASSETDESK_DB_PASSWORD", default_value = "root", hide_env_values = true)]
    password: String,

    /// Concurrent store operations.
    #[arg(long, env = "ASSETDESK_DB_MAX_CONNECTIONS", default_value_t = 16)]
    max_connections: usize,

    /// Seconds to wait for a free store slot.
    #[arg(long, env = "ASSETDESK_DB_ACQUIRE_TIMEOUT", default_value_t = 5)]
    acquire_timeout_secs: u64,

    /// Seconds allowed for connecting and signing in.
    #[arg(long, env = "ASSETDESK_DB_CONNECT_TIMEOUT", default_value_t = 10)]
    connect_timeout_secs: u64,
}

impl DbArgs {
    fn into_config(self) -> DbConfig {
        DbConfig {
            namespace: self.namespace,
            database: self.database,
            username: self.username,
            password: self.password,
            max_connections: self.max_connections,
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            ..DbConfig::new(self.url)
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending schema migrations.
    Migrate,
    /// Write missing first-admin locks for tenants that already have an
    /// administrator. Safe to run repeatedly.
    BackfillAdminLocks,
    /// Print a tenant's dashboard snapshot as JSON.
    Snapshot {
        #[arg(long)]
        tenant: Uuid,
        /// Look-ahead for warranty, AMC and renewal windows.
        #[arg(long, env = "ASSETDESK_EXPIRY_WINDOW_DAYS", default_value_t = ServiceConfig::default().expiry_window_days)]
        window_days: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("assetdesk=info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = cli.db.into_config();
    let db = DbManager::connect(&config)
        .await
        .with_context(|| format!("connecting to SurrealDB at {}", config.url))?;
    let store = db.store();

    match cli.command {
        Command::Migrate => {
            assetdesk_db::run_migrations(db.client())
                .await
                .context("running migrations")?;
            info!("migrations applied");
        }
        Command::BackfillAdminLocks => {
            let report = SurrealAdminLockRepository::new(store.clone())
                .backfill()
                .await
                .context("backfilling admin locks")?;
            AuditLogger::new(SurrealAuditLogRepository::new(store.clone()))
                .record(
                    &AuditContext::system(None),
                    AuditEvent::new("admin_lock.backfill", "admin_lock").after(&report),
                )
                .await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Snapshot {
            tenant,
            window_days,
        } => {
            let metrics = MetricsAggregator::new(
                SurrealAssetRepository::new(store.clone()),
                SurrealLicenseRepository::new(store.clone()),
                SurrealTicketRepository::new(store.clone()),
                SurrealAuditLogRepository::new(store.clone()),
                Arc::new(SystemClock),
                window_days,
            );
            let snapshot = metrics
                .snapshot(TenantScope::new(tenant))
                .await
                .with_context(|| format!("building snapshot for tenant {tenant}"))?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }

    store.close();
    Ok(())
}
