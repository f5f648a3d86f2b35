//! SurrealDB connection management.

use std::time::Duration;

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::error::DbError;
use crate::store::{DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_MAX_CONNECTIONS, Store};

/// Configuration for connecting to SurrealDB.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// WebSocket URL (e.g., `127.0.0.1:8000`).
    pub url: String,
    /// SurrealDB namespace.
    pub namespace: String,
    /// SurrealDB database name.
    pub database: String,
    /// Root username for authentication.
    pub username: String,
    /// Root password for authentication.
    pub password: String,
    /// Concurrent store operations allowed through the gate.
    pub max_connections: usize,
    /// How long a caller waits for a free slot.
    pub acquire_timeout: Duration,
    /// Upper bound for connect + sign-in + namespace selection.
    pub connect_timeout: Duration,
}

impl DbConfig {
    /// Defaults for everything but the URL, which has none.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            namespace: "assetdesk".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Manages a connection to SurrealDB.
#[derive(Clone)]
pub struct DbManager {
    store: Store<Client>,
}

impl DbManager {
    /// Connect to SurrealDB using the provided configuration.
    ///
    /// Authenticates as root, selects the configured namespace and
    /// database, and returns a ready-to-use manager. The whole handshake
    /// is bounded by `connect_timeout`.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            max_connections = config.max_connections,
            "Connecting to SurrealDB"
        );

        let db = tokio::time::timeout(config.connect_timeout, Self::handshake(config))
            .await
            .map_err(|_| {
                DbError::Unavailable(format!(
                    "connect to {} timed out after {:?}",
                    config.url, config.connect_timeout
                ))
            })??;

        info!("Successfully connected to SurrealDB");

        Ok(Self {
            store: Store::with_limits(db, config.max_connections, config.acquire_timeout),
        })
    }

    async fn handshake(config: &DbConfig) -> Result<Surreal<Client>, DbError> {
        let db = Surreal::new::<Ws>(&config.url).await?;

        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        Ok(db)
    }

    /// Returns a reference to the underlying SurrealDB client.
    pub fn client(&self) -> &Surreal<Client> {
        self.store.client()
    }

    /// The gated store handle repositories are built from.
    pub fn store(&self) -> Store<Client> {
        self.store.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_everything_but_url() {
        let cfg = DbConfig::new("db.internal:8000");
        assert_eq!(cfg.url, "db.internal:8000");
        assert_eq!(cfg.namespace, "assetdesk");
        assert_eq!(cfg.max_connections, 16);
        assert_eq!(cfg.acquire_timeout, Duration::from_secs(5));
        assert_eq!(cfg.connect_timeout, Duration::from_secs(10));
    }
}
