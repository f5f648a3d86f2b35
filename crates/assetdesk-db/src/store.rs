//! Shared store handle with a bounded concurrency gate.

use std::sync::Arc;
use std::time::Duration;

use surrealdb::{Connection, Surreal};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::DbError;

pub const DEFAULT_MAX_CONNECTIONS: usize = 16;
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// A SurrealDB client plus the gate every repository passes through.
///
/// At most `max_connections` store operations run at once. A caller that
/// cannot get a slot within `acquire_timeout` fails with
/// [`DbError::PoolExhausted`] instead of waiting forever.
pub struct Store<C: Connection> {
    db: Surreal<C>,
    permits: Arc<Semaphore>,
    max_connections: usize,
    acquire_timeout: Duration,
}

impl<C: Connection> Clone for Store<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            permits: Arc::clone(&self.permits),
            max_connections: self.max_connections,
            acquire_timeout: self.acquire_timeout,
        }
    }
}

impl<C: Connection> Store<C> {
    /// Wrap a client with the default limits.
    pub fn new(db: Surreal<C>) -> Self {
        Self::with_limits(db, DEFAULT_MAX_CONNECTIONS, DEFAULT_ACQUIRE_TIMEOUT)
    }

    pub fn with_limits(db: Surreal<C>, max_connections: usize, acquire_timeout: Duration) -> Self {
        let max_connections = max_connections.max(1);
        Self {
            db,
            permits: Arc::new(Semaphore::new(max_connections)),
            max_connections,
            acquire_timeout,
        }
    }

    pub fn client(&self) -> &Surreal<C> {
        &self.db
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait for a slot. Hold the returned permit for the duration of the
    /// store round trip.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, DbError> {
        let waited_ms = u64::try_from(self.acquire_timeout.as_millis()).unwrap_or(u64::MAX);
        match tokio::time::timeout(self.acquire_timeout, Arc::clone(&self.permits).acquire_owned())
            .await
        {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(DbError::Unavailable("store is shut down".into())),
            Err(_) => Err(DbError::PoolExhausted { waited_ms }),
        }
    }

    /// Refuse new work; pending and future `acquire` calls fail.
    pub fn close(&self) {
        self.permits.close();
    }
}
