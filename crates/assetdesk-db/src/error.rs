//! Database-specific error types and conversions.

use assetdesk_core::error::RegistryError;

/// Thrown from inside a transaction when the guarded ticket is absent or
/// belongs to another tenant.
pub(crate) const TICKET_NOT_FOUND: &str = "ticket_not_found";

/// Thrown when an invitation was consumed between lookup and acceptance.
pub(crate) const INVITATION_CONSUMED: &str = "invitation_consumed";

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index rejected the write. `index` is the index name when
    /// the store reported one, otherwise the record id.
    #[error("Unique index violation on {index}")]
    UniqueViolation { index: String },

    /// Optimistic transaction conflict; the whole unit may be retried.
    #[error("Transaction conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("No store connection available after {waited_ms} ms")]
    PoolExhausted { waited_ms: u64 },

    #[error("Stored value could not be decoded: {0}")]
    Decode(String),

    /// A row resolved through a reference belongs to another tenant.
    #[error("Tenant mismatch on {entity} {id}")]
    TenantMismatch { entity: String, id: String },

    /// A sentinel raised with `THROW` inside a transaction block.
    #[error("Aborted: {0}")]
    Thrown(String),

    /// A statement was rolled back because a later statement in the same
    /// transaction failed; the store does not say which one.
    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),
}

impl DbError {
    /// Whether this is a unique violation on the named index.
    pub fn is_unique_violation_on(&self, index: &str) -> bool {
        matches!(self, DbError::UniqueViolation { index: i } if i == index)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::Conflict(_))
    }

    pub(crate) fn is_thrown(&self, sentinel: &str) -> bool {
        matches!(self, DbError::Thrown(s) if s == sentinel)
    }

    /// Treat an unattributed transaction abort as a conflict so that the
    /// unit of work is retried (bounded) instead of failing outright.
    pub(crate) fn aborted_as_conflict(self) -> DbError {
        match self {
            DbError::TransactionAborted(msg) => DbError::Conflict(msg),
            other => other,
        }
    }
}

impl From<surrealdb::Error> for DbError {
    fn from(err: surrealdb::Error) -> Self {
        classify(&err.to_string()).unwrap_or(DbError::Surreal(err))
    }
}

/// Map a store error message onto a specific variant.
///
/// SurrealDB reports constraint and concurrency failures as text, so the
/// classification keys on the stable parts of those messages.
fn classify(message: &str) -> Option<DbError> {
    for sentinel in [TICKET_NOT_FOUND, INVITATION_CONSUMED] {
        if message.contains(sentinel) {
            return Some(DbError::Thrown(sentinel.to_string()));
        }
    }

    if message.contains("already contains") {
        let index = extract_backticked(message, "index `")
            .unwrap_or("unknown")
            .to_string();
        return Some(DbError::UniqueViolation { index });
    }
    if message.contains("already exists") {
        let index = extract_backticked(message, "record `")
            .unwrap_or("record")
            .to_string();
        return Some(DbError::UniqueViolation { index });
    }

    let lower = message.to_lowercase();
    if lower.contains("due to a failed transaction") {
        return Some(DbError::TransactionAborted(message.to_string()));
    }
    if lower.contains("read or write conflict")
        || lower.contains("can be retried")
        || lower.contains("transaction conflict")
    {
        return Some(DbError::Conflict(message.to_string()));
    }
    if lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection")
        || lower.contains("not connected")
    {
        return Some(DbError::Unavailable(message.to_string()));
    }
    None
}

fn extract_backticked<'a>(message: &'a str, prefix: &str) -> Option<&'a str> {
    let start = message.find(prefix)? + prefix.len();
    let rest = &message[start..];
    let end = rest.find('`')?;
    Some(&rest[..end])
}

impl From<DbError> for RegistryError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } | DbError::TenantMismatch { entity, id } => {
                RegistryError::NotFound { entity, id }
            }
            DbError::UniqueViolation { index } => RegistryError::UniqueConflict { index },
            DbError::Conflict(msg) | DbError::Unavailable(msg) => {
                RegistryError::DependencyUnavailable(msg)
            }
            DbError::PoolExhausted { waited_ms } => RegistryError::DependencyUnavailable(
                format!("connection pool exhausted after {waited_ms} ms"),
            ),
            other => RegistryError::Database(other.to_string()),
        }
    }
}
