//! AssetDesk Database: SurrealDB store, schema migrations and the
//! tenant-scoped repository implementations.
//!
//! This crate provides:
//! - Connection management with a bounded pool ([`DbManager`], [`Store`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Ticket numbering ([`sequencer`])
//! - Implementations of every `assetdesk-core` repository trait
//!   ([`repository`])

mod connection;
mod error;
mod schema;
mod store;

pub mod repository;
pub mod sequencer;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::{run_migrations, schema_v1};
pub use sequencer::{MAX_TICKET_NUMBER_ATTEMPTS, TicketNumberSource, TimeRandomSource};
pub use store::{DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_MAX_CONNECTIONS, Store};
