//! Domain models for AssetDesk.
//!
//! These are the core types shared across all crates. Every tenant-owned
//! entity carries its `tenant_id`.

pub mod admin_lock;
pub mod asset;
pub mod audit;
pub mod invitation;
pub mod license;
pub mod master_data;
pub mod preference;
pub mod ticket;
pub mod tenant;
pub mod user;
