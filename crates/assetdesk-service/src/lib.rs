//! AssetDesk Service: audit logging, bulk asset import, dashboard
//! metrics, account flows and audited record writes on top of the
//! repository traits.

pub mod accounts;
pub mod audit;
pub mod config;
pub mod error;
pub mod import;
pub mod inventory;
pub mod metrics;
pub mod password;
pub mod tickets;
pub mod workspace;

pub use accounts::{AccountService, InviteeProfile, NewUser, RegisterTenant, Registration, SignIn};
pub use audit::{AuditContext, AuditEvent, AuditLogger, REDACTED, redact};
pub use config::ServiceConfig;
pub use error::ServiceError;
pub use import::{
    BulkImportEngine, ImportBatch, ImportMode, ImportReport, ImportSummary, RowReport,
    RowValidation,
};
pub use inventory::InventoryService;
pub use metrics::{DashboardSnapshot, MetricsAggregator};
pub use tickets::TicketService;
pub use workspace::WorkspaceService;
