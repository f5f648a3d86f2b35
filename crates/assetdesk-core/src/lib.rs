//! AssetDesk Core: domain models, tenant scope, error taxonomy and the
//! repository traits implemented by `assetdesk-db`.

pub mod clock;
pub mod error;
pub mod models;
pub mod repository;
pub mod tenant;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{FieldIssue, IssueKind, RegistryError, RegistryResult};
pub use tenant::TenantScope;
