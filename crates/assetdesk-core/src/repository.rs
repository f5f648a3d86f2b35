//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Tenant-owned data is only reachable
//! through a [`TenantScope`]; a row belonging to another tenant is reported
//! as `NotFound`, never returned.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::error::RegistryResult;
use crate::models::{
    admin_lock::{AdminLock, BackfillReport, FirstAdminOutcome},
    asset::{Asset, AssetCount, AssetFilter, CreateAsset, UpdateAsset},
    audit::{AuditLogEntry, CreateAuditLogEntry},
    invitation::{AcceptInvitation, CreateInvitation, Invitation},
    license::{CreateLicense, SoftwareLicense, UpdateLicense},
    master_data::{MasterDataEntry, MasterDataKind},
    preference::UserPreferences,
    tenant::{CreateTenant, Tenant, UpdateTenant},
    ticket::{
        CreateComment, CreateTicket, StatusChange, Ticket, TicketActivity, TicketActor,
        TicketComment, TicketFilter, TicketStatusCount,
    },
    user::{CreateUser, Role, UpdateUserProfile, User},
};
use crate::tenant::TenantScope;

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Tenants (global scope)
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    /// Fails with `UniqueConflict` when the normalized name is taken.
    fn create(&self, input: CreateTenant) -> impl Future<Output = RegistryResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = RegistryResult<Tenant>> + Send;
    fn get_by_name(&self, name: &str) -> impl Future<Output = RegistryResult<Tenant>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateTenant,
    ) -> impl Future<Output = RegistryResult<Tenant>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = RegistryResult<PaginatedResult<Tenant>>> + Send;
}

// ---------------------------------------------------------------------------
// Users & first-admin lock
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    /// Creates a user with the next employee number. `SuperAdmin` is
    /// rejected here; only [`AdminLockRepository`] may create one.
    fn create(
        &self,
        scope: TenantScope,
        input: CreateUser,
    ) -> impl Future<Output = RegistryResult<User>> + Send;
    fn get_by_id(
        &self,
        scope: TenantScope,
        id: Uuid,
    ) -> impl Future<Output = RegistryResult<User>> + Send;
    fn get_by_email(
        &self,
        scope: TenantScope,
        email: &str,
    ) -> impl Future<Output = RegistryResult<User>> + Send;
    fn list(
        &self,
        scope: TenantScope,
        pagination: Pagination,
    ) -> impl Future<Output = RegistryResult<PaginatedResult<User>>> + Send;
    fn update_role(
        &self,
        scope: TenantScope,
        id: Uuid,
        role: Role,
    ) -> impl Future<Output = RegistryResult<User>> + Send;
    /// Activate (`true`) or deactivate (`false`) an account.
    fn set_active(
        &self,
        scope: TenantScope,
        id: Uuid,
        active: bool,
    ) -> impl Future<Output = RegistryResult<User>> + Send;
    fn update_profile(
        &self,
        scope: TenantScope,
        id: Uuid,
        input: UpdateUserProfile,
    ) -> impl Future<Output = RegistryResult<User>> + Send;
    /// The subset of `ids` that belong to users of this tenant.
    fn existing_ids(
        &self,
        scope: TenantScope,
        ids: BTreeSet<Uuid>,
    ) -> impl Future<Output = RegistryResult<BTreeSet<Uuid>>> + Send;
}

/// The first-admin exclusivity mechanism.
pub trait AdminLockRepository: Send + Sync {
    /// Claim the tenant's lock and create its super-admin atomically.
    /// The role in `input` is ignored and forced to `SuperAdmin`.
    fn claim_first_admin(
        &self,
        scope: TenantScope,
        input: CreateUser,
    ) -> impl Future<Output = RegistryResult<FirstAdminOutcome>> + Send;
    fn get(&self, scope: TenantScope) -> impl Future<Output = RegistryResult<AdminLock>> + Send;
    /// Write missing locks for tenants that already have an administrator.
    /// Idempotent; per-tenant failures are counted, not raised.
    fn backfill(&self) -> impl Future<Output = RegistryResult<BackfillReport>> + Send;
}

pub trait InvitationRepository: Send + Sync {
    /// Returns the invitation and the raw token; only its hash is stored.
    fn create(
        &self,
        scope: TenantScope,
        input: CreateInvitation,
    ) -> impl Future<Output = RegistryResult<(Invitation, String)>> + Send;
    fn get_by_id(
        &self,
        scope: TenantScope,
        id: Uuid,
    ) -> impl Future<Output = RegistryResult<Invitation>> + Send;
    fn list(
        &self,
        scope: TenantScope,
        pagination: Pagination,
    ) -> impl Future<Output = RegistryResult<PaginatedResult<Invitation>>> + Send;
    /// Mark a pending invitation expired.
    fn expire(
        &self,
        scope: TenantScope,
        id: Uuid,
    ) -> impl Future<Output = RegistryResult<Invitation>> + Send;
    /// Consume a token exactly once, creating the user in the same
    /// transaction. Unknown or consumed tokens are `NotFound`; tokens past
    /// `expires_at` (relative to `now`) are flipped to expired and rejected.
    fn accept(
        &self,
        raw_token: &str,
        input: AcceptInvitation,
        now: chrono::DateTime<chrono::Utc>,
    ) -> impl Future<Output = RegistryResult<(User, Invitation)>> + Send;
}

// ---------------------------------------------------------------------------
// Assets & licenses
// ---------------------------------------------------------------------------

pub trait AssetRepository: Send + Sync {
    fn create(
        &self,
        scope: TenantScope,
        input: CreateAsset,
    ) -> impl Future<Output = RegistryResult<Asset>> + Send;
    fn get_by_id(
        &self,
        scope: TenantScope,
        id: Uuid,
    ) -> impl Future<Output = RegistryResult<Asset>> + Send;
    fn list(
        &self,
        scope: TenantScope,
        filter: AssetFilter,
        pagination: Pagination,
    ) -> impl Future<Output = RegistryResult<PaginatedResult<Asset>>> + Send;
    /// Every asset of the tenant; used by read-only aggregation.
    fn list_all(
        &self,
        scope: TenantScope,
    ) -> impl Future<Output = RegistryResult<Vec<Asset>>> + Send;
    fn update(
        &self,
        scope: TenantScope,
        id: Uuid,
        input: UpdateAsset,
    ) -> impl Future<Output = RegistryResult<Asset>> + Send;
    fn delete(&self, scope: TenantScope, id: Uuid)
    -> impl Future<Output = RegistryResult<()>> + Send;
    /// Insert all rows in one transaction: either every row is stored or
    /// none is.
    fn create_bulk(
        &self,
        scope: TenantScope,
        rows: Vec<CreateAsset>,
    ) -> impl Future<Output = RegistryResult<Vec<Asset>>> + Send;
    fn count_by_type_and_status(
        &self,
        scope: TenantScope,
    ) -> impl Future<Output = RegistryResult<Vec<AssetCount>>> + Send;
}

pub trait LicenseRepository: Send + Sync {
    fn create(
        &self,
        scope: TenantScope,
        input: CreateLicense,
    ) -> impl Future<Output = RegistryResult<SoftwareLicense>> + Send;
    fn get_by_id(
        &self,
        scope: TenantScope,
        id: Uuid,
    ) -> impl Future<Output = RegistryResult<SoftwareLicense>> + Send;
    fn list(
        &self,
        scope: TenantScope,
        pagination: Pagination,
    ) -> impl Future<Output = RegistryResult<PaginatedResult<SoftwareLicense>>> + Send;
    fn list_all(
        &self,
        scope: TenantScope,
    ) -> impl Future<Output = RegistryResult<Vec<SoftwareLicense>>> + Send;
    fn update(
        &self,
        scope: TenantScope,
        id: Uuid,
        input: UpdateLicense,
    ) -> impl Future<Output = RegistryResult<SoftwareLicense>> + Send;
    fn delete(&self, scope: TenantScope, id: Uuid)
    -> impl Future<Output = RegistryResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Tickets
// ---------------------------------------------------------------------------

pub trait TicketRepository: Send + Sync {
    /// Creates the ticket with a freshly sequenced number and its
    /// `created` activity in one transaction.
    fn create(
        &self,
        scope: TenantScope,
        input: CreateTicket,
    ) -> impl Future<Output = RegistryResult<Ticket>> + Send;
    fn get_by_id(
        &self,
        scope: TenantScope,
        id: Uuid,
    ) -> impl Future<Output = RegistryResult<Ticket>> + Send;
    fn get_by_number(
        &self,
        scope: TenantScope,
        ticket_number: &str,
    ) -> impl Future<Output = RegistryResult<Ticket>> + Send;
    fn list(
        &self,
        scope: TenantScope,
        filter: TicketFilter,
        pagination: Pagination,
    ) -> impl Future<Output = RegistryResult<PaginatedResult<Ticket>>> + Send;
    fn list_by_assignee(
        &self,
        scope: TenantScope,
        assignee_id: Uuid,
    ) -> impl Future<Output = RegistryResult<Vec<Ticket>>> + Send;
    fn list_by_requestor(
        &self,
        scope: TenantScope,
        requestor_id: Uuid,
    ) -> impl Future<Output = RegistryResult<Vec<Ticket>>> + Send;
    fn assign(
        &self,
        scope: TenantScope,
        id: Uuid,
        assignee_id: Uuid,
        actor: TicketActor,
    ) -> impl Future<Output = RegistryResult<Ticket>> + Send;
    fn update_status(
        &self,
        scope: TenantScope,
        id: Uuid,
        change: StatusChange,
        actor: TicketActor,
    ) -> impl Future<Output = RegistryResult<Ticket>> + Send;
    fn add_comment(
        &self,
        scope: TenantScope,
        ticket_id: Uuid,
        input: CreateComment,
    ) -> impl Future<Output = RegistryResult<TicketComment>> + Send;
    fn list_comments(
        &self,
        scope: TenantScope,
        ticket_id: Uuid,
    ) -> impl Future<Output = RegistryResult<Vec<TicketComment>>> + Send;
    fn list_activities(
        &self,
        scope: TenantScope,
        ticket_id: Uuid,
    ) -> impl Future<Output = RegistryResult<Vec<TicketActivity>>> + Send;
    /// Deletes comments, activities and the ticket in one transaction.
    fn delete(&self, scope: TenantScope, id: Uuid)
    -> impl Future<Output = RegistryResult<()>> + Send;
    fn count_by_status(
        &self,
        scope: TenantScope,
    ) -> impl Future<Output = RegistryResult<Vec<TicketStatusCount>>> + Send;
}

// ---------------------------------------------------------------------------
// Master data & preferences
// ---------------------------------------------------------------------------

pub trait MasterDataRepository: Send + Sync {
    fn add(
        &self,
        scope: TenantScope,
        kind: MasterDataKind,
        value: &str,
    ) -> impl Future<Output = RegistryResult<MasterDataEntry>> + Send;
    fn list(
        &self,
        scope: TenantScope,
        kind: Option<MasterDataKind>,
    ) -> impl Future<Output = RegistryResult<Vec<MasterDataEntry>>> + Send;
    /// Distinct values of `kind` starting with `prefix`, for autocomplete.
    fn suggest(
        &self,
        scope: TenantScope,
        kind: MasterDataKind,
        prefix: &str,
        limit: u64,
    ) -> impl Future<Output = RegistryResult<Vec<String>>> + Send;
}

pub trait PreferenceRepository: Send + Sync {
    fn get(
        &self,
        scope: TenantScope,
        user_id: Uuid,
    ) -> impl Future<Output = RegistryResult<UserPreferences>> + Send;
    fn upsert(
        &self,
        scope: TenantScope,
        user_id: Uuid,
        preferences: serde_json::Value,
    ) -> impl Future<Output = RegistryResult<UserPreferences>> + Send;
}

// ---------------------------------------------------------------------------
// Audit (append-only, tenant-scoped)
// ---------------------------------------------------------------------------

/// Query filters for audit log entries.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub from: Option<chrono::DateTime<chrono::Utc>>,
    pub to: Option<chrono::DateTime<chrono::Utc>>,
}

pub trait AuditLogRepository: Send + Sync {
    /// Append a new audit log entry. No update or delete operations exist.
    fn append(
        &self,
        input: CreateAuditLogEntry,
    ) -> impl Future<Output = RegistryResult<AuditLogEntry>> + Send;
    /// Newest first.
    fn list(
        &self,
        scope: TenantScope,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> impl Future<Output = RegistryResult<PaginatedResult<AuditLogEntry>>> + Send;
}
