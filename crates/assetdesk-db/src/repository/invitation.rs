//! SurrealDB implementation of [`InvitationRepository`].
//!
//! Only the SHA-256 of an invitation token is stored. Acceptance flips the
//! invitation to `Accepted` with a conditional update and creates the
//! user in the same transaction, so a token can be redeemed once.

use assetdesk_core::TenantScope;
use assetdesk_core::error::{FieldIssue, RegistryError, RegistryResult};
use assetdesk_core::models::invitation::{
    AcceptInvitation, CreateInvitation, Invitation, InvitationStatus,
};
use assetdesk_core::models::user::{CreateUser, Role, User, normalize_email};
use assetdesk_core::repository::{InvitationRepository, PaginatedResult, Pagination};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use surrealdb::Connection;
use surrealdb_types::SurrealValue;
use tracing::info;
use uuid::Uuid;

use super::user::{
    CREATE_USER_STMT, SELECT_USER, SELECT_USER_BY_ID, UserRow, employee_race_as_conflict,
    new_user_content,
};
use super::{CountRow, parse_opt_uuid, parse_uuid, retry_on_conflict, total_of};
use crate::error::{DbError, INVITATION_CONSUMED};
use crate::store::Store;

const SELECT_INVITATION: &str = "SELECT meta::id(id) AS record_id, * FROM invitation";

const SELECT_INVITATION_BY_ID: &str = "SELECT meta::id(id) AS record_id, * \
    FROM type::record('invitation', $id) WHERE tenant_id = $tenant_id";

const ACCEPT_STMT: &str = "\
IF array::len((UPDATE type::record('invitation', $invitation_id) SET \
    status = 'Accepted', accepted_at = time::now() \
    WHERE status = 'Pending' AND tenant_id = $tenant_id RETURN AFTER)) = 0 \
{ THROW 'invitation_consumed' };";

#[derive(Debug, SurrealValue)]
struct InvitationRow {
    record_id: String,
    tenant_id: String,
    email: String,
    role: String,
    token_hash: String,
    status: String,
    invited_by: Option<String>,
    expires_at: DateTime<Utc>,
    accepted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl InvitationRow {
    fn try_into_invitation(self) -> Result<Invitation, DbError> {
        let role = Role::normalize(&self.role)
            .ok_or_else(|| DbError::Decode(format!("unknown role: {}", self.role)))?;
        let status = InvitationStatus::parse(&self.status)
            .ok_or_else(|| DbError::Decode(format!("unknown invitation status: {}", self.status)))?;
        Ok(Invitation {
            id: parse_uuid(&self.record_id, "invitation")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            email: self.email,
            role,
            token_hash: self.token_hash,
            status,
            invited_by: parse_opt_uuid(self.invited_by, "user")?,
            expires_at: self.expires_at,
            accepted_at: self.accepted_at,
            created_at: self.created_at,
        })
    }
}

/// SHA-256 of a raw invitation token, hex encoded.
pub fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// 32 random bytes, base64url without padding.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn first_invitation(rows: Vec<InvitationRow>, id: String) -> Result<Invitation, DbError> {
    rows.into_iter()
        .next()
        .ok_or(DbError::NotFound {
            entity: "invitation".into(),
            id,
        })?
        .try_into_invitation()
}

/// SurrealDB implementation of the Invitation repository.
#[derive(Clone)]
pub struct SurrealInvitationRepository<C: Connection> {
    store: Store<C>,
}

impl<C: Connection> SurrealInvitationRepository<C> {
    pub fn new(store: Store<C>) -> Self {
        Self { store }
    }

    async fn fetch(&self, tenant_id: Uuid, id: Uuid) -> Result<Invitation, DbError> {
        let mut result = self
            .store
            .client()
            .query(SELECT_INVITATION_BY_ID)
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await?;
        let rows: Vec<InvitationRow> = result.take(0)?;
        first_invitation(rows, id.to_string())
    }

    async fn mark_expired(&self, tenant_id: Uuid, id: Uuid) -> Result<(), DbError> {
        self.store
            .client()
            .query(
                "UPDATE type::record('invitation', $id) SET status = 'Expired' \
                 WHERE tenant_id = $tenant_id AND status = 'Pending'",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await?
            .check()?;
        Ok(())
    }
}

impl<C: Connection> InvitationRepository for SurrealInvitationRepository<C> {
    async fn create(
        &self,
        scope: TenantScope,
        input: CreateInvitation,
    ) -> RegistryResult<(Invitation, String)> {
        if input.role == Role::SuperAdmin {
            return Err(RegistryError::AuthorizationDenied {
                reason: "super-admin cannot be invited".into(),
            });
        }
        let _permit = self.store.acquire().await?;
        let id_str = Uuid::new_v4().to_string();
        let raw_token = generate_token();

        let query = format!(
            "CREATE type::record('invitation', $id) SET \
             tenant_id = $tenant_id, email = $email, role = $role, \
             token_hash = $token_hash, status = 'Pending', \
             invited_by = $invited_by, expires_at = $expires_at; \
             {SELECT_INVITATION_BY_ID};"
        );
        let result = self
            .store
            .client()
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", scope.tenant_id().to_string()))
            .bind(("email", normalize_email(&input.email)))
            .bind(("role", input.role.as_str().to_string()))
            .bind(("token_hash", hash_token(&raw_token)))
            .bind(("invited_by", input.invited_by.map(|u| u.to_string())))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<InvitationRow> = result.take(1).map_err(DbError::from)?;
        let invitation = first_invitation(rows, id_str)?;
        Ok((invitation, raw_token))
    }

    async fn get_by_id(&self, scope: TenantScope, id: Uuid) -> RegistryResult<Invitation> {
        let _permit = self.store.acquire().await?;
        Ok(self.fetch(scope.tenant_id(), id).await?)
    }

    async fn list(
        &self,
        scope: TenantScope,
        pagination: Pagination,
    ) -> RegistryResult<PaginatedResult<Invitation>> {
        let _permit = self.store.acquire().await?;
        let query = format!(
            "SELECT count() AS total FROM invitation WHERE tenant_id = $tenant_id GROUP ALL; \
             {SELECT_INVITATION} WHERE tenant_id = $tenant_id \
             ORDER BY created_at DESC LIMIT $limit START $offset;"
        );
        let mut result = self
            .store
            .client()
            .query(&query)
            .bind(("tenant_id", scope.tenant_id().to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<InvitationRow> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(InvitationRow::try_into_invitation)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: total_of(&count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn expire(&self, scope: TenantScope, id: Uuid) -> RegistryResult<Invitation> {
        let _permit = self.store.acquire().await?;
        self.mark_expired(scope.tenant_id(), id).await?;
        Ok(self.fetch(scope.tenant_id(), id).await?)
    }

    async fn accept(
        &self,
        raw_token: &str,
        input: AcceptInvitation,
        now: DateTime<Utc>,
    ) -> RegistryResult<(User, Invitation)> {
        let _permit = self.store.acquire().await?;
        let query = format!("{SELECT_INVITATION} WHERE token_hash = $token_hash");
        let mut result = self
            .store
            .client()
            .query(&query)
            .bind(("token_hash", hash_token(raw_token)))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<InvitationRow> = result.take(0).map_err(DbError::from)?;
        // Unknown and already-used tokens are indistinguishable to the caller.
        let invitation = first_invitation(rows, "token".into())?;
        let tenant_id = invitation.tenant_id;

        match invitation.status {
            InvitationStatus::Accepted => {
                return Err(RegistryError::not_found("invitation", "token"));
            }
            InvitationStatus::Expired => {
                return Err(RegistryError::invalid(FieldIssue::invalid_value(
                    "token",
                    "invitation has expired",
                )));
            }
            InvitationStatus::Pending if invitation.expires_at <= now => {
                self.mark_expired(tenant_id, invitation.id).await?;
                info!(invitation_id = %invitation.id, "invitation expired on use");
                return Err(RegistryError::invalid(FieldIssue::invalid_value(
                    "token",
                    "invitation has expired",
                )));
            }
            InvitationStatus::Pending => {}
        }

        let query = format!("{SELECT_USER} WHERE tenant_id = $tenant_id AND email = $email");
        let mut result = self
            .store
            .client()
            .query(&query)
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("email", invitation.email.clone()))
            .await
            .map_err(DbError::from)?;
        let existing: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        if !existing.is_empty() {
            return Err(RegistryError::UniqueConflict {
                index: "idx_user_tenant_email".into(),
            });
        }

        let user_id = Uuid::new_v4().to_string();
        let content = new_user_content(
            tenant_id,
            &CreateUser {
                email: invitation.email.clone(),
                first_name: input.first_name,
                last_name: input.last_name,
                password_hash: input.password_hash,
                role: invitation.role,
            },
            invitation.role,
        );
        let query = format!(
            "BEGIN TRANSACTION; \
             {ACCEPT_STMT} \
             {CREATE_USER_STMT} \
             COMMIT TRANSACTION;"
        );

        let accepted = retry_on_conflict("invitation.accept", || async {
            self.store
                .client()
                .query(&query)
                .bind(("invitation_id", invitation.id.to_string()))
                .bind(("tenant_id", tenant_id.to_string()))
                .bind(("user_id", user_id.clone()))
                .bind(("user", content.clone()))
                .await?
                .check()
                .map_err(|e| employee_race_as_conflict(DbError::from(e)).aborted_as_conflict())?;
            Ok(())
        })
        .await;

        match accepted {
            Ok(()) => {}
            Err(err) if err.is_thrown(INVITATION_CONSUMED) => {
                return Err(RegistryError::not_found("invitation", "token"));
            }
            Err(err) => return Err(err.into()),
        }

        let mut result = self
            .store
            .client()
            .query(SELECT_USER_BY_ID)
            .bind(("id", user_id.clone()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let user = rows
            .into_iter()
            .next()
            .ok_or(DbError::NotFound {
                entity: "user".into(),
                id: user_id,
            })?
            .try_into_user()?;
        let invitation = self.fetch(tenant_id, invitation.id).await?;

        info!(tenant_id = %tenant_id, user_id = %user.id, "invitation accepted");
        Ok((user, invitation))
    }
}
