//! SurrealDB implementation of [`TicketRepository`].
//!
//! Every write that touches a ticket together with one of its children runs
//! as a single transaction whose first statement re-reads the ticket's
//! owner and throws when it is not the caller's tenant. Child rows take
//! their `tenant_id` from the ticket row, never from the caller.

use std::sync::Arc;

use assetdesk_core::TenantScope;
use assetdesk_core::error::{RegistryError, RegistryResult};
use assetdesk_core::models::ticket::{
    ActivityType, CreateComment, CreateTicket, StatusChange, Ticket, TicketActivity, TicketActor,
    TicketComment, TicketFilter, TicketPriority, TicketStatus, TicketStatusCount,
};
use assetdesk_core::repository::{PaginatedResult, Pagination, TicketRepository};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use surrealdb::Connection;
use surrealdb_types::SurrealValue;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{CountRow, ensure_in_tenant, parse_opt_uuid, parse_uuid, retry_on_conflict, total_of};
use crate::error::{DbError, TICKET_NOT_FOUND};
use crate::sequencer::{MAX_TICKET_NUMBER_ATTEMPTS, TicketNumberSource, TimeRandomSource};
use crate::store::Store;

pub(crate) const TICKET_NUMBER_INDEX: &str = "idx_ticket_number";

const SELECT_TICKET: &str = "SELECT meta::id(id) AS record_id, * FROM ticket";

const SELECT_TICKET_BY_ID: &str = "SELECT meta::id(id) AS record_id, * \
    FROM type::record('ticket', $ticket_id) WHERE tenant_id = $tenant_id";

/// Must stay the first statement of a transaction so that its failure is
/// the one reported.
const OWNER_GUARD: &str = "\
IF (SELECT VALUE tenant_id FROM type::record('ticket', $ticket_id))[0] != $tenant_id \
{ THROW 'ticket_not_found' };";

const TICKET_OWNER: &str = "(SELECT VALUE tenant_id FROM type::record('ticket', $ticket_id))[0]";

#[derive(Debug, SurrealValue)]
struct TicketRow {
    record_id: String,
    tenant_id: String,
    ticket_number: String,
    title: String,
    description: String,
    priority: String,
    category: Option<String>,
    status: String,
    requestor_id: String,
    requestor_name: String,
    assignee_id: Option<String>,
    assignee_name: Option<String>,
    asset_id: Option<String>,
    resolution: Option<String>,
    assigned_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    resolved_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TicketRow {
    fn try_into_ticket(self) -> Result<Ticket, DbError> {
        let priority = TicketPriority::parse(&self.priority)
            .ok_or_else(|| DbError::Decode(format!("unknown priority: {}", self.priority)))?;
        let status = TicketStatus::parse(&self.status)
            .ok_or_else(|| DbError::Decode(format!("unknown ticket status: {}", self.status)))?;
        Ok(Ticket {
            id: parse_uuid(&self.record_id, "ticket")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            ticket_number: self.ticket_number,
            title: self.title,
            description: self.description,
            priority,
            category: self.category,
            status,
            requestor_id: parse_uuid(&self.requestor_id, "requestor")?,
            requestor_name: self.requestor_name,
            assignee_id: parse_opt_uuid(self.assignee_id, "assignee")?,
            assignee_name: self.assignee_name,
            asset_id: parse_opt_uuid(self.asset_id, "asset")?,
            resolution: self.resolution,
            assigned_at: self.assigned_at,
            started_at: self.started_at,
            resolved_at: self.resolved_at,
            closed_at: self.closed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CommentRow {
    record_id: String,
    tenant_id: String,
    ticket_id: String,
    author_id: Option<String>,
    author_name: String,
    body: String,
    is_internal: bool,
    created_at: DateTime<Utc>,
}

impl CommentRow {
    fn try_into_comment(self) -> Result<TicketComment, DbError> {
        Ok(TicketComment {
            id: parse_uuid(&self.record_id, "comment")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            ticket_id: parse_uuid(&self.ticket_id, "ticket")?,
            author_id: parse_opt_uuid(self.author_id, "author")?,
            author_name: self.author_name,
            body: self.body,
            is_internal: self.is_internal,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct ActivityRow {
    record_id: String,
    tenant_id: String,
    ticket_id: String,
    activity_type: String,
    actor_id: Option<String>,
    actor_name: String,
    from_value: Option<String>,
    to_value: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl ActivityRow {
    fn try_into_activity(self) -> Result<TicketActivity, DbError> {
        let activity_type = ActivityType::parse(&self.activity_type).ok_or_else(|| {
            DbError::Decode(format!("unknown activity type: {}", self.activity_type))
        })?;
        Ok(TicketActivity {
            id: parse_uuid(&self.record_id, "activity")?,
            tenant_id: parse_uuid(&self.tenant_id, "tenant")?,
            ticket_id: parse_uuid(&self.ticket_id, "ticket")?,
            activity_type,
            actor_id: parse_opt_uuid(self.actor_id, "actor")?,
            actor_name: self.actor_name,
            from_value: self.from_value,
            to_value: self.to_value,
            notes: self.notes,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct StatusCountRow {
    status: String,
    total: u64,
}

/// Insert `key` only when a value is present, so absent fields stay NONE.
fn put(map: &mut Map<String, Value>, key: &str, value: Option<String>) {
    if let Some(v) = value {
        map.insert(key.into(), Value::String(v));
    }
}

fn ticket_content(tenant_id: Uuid, input: &CreateTicket, number: &str) -> Value {
    let mut map = Map::new();
    map.insert("tenant_id".into(), json!(tenant_id.to_string()));
    map.insert("ticket_number".into(), json!(number));
    map.insert("title".into(), json!(input.title.trim()));
    map.insert("description".into(), json!(input.description));
    map.insert("priority".into(), json!(input.priority.as_str()));
    map.insert("status".into(), json!(TicketStatus::Open.as_str()));
    map.insert("requestor_id".into(), json!(input.requestor_id.to_string()));
    map.insert("requestor_name".into(), json!(input.requestor_name));
    put(&mut map, "category", input.category.clone());
    put(&mut map, "asset_id", input.asset_id.map(|id| id.to_string()));
    Value::Object(map)
}

fn actor_content(actor: &TicketActor) -> Value {
    let mut map = Map::new();
    map.insert("name".into(), json!(actor.name));
    put(&mut map, "user_id", actor.user_id.map(|id| id.to_string()));
    Value::Object(map)
}

/// Field assignments for moving `current` to `change.status`.
fn status_sets(current: &Ticket, change: &StatusChange) -> Vec<&'static str> {
    let mut sets = vec!["status = $status", "updated_at = time::now()"];
    match change.status {
        TicketStatus::Open => {
            sets.push("resolved_at = NONE");
            sets.push("closed_at = NONE");
        }
        TicketStatus::InProgress => {
            if current.started_at.is_none() {
                sets.push("started_at = time::now()");
            }
        }
        TicketStatus::Resolved => sets.push("resolved_at = time::now()"),
        TicketStatus::Closed => {
            sets.push("closed_at = time::now()");
            if current.resolved_at.is_none() {
                sets.push("resolved_at = time::now()");
            }
        }
    }
    if change.resolution.is_some() {
        sets.push("resolution = $resolution");
    }
    sets
}

/// SurrealDB implementation of the Ticket repository.
#[derive(Clone)]
pub struct SurrealTicketRepository<C: Connection> {
    store: Store<C>,
    numbers: Arc<dyn TicketNumberSource>,
}

impl<C: Connection> SurrealTicketRepository<C> {
    pub fn new(store: Store<C>) -> Self {
        Self::with_number_source(store, Arc::new(TimeRandomSource))
    }

    /// Use `numbers` for ticket numbers instead of the time/random source.
    pub fn with_number_source(store: Store<C>, numbers: Arc<dyn TicketNumberSource>) -> Self {
        Self { store, numbers }
    }

    /// Read one ticket; the caller holds a permit.
    async fn fetch(&self, tenant_id: &str, ticket_id: &str) -> Result<Ticket, DbError> {
        let mut result = self
            .store
            .client()
            .query(SELECT_TICKET_BY_ID)
            .bind(("ticket_id", ticket_id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await?;
        let rows: Vec<TicketRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .ok_or(DbError::NotFound {
                entity: "ticket".into(),
                id: ticket_id.to_string(),
            })?
            .try_into_ticket()
    }

    /// Run an owner-guarded transaction on `ticket_id`.
    ///
    /// A failed guard becomes `NotFound` for the ticket; conflicts are
    /// retried.
    async fn run_guarded(
        &self,
        what: &str,
        query: &str,
        tenant_id: &str,
        ticket_id: &str,
        binds: Vec<(&'static str, Value)>,
    ) -> Result<(), DbError> {
        retry_on_conflict(what, || async {
            let mut builder = self
                .store
                .client()
                .query(query)
                .bind(("ticket_id", ticket_id.to_string()))
                .bind(("tenant_id", tenant_id.to_string()));
            for bind in binds.iter().cloned() {
                builder = builder.bind(bind);
            }
            builder
                .await?
                .check()
                .map_err(|e| DbError::from(e).aborted_as_conflict())?;
            Ok(())
        })
        .await
        .map_err(|err| {
            if err.is_thrown(TICKET_NOT_FOUND) {
                DbError::NotFound {
                    entity: "ticket".into(),
                    id: ticket_id.to_string(),
                }
            } else {
                err
            }
        })
    }

    /// One attempt at inserting the ticket and its `created` activity.
    async fn insert_ticket(
        &self,
        ticket_id: &str,
        ticket: Value,
        activity: Value,
    ) -> Result<(), DbError> {
        retry_on_conflict("ticket.create", || async {
            self.store
                .client()
                .query(
                    "BEGIN TRANSACTION; \
                     CREATE type::record('ticket', $ticket_id) CONTENT $ticket; \
                     CREATE type::record('ticket_activity', $activity_id) CONTENT $activity; \
                     COMMIT TRANSACTION;",
                )
                .bind(("ticket_id", ticket_id.to_string()))
                .bind(("activity_id", Uuid::new_v4().to_string()))
                .bind(("ticket", ticket.clone()))
                .bind(("activity", activity.clone()))
                .await?
                .check()
                .map_err(|e| DbError::from(e).aborted_as_conflict())?;
            Ok(())
        })
        .await
    }

    async fn list_where(
        &self,
        scope: TenantScope,
        clause: &str,
        binds: Vec<(&'static str, String)>,
    ) -> RegistryResult<Vec<Ticket>> {
        let _permit = self.store.acquire().await?;
        let query = format!(
            "{SELECT_TICKET} WHERE tenant_id = $tenant_id AND {clause} ORDER BY created_at DESC"
        );
        let mut builder = self
            .store
            .client()
            .query(&query)
            .bind(("tenant_id", scope.tenant_id().to_string()));
        for bind in binds {
            builder = builder.bind(bind);
        }
        let mut result = builder.await.map_err(DbError::from)?;

        let rows: Vec<TicketRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(TicketRow::try_into_ticket)
            .collect::<Result<Vec<_>, DbError>>()?)
    }
}

impl<C: Connection> TicketRepository for SurrealTicketRepository<C> {
    async fn create(&self, scope: TenantScope, input: CreateTicket) -> RegistryResult<Ticket> {
        let _permit = self.store.acquire().await?;
        let tenant_id = scope.tenant_id();
        ensure_in_tenant(self.store.client(), "user", input.requestor_id, tenant_id).await?;
        if let Some(asset_id) = input.asset_id {
            ensure_in_tenant(self.store.client(), "asset", asset_id, tenant_id).await?;
        }

        let ticket_id = Uuid::new_v4().to_string();
        let activity = json!({
            "tenant_id": tenant_id.to_string(),
            "ticket_id": ticket_id,
            "activity_type": ActivityType::Created.as_str(),
            "actor_id": input.requestor_id.to_string(),
            "actor_name": input.requestor_name,
            "to_value": TicketStatus::Open.as_str(),
        });

        for attempt in 1..=MAX_TICKET_NUMBER_ATTEMPTS {
            let number = self.numbers.next_number();
            let ticket = ticket_content(tenant_id, &input, &number);
            match self.insert_ticket(&ticket_id, ticket, activity.clone()).await {
                Ok(()) => {
                    let created = self.fetch(&tenant_id.to_string(), &ticket_id).await?;
                    info!(
                        tenant_id = %tenant_id,
                        ticket_number = %created.ticket_number,
                        attempt,
                        "ticket created"
                    );
                    return Ok(created);
                }
                Err(err) if err.is_unique_violation_on(TICKET_NUMBER_INDEX) => {
                    debug!(ticket_number = %number, attempt, "ticket number collision");
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!(
            tenant_id = %tenant_id,
            attempts = MAX_TICKET_NUMBER_ATTEMPTS,
            "ticket numbering exhausted"
        );
        Err(RegistryError::RetryExhausted {
            operation: "ticket_creation_failed".into(),
            attempts: MAX_TICKET_NUMBER_ATTEMPTS,
        })
    }

    async fn get_by_id(&self, scope: TenantScope, id: Uuid) -> RegistryResult<Ticket> {
        let _permit = self.store.acquire().await?;
        Ok(self
            .fetch(&scope.tenant_id().to_string(), &id.to_string())
            .await?)
    }

    async fn get_by_number(&self, scope: TenantScope, ticket_number: &str) -> RegistryResult<Ticket> {
        let _permit = self.store.acquire().await?;
        let query =
            format!("{SELECT_TICKET} WHERE tenant_id = $tenant_id AND ticket_number = $number");
        let mut result = self
            .store
            .client()
            .query(&query)
            .bind(("tenant_id", scope.tenant_id().to_string()))
            .bind(("number", ticket_number.trim().to_uppercase()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TicketRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "ticket".into(),
            id: ticket_number.to_string(),
        })?;
        Ok(row.try_into_ticket()?)
    }

    async fn list(
        &self,
        scope: TenantScope,
        filter: TicketFilter,
        pagination: Pagination,
    ) -> RegistryResult<PaginatedResult<Ticket>> {
        let _permit = self.store.acquire().await?;
        let mut clause = String::from("tenant_id = $tenant_id");
        let mut binds: Vec<(&'static str, String)> = Vec::new();
        if let Some(status) = filter.status {
            clause.push_str(" AND status = $status");
            binds.push(("status", status.as_str().to_string()));
        }
        if let Some(assignee) = filter.assignee_id {
            clause.push_str(" AND assignee_id = $assignee_id");
            binds.push(("assignee_id", assignee.to_string()));
        }
        if let Some(requestor) = filter.requestor_id {
            clause.push_str(" AND requestor_id = $requestor_id");
            binds.push(("requestor_id", requestor.to_string()));
        }

        let query = format!(
            "SELECT count() AS total FROM ticket WHERE {clause} GROUP ALL; \
             {SELECT_TICKET} WHERE {clause} \
             ORDER BY created_at DESC LIMIT $limit START $offset;"
        );
        let mut builder = self
            .store
            .client()
            .query(&query)
            .bind(("tenant_id", scope.tenant_id().to_string()))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        for bind in binds {
            builder = builder.bind(bind);
        }
        let mut result = builder.await.map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let rows: Vec<TicketRow> = result.take(1).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(TicketRow::try_into_ticket)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total: total_of(&count_rows),
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_by_assignee(
        &self,
        scope: TenantScope,
        assignee_id: Uuid,
    ) -> RegistryResult<Vec<Ticket>> {
        self.list_where(
            scope,
            "assignee_id = $assignee_id",
            vec![("assignee_id", assignee_id.to_string())],
        )
        .await
    }

    async fn list_by_requestor(
        &self,
        scope: TenantScope,
        requestor_id: Uuid,
    ) -> RegistryResult<Vec<Ticket>> {
        self.list_where(
            scope,
            "requestor_id = $requestor_id",
            vec![("requestor_id", requestor_id.to_string())],
        )
        .await
    }

    async fn assign(
        &self,
        scope: TenantScope,
        id: Uuid,
        assignee_id: Uuid,
        actor: TicketActor,
    ) -> RegistryResult<Ticket> {
        let _permit = self.store.acquire().await?;
        let tenant_id = scope.tenant_id().to_string();
        let ticket_id = id.to_string();
        let current = self.fetch(&tenant_id, &ticket_id).await?;

        let mut result = self
            .store
            .client()
            .query(
                "SELECT VALUE string::concat(first_name, ' ', last_name) \
                 FROM type::record('user', $id) WHERE tenant_id = $tenant_id",
            )
            .bind(("id", assignee_id.to_string()))
            .bind(("tenant_id", tenant_id.clone()))
            .await
            .map_err(DbError::from)?;
        let names: Vec<String> = result.take(0).map_err(DbError::from)?;
        let assignee_name = names.into_iter().next().ok_or(DbError::NotFound {
            entity: "user".into(),
            id: assignee_id.to_string(),
        })?;

        let mut activity = Map::new();
        activity.insert("to_value".into(), json!(assignee_name));
        put(&mut activity, "from_value", current.assignee_name);

        let query = format!(
            "BEGIN TRANSACTION; \
             {OWNER_GUARD} \
             UPDATE type::record('ticket', $ticket_id) SET \
                 assignee_id = $assignee_id, assignee_name = $activity.to_value, \
                 assigned_at = time::now(), updated_at = time::now() \
                 WHERE tenant_id = $tenant_id; \
             CREATE type::record('ticket_activity', $activity_id) SET \
                 tenant_id = {TICKET_OWNER}, ticket_id = $ticket_id, \
                 activity_type = 'assigned', actor_id = $actor.user_id, \
                 actor_name = $actor.name, from_value = $activity.from_value, \
                 to_value = $activity.to_value; \
             COMMIT TRANSACTION;"
        );
        self.run_guarded(
            "ticket.assign",
            &query,
            &tenant_id,
            &ticket_id,
            vec![
                ("assignee_id", json!(assignee_id.to_string())),
                ("activity_id", json!(Uuid::new_v4().to_string())),
                ("actor", actor_content(&actor)),
                ("activity", Value::Object(activity)),
            ],
        )
        .await?;

        Ok(self.fetch(&tenant_id, &ticket_id).await?)
    }

    async fn update_status(
        &self,
        scope: TenantScope,
        id: Uuid,
        change: StatusChange,
        actor: TicketActor,
    ) -> RegistryResult<Ticket> {
        let _permit = self.store.acquire().await?;
        let tenant_id = scope.tenant_id().to_string();
        let ticket_id = id.to_string();
        let current = self.fetch(&tenant_id, &ticket_id).await?;

        let mut activity = Map::new();
        activity.insert("from_value".into(), json!(current.status.as_str()));
        activity.insert("to_value".into(), json!(change.status.as_str()));
        put(&mut activity, "notes", change.notes.clone());

        let mut binds = vec![
            ("status", json!(change.status.as_str())),
            ("activity_id", json!(Uuid::new_v4().to_string())),
            ("actor", actor_content(&actor)),
            ("activity", Value::Object(activity)),
        ];
        if let Some(resolution) = &change.resolution {
            binds.push(("resolution", json!(resolution)));
        }

        let query = format!(
            "BEGIN TRANSACTION; \
             {OWNER_GUARD} \
             UPDATE type::record('ticket', $ticket_id) SET {} \
                 WHERE tenant_id = $tenant_id; \
             CREATE type::record('ticket_activity', $activity_id) SET \
                 tenant_id = {TICKET_OWNER}, ticket_id = $ticket_id, \
                 activity_type = 'status_changed', actor_id = $actor.user_id, \
                 actor_name = $actor.name, from_value = $activity.from_value, \
                 to_value = $activity.to_value, notes = $activity.notes; \
             COMMIT TRANSACTION;",
            status_sets(&current, &change).join(", ")
        );
        self.run_guarded("ticket.update_status", &query, &tenant_id, &ticket_id, binds)
            .await?;

        Ok(self.fetch(&tenant_id, &ticket_id).await?)
    }

    async fn add_comment(
        &self,
        scope: TenantScope,
        ticket_id: Uuid,
        input: CreateComment,
    ) -> RegistryResult<TicketComment> {
        let _permit = self.store.acquire().await?;
        let tenant_id = scope.tenant_id().to_string();
        let ticket_id = ticket_id.to_string();
        if let Some(claimed) = input.tenant_id.filter(|t| *t != scope.tenant_id()) {
            debug!(claimed = %claimed, "ignoring tenant carried by comment payload");
        }

        let comment_id = Uuid::new_v4().to_string();
        let mut comment = Map::new();
        comment.insert("author_name".into(), json!(input.author_name));
        comment.insert("body".into(), json!(input.body));
        comment.insert("is_internal".into(), json!(input.is_internal));
        put(&mut comment, "author_id", input.author_id.map(|id| id.to_string()));

        let query = format!(
            "BEGIN TRANSACTION; \
             {OWNER_GUARD} \
             CREATE type::record('ticket_comment', $comment_id) SET \
                 tenant_id = {TICKET_OWNER}, ticket_id = $ticket_id, \
                 author_id = $comment.author_id, author_name = $comment.author_name, \
                 body = $comment.body, is_internal = $comment.is_internal; \
             CREATE type::record('ticket_activity', $activity_id) SET \
                 tenant_id = {TICKET_OWNER}, ticket_id = $ticket_id, \
                 activity_type = 'commented', actor_id = $comment.author_id, \
                 actor_name = $comment.author_name; \
             UPDATE type::record('ticket', $ticket_id) SET updated_at = time::now() \
                 WHERE tenant_id = $tenant_id; \
             COMMIT TRANSACTION;"
        );
        self.run_guarded(
            "ticket.add_comment",
            &query,
            &tenant_id,
            &ticket_id,
            vec![
                ("comment_id", json!(comment_id)),
                ("activity_id", json!(Uuid::new_v4().to_string())),
                ("comment", Value::Object(comment)),
            ],
        )
        .await?;

        let mut result = self
            .store
            .client()
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('ticket_comment', $id) WHERE tenant_id = $tenant_id",
            )
            .bind(("id", comment_id.clone()))
            .bind(("tenant_id", tenant_id))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CommentRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or(DbError::NotFound {
            entity: "ticket_comment".into(),
            id: comment_id,
        })?;
        Ok(row.try_into_comment()?)
    }

    async fn list_comments(
        &self,
        scope: TenantScope,
        ticket_id: Uuid,
    ) -> RegistryResult<Vec<TicketComment>> {
        let _permit = self.store.acquire().await?;
        let tenant_id = scope.tenant_id().to_string();
        let ticket_id = ticket_id.to_string();
        self.fetch(&tenant_id, &ticket_id).await?;

        let mut result = self
            .store
            .client()
            .query(
                "SELECT meta::id(id) AS record_id, * FROM ticket_comment \
                 WHERE tenant_id = $tenant_id AND ticket_id = $ticket_id \
                 ORDER BY created_at ASC",
            )
            .bind(("tenant_id", tenant_id))
            .bind(("ticket_id", ticket_id))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CommentRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(CommentRow::try_into_comment)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn list_activities(
        &self,
        scope: TenantScope,
        ticket_id: Uuid,
    ) -> RegistryResult<Vec<TicketActivity>> {
        let _permit = self.store.acquire().await?;
        let tenant_id = scope.tenant_id().to_string();
        let ticket_id = ticket_id.to_string();
        self.fetch(&tenant_id, &ticket_id).await?;

        let mut result = self
            .store
            .client()
            .query(
                "SELECT meta::id(id) AS record_id, * FROM ticket_activity \
                 WHERE tenant_id = $tenant_id AND ticket_id = $ticket_id \
                 ORDER BY created_at ASC",
            )
            .bind(("tenant_id", tenant_id))
            .bind(("ticket_id", ticket_id))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<ActivityRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(ActivityRow::try_into_activity)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn delete(&self, scope: TenantScope, id: Uuid) -> RegistryResult<()> {
        let _permit = self.store.acquire().await?;
        let tenant_id = scope.tenant_id().to_string();
        let ticket_id = id.to_string();
        let query = format!(
            "BEGIN TRANSACTION; \
             {OWNER_GUARD} \
             DELETE ticket_comment WHERE tenant_id = $tenant_id AND ticket_id = $ticket_id; \
             DELETE ticket_activity WHERE tenant_id = $tenant_id AND ticket_id = $ticket_id; \
             DELETE type::record('ticket', $ticket_id) WHERE tenant_id = $tenant_id; \
             COMMIT TRANSACTION;"
        );
        self.run_guarded("ticket.delete", &query, &tenant_id, &ticket_id, Vec::new())
            .await?;
        info!(tenant_id = %tenant_id, ticket_id = %ticket_id, "ticket deleted");
        Ok(())
    }

    async fn count_by_status(&self, scope: TenantScope) -> RegistryResult<Vec<TicketStatusCount>> {
        let _permit = self.store.acquire().await?;
        let mut result = self
            .store
            .client()
            .query(
                "SELECT status, count() AS total FROM ticket \
                 WHERE tenant_id = $tenant_id GROUP BY status",
            )
            .bind(("tenant_id", scope.tenant_id().to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<StatusCountRow> = result.take(0).map_err(DbError::from)?;
        let mut counts = rows
            .into_iter()
            .map(|row| {
                let status = TicketStatus::parse(&row.status).ok_or_else(|| {
                    DbError::Decode(format!("unknown ticket status: {}", row.status))
                })?;
                Ok(TicketStatusCount {
                    status,
                    total: row.total,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;
        counts.sort_by_key(|c| c.status);
        Ok(counts)
    }
}
