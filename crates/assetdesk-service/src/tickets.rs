//! Audited ticket workflow.

use assetdesk_core::TenantScope;
use assetdesk_core::error::RegistryResult;
use assetdesk_core::models::ticket::{
    CreateComment, CreateTicket, StatusChange, Ticket, TicketActor, TicketComment,
};
use assetdesk_core::models::user::User;
use assetdesk_core::repository::{AuditLogRepository, TicketRepository};
use serde_json::json;
use uuid::Uuid;

use crate::audit::{AuditContext, AuditEvent, AuditLogger};

fn ticket_actor(user: &User) -> TicketActor {
    TicketActor {
        user_id: Some(user.id),
        name: user.display_name(),
    }
}

pub struct TicketService<T: TicketRepository, A: AuditLogRepository> {
    tickets: T,
    audit: AuditLogger<A>,
}

impl<T: TicketRepository, A: AuditLogRepository> TicketService<T, A> {
    pub fn new(tickets: T, audit: AuditLogger<A>) -> Self {
        Self { tickets, audit }
    }

    pub async fn open(&self, actor: &User, input: CreateTicket) -> RegistryResult<Ticket> {
        let ticket = self
            .tickets
            .create(TenantScope::new(actor.tenant_id), input)
            .await?;
        self.audit
            .record(
                &AuditContext::user(actor),
                AuditEvent::new("ticket.create", "ticket")
                    .resource(ticket.id)
                    .after(&ticket),
            )
            .await;
        Ok(ticket)
    }

    pub async fn assign(&self, actor: &User, id: Uuid, assignee_id: Uuid) -> RegistryResult<Ticket> {
        let scope = TenantScope::new(actor.tenant_id);
        let before = self.tickets.get_by_id(scope, id).await?;
        let after = self
            .tickets
            .assign(scope, id, assignee_id, ticket_actor(actor))
            .await?;
        self.audit
            .record(
                &AuditContext::user(actor),
                AuditEvent::new("ticket.assign", "ticket")
                    .resource(id)
                    .before(&json!({ "assignee_id": before.assignee_id }))
                    .after(&json!({ "assignee_id": after.assignee_id })),
            )
            .await;
        Ok(after)
    }

    pub async fn change_status(
        &self,
        actor: &User,
        id: Uuid,
        change: StatusChange,
    ) -> RegistryResult<Ticket> {
        let scope = TenantScope::new(actor.tenant_id);
        let before = self.tickets.get_by_id(scope, id).await?;
        let after = self
            .tickets
            .update_status(scope, id, change, ticket_actor(actor))
            .await?;
        self.audit
            .record(
                &AuditContext::user(actor),
                AuditEvent::new("ticket.status_change", "ticket")
                    .resource(id)
                    .before(&json!({ "status": before.status }))
                    .after(&json!({ "status": after.status, "resolution": after.resolution })),
            )
            .await;
        Ok(after)
    }

    /// Comment as `actor`; the comment's tenant always comes from the ticket.
    pub async fn comment(
        &self,
        actor: &User,
        ticket_id: Uuid,
        body: &str,
        is_internal: bool,
    ) -> RegistryResult<TicketComment> {
        let comment = self
            .tickets
            .add_comment(
                TenantScope::new(actor.tenant_id),
                ticket_id,
                CreateComment {
                    tenant_id: None,
                    author_id: Some(actor.id),
                    author_name: actor.display_name(),
                    body: body.to_string(),
                    is_internal,
                },
            )
            .await?;
        self.audit
            .record(
                &AuditContext::user(actor),
                AuditEvent::new("ticket.comment", "ticket")
                    .resource(ticket_id)
                    .after(&comment),
            )
            .await;
        Ok(comment)
    }

    pub async fn delete(&self, actor: &User, id: Uuid) -> RegistryResult<()> {
        let scope = TenantScope::new(actor.tenant_id);
        let before = self.tickets.get_by_id(scope, id).await?;
        self.tickets.delete(scope, id).await?;
        self.audit
            .record(
                &AuditContext::user(actor),
                AuditEvent::new("ticket.delete", "ticket")
                    .resource(id)
                    .before(&before),
            )
            .await;
        Ok(())
    }
}
