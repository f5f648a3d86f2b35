//! Support ticket, comment and activity models.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 4] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::Resolved,
        TicketStatus::Closed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in-progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "open" => Some(TicketStatus::Open),
            "in-progress" => Some(TicketStatus::InProgress),
            "resolved" => Some(TicketStatus::Resolved),
            "closed" => Some(TicketStatus::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl TicketPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
            TicketPriority::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(TicketPriority::Low),
            "medium" => Some(TicketPriority::Medium),
            "high" => Some(TicketPriority::High),
            "critical" | "urgent" => Some(TicketPriority::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// `TKT-<6 digits>-<3 chars>`, unique across the whole store.
    pub ticket_number: String,
    pub title: String,
    pub description: String,
    pub priority: TicketPriority,
    pub category: Option<String>,
    pub status: TicketStatus,
    pub requestor_id: Uuid,
    pub requestor_name: String,
    pub assignee_id: Option<Uuid>,
    pub assignee_name: Option<String>,
    pub asset_id: Option<Uuid>,
    pub resolution: Option<String>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTicket {
    pub title: String,
    pub description: String,
    pub priority: TicketPriority,
    pub category: Option<String>,
    pub requestor_id: Uuid,
    pub requestor_name: String,
    pub asset_id: Option<Uuid>,
}

/// Who performed a ticket mutation; recorded on the activity row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketActor {
    pub user_id: Option<Uuid>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: TicketStatus,
    pub resolution: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketComment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub ticket_id: Uuid,
    pub author_id: Option<Uuid>,
    pub author_name: String,
    pub body: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

/// Comment payload as received from the request layer.
///
/// `tenant_id` is whatever the client sent and is never trusted: the
/// stored comment always takes the tenant of the ticket it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateComment {
    pub tenant_id: Option<Uuid>,
    pub author_id: Option<Uuid>,
    pub author_name: String,
    pub body: String,
    pub is_internal: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Created,
    Assigned,
    StatusChanged,
    Commented,
}

impl ActivityType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityType::Created => "created",
            ActivityType::Assigned => "assigned",
            ActivityType::StatusChanged => "status_changed",
            ActivityType::Commented => "commented",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(ActivityType::Created),
            "assigned" => Some(ActivityType::Assigned),
            "status_changed" => Some(ActivityType::StatusChanged),
            "commented" => Some(ActivityType::Commented),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketActivity {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub ticket_id: Uuid,
    pub activity_type: ActivityType,
    pub actor_id: Option<Uuid>,
    pub actor_name: String,
    pub from_value: Option<String>,
    pub to_value: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub assignee_id: Option<Uuid>,
    pub requestor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketStatusCount {
    pub status: TicketStatus,
    pub total: u64,
}
