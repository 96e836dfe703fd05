use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle status of a queue ticket. Stored as the `queue_status` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "queue_status", rename_all = "lowercase")]
pub enum TicketStatus {
    Waiting,
    Serving,
    Finished,
    Canceled,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Waiting => "waiting",
            TicketStatus::Serving => "serving",
            TicketStatus::Finished => "finished",
            TicketStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queue ticket (antrian) as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct QueueTicket {
    pub id: Uuid,
    pub service_id: Uuid,
    pub owner_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub counter_id: Option<Uuid>,
    pub number: String,
    pub sequence: i32,
    /// Local calendar day the number was allocated for.
    pub queue_date: NaiveDate,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub called_at: Option<DateTime<Utc>>,
    pub served_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// A ticket joined with the display names the view and PDF renderers need.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TicketDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub ticket: QueueTicket,
    pub service_name: String,
    pub owner_name: String,
    pub doctor_name: Option<String>,
    pub counter_name: Option<String>,
}

/// Request body for `POST /antrian`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTicket {
    pub service_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub counter_id: Option<Uuid>,
}

/// Request body for `PUT /antrian/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTicket {
    pub service_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub counter_id: Option<Uuid>,
}

/// Request body for the staff call endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallTicket {
    pub counter_id: Option<Uuid>,
}

/// Everything a store needs to insert a fresh `waiting` ticket.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub owner_id: Uuid,
    pub service_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub counter_id: Option<Uuid>,
    pub queue_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// An owner edit of a waiting ticket. `today` is re-checked under the row lock.
#[derive(Debug, Clone)]
pub struct TicketChange {
    pub ticket_id: Uuid,
    pub owner_id: Uuid,
    pub service_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub counter_id: Option<Uuid>,
    pub today: NaiveDate,
    pub at: DateTime<Utc>,
}

/// Compare-and-set status change: applied only while the ticket is still `from`.
#[derive(Debug, Clone)]
pub struct TicketTransition {
    pub ticket_id: Uuid,
    pub from: TicketStatus,
    pub to: TicketStatus,
    pub at: DateTime<Utc>,
    pub counter_id: Option<Uuid>,
}
