//! Ticket lifecycle.
//!
//! ```text
//! waiting ──call──▶ serving ──finish──▶ finished
//!    │
//!    └──cancel──▶ canceled
//! ```

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{QueueTicket, TicketStatus};
use crate::queue::error::{QueueError, QueueResult};

impl TicketStatus {
    pub const ACTIVE: [TicketStatus; 2] = [TicketStatus::Waiting, TicketStatus::Serving];

    /// Active tickets count against the one-ticket-per-owner-per-day limit.
    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    pub fn can_transition_to(self, next: TicketStatus) -> bool {
        matches!(
            (self, next),
            (TicketStatus::Waiting, TicketStatus::Serving)
                | (TicketStatus::Serving, TicketStatus::Finished)
                | (TicketStatus::Waiting, TicketStatus::Canceled)
        )
    }

    pub fn transition(self, next: TicketStatus) -> QueueResult<TicketStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(QueueError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

/// Owners may change a ticket only while it waits and only on its own day.
pub fn can_edit(ticket: &QueueTicket, today: NaiveDate) -> bool {
    ticket.status == TicketStatus::Waiting && ticket.queue_date == today
}

pub fn can_cancel(ticket: &QueueTicket) -> bool {
    ticket.status == TicketStatus::Waiting
}

pub fn can_print(_ticket: &QueueTicket) -> bool {
    true
}

pub fn ensure_owner(ticket: &QueueTicket, owner_id: Uuid) -> QueueResult<()> {
    if ticket.owner_id == owner_id {
        Ok(())
    } else {
        Err(QueueError::Forbidden(format!(
            "ticket {} belongs to another user",
            ticket.id
        )))
    }
}

pub fn ensure_editable(ticket: &QueueTicket, today: NaiveDate) -> QueueResult<()> {
    if can_edit(ticket, today) {
        Ok(())
    } else {
        Err(QueueError::InvalidState(format!(
            "ticket {} is {} for {} and can no longer be edited",
            ticket.number, ticket.status, ticket.queue_date
        )))
    }
}

pub fn ensure_cancelable(ticket: &QueueTicket) -> QueueResult<()> {
    if can_cancel(ticket) {
        Ok(())
    } else {
        Err(QueueError::InvalidState(format!(
            "ticket {} is {} and can no longer be canceled",
            ticket.number, ticket.status
        )))
    }
}
