//! Persistence boundary for services, identities and tickets.
//!
//! Every mutating method is a single atomic unit. Implementations must
//! serialize sequence allocation per (service, day) and the
//! one-active-ticket-per-owner-per-day rule themselves; callers never
//! read-then-write across two calls.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{
    CreateService, Doctor, NewTicket, QueueTicket, Service, TicketChange, TicketDetails,
    TicketTransition, UpdateService,
};
use crate::queue::QueueResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryTicketStore;
pub use postgres::PgTicketStore;

#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn find_service(&self, id: Uuid) -> QueueResult<Option<Service>>;

    async fn list_active_services(&self) -> QueueResult<Vec<Service>>;

    async fn create_service(&self, input: &CreateService) -> QueueResult<Service>;

    /// Rejects prefix/padding changes with `Conflict` once the service has
    /// issued any ticket.
    async fn update_service(&self, id: Uuid, input: &UpdateService) -> QueueResult<Service>;

    async fn list_doctors(&self) -> QueueResult<Vec<Doctor>>;

    async fn doctor_exists(&self, id: Uuid) -> QueueResult<bool>;

    async fn counter_exists(&self, id: Uuid) -> QueueResult<bool>;

    async fn find_ticket(&self, id: Uuid) -> QueueResult<Option<TicketDetails>>;

    async fn latest_for_owner(&self, owner_id: Uuid) -> QueueResult<Option<TicketDetails>>;

    /// All tickets of an owner, newest first.
    async fn history_for_owner(&self, owner_id: Uuid) -> QueueResult<Vec<TicketDetails>>;

    async fn active_for_owner(
        &self,
        owner_id: Uuid,
        day: NaiveDate,
    ) -> QueueResult<Option<QueueTicket>>;

    /// Tickets of one service and day in sequence order.
    async fn service_day_queue(
        &self,
        service_id: Uuid,
        day: NaiveDate,
    ) -> QueueResult<Vec<TicketDetails>>;

    /// Checks the owner has no active ticket that day, allocates the next
    /// number and inserts the ticket as `waiting`, all or nothing.
    async fn insert_ticket(&self, new: &NewTicket) -> QueueResult<QueueTicket>;

    /// Applies an owner edit under a row lock, re-checking ownership and
    /// editability. The number is reallocated only when the service changes.
    async fn update_ticket(&self, change: &TicketChange) -> QueueResult<QueueTicket>;

    /// Moves a ticket to `to` only if it is still `from`; otherwise fails with
    /// `InvalidState`.
    async fn transition(&self, transition: &TicketTransition) -> QueueResult<QueueTicket>;
}
