use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::Identity;
use crate::models::{
    CallTicket, CreateService, CreateTicket, Doctor, NewTicket, Service, TicketChange,
    TicketDetails, TicketStatus, TicketTransition, UpdateService, UpdateTicket,
};
use crate::queue::clock::QueueCalendar;
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::number::validate_format;
use crate::queue::state::{self, ensure_cancelable, ensure_editable, ensure_owner};
use crate::store::TicketStore;

/// A ticket as handed to the view and PDF collaborators, with the action
/// predicates evaluated against the current day.
#[derive(Debug, Clone, Serialize)]
pub struct TicketView {
    #[serde(flatten)]
    pub details: TicketDetails,
    pub can_edit: bool,
    pub can_cancel: bool,
    pub can_print: bool,
}

/// Choices offered when taking or editing a ticket.
#[derive(Debug, Clone, Serialize)]
pub struct TicketForm {
    pub services: Vec<Service>,
    pub doctors: Vec<Doctor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<TicketView>,
}

/// What the PDF renderer needs to produce a downloadable ticket.
#[derive(Debug, Clone, Serialize)]
pub struct TicketDownload {
    pub filename: String,
    pub ticket: TicketView,
}

/// Entry point for every ticket operation. The caller's identity is always an
/// explicit argument.
#[derive(Clone)]
pub struct QueueService {
    store: Arc<dyn TicketStore>,
    calendar: QueueCalendar,
    allocation_timeout: Duration,
}

impl QueueService {
    pub fn new(
        store: Arc<dyn TicketStore>,
        calendar: QueueCalendar,
        allocation_timeout: Duration,
    ) -> Self {
        Self {
            store,
            calendar,
            allocation_timeout,
        }
    }

    fn view(&self, details: TicketDetails) -> TicketView {
        let today = self.calendar.today();
        TicketView {
            can_edit: state::can_edit(&details.ticket, today),
            can_cancel: state::can_cancel(&details.ticket),
            can_print: state::can_print(&details.ticket),
            details,
        }
    }

    async fn load(&self, id: Uuid) -> QueueResult<TicketDetails> {
        self.store
            .find_ticket(id)
            .await?
            .ok_or_else(|| QueueError::not_found("Ticket", id))
    }

    async fn owned(&self, identity: &Identity, id: Uuid) -> QueueResult<TicketDetails> {
        let details = self.load(id).await?;
        ensure_owner(&details.ticket, identity.id)?;
        Ok(details)
    }

    async fn active_service(&self, id: Uuid) -> QueueResult<Service> {
        self.store
            .find_service(id)
            .await?
            .filter(|s| s.is_active)
            .ok_or_else(|| QueueError::not_found("Service", id))
    }

    async fn check_references(
        &self,
        doctor_id: Option<Uuid>,
        counter_id: Option<Uuid>,
    ) -> QueueResult<()> {
        if let Some(doctor_id) = doctor_id {
            if !self.store.doctor_exists(doctor_id).await? {
                return Err(QueueError::Validation(format!("unknown doctor {doctor_id}")));
            }
        }
        if let Some(counter_id) = counter_id {
            if !self.store.counter_exists(counter_id).await? {
                return Err(QueueError::Validation(format!(
                    "unknown counter {counter_id}"
                )));
            }
        }
        Ok(())
    }

    /// Runs an allocating store call under the configured timeout.
    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> QueueResult<T>
    where
        F: Future<Output = QueueResult<T>>,
    {
        match tokio::time::timeout(self.allocation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(QueueError::Timeout {
                operation,
                after: self.allocation_timeout,
            }),
        }
    }

    async fn ensure_no_active_ticket(&self, identity: &Identity) -> QueueResult<()> {
        let today = self.calendar.today();
        match self.store.active_for_owner(identity.id, today).await? {
            Some(active) => Err(QueueError::Conflict(format!(
                "active ticket {} must be finished or canceled first",
                active.number
            ))),
            None => Ok(()),
        }
    }

    // --- owner operations ---

    /// The caller's most recent ticket, if any.
    pub async fn dashboard(&self, identity: &Identity) -> QueueResult<Option<TicketView>> {
        let latest = self.store.latest_for_owner(identity.id).await?;
        Ok(latest.map(|details| self.view(details)))
    }

    pub async fn history(&self, identity: &Identity) -> QueueResult<Vec<TicketView>> {
        let tickets = self.store.history_for_owner(identity.id).await?;
        Ok(tickets.into_iter().map(|details| self.view(details)).collect())
    }

    pub async fn create_form(&self, identity: &Identity) -> QueueResult<TicketForm> {
        self.ensure_no_active_ticket(identity).await?;
        Ok(TicketForm {
            services: self.store.list_active_services().await?,
            doctors: self.store.list_doctors().await?,
            ticket: None,
        })
    }

    pub async fn create(&self, identity: &Identity, input: &CreateTicket) -> QueueResult<TicketView> {
        self.active_service(input.service_id).await?;
        self.check_references(input.doctor_id, input.counter_id)
            .await?;

        let now = self.calendar.now();
        let new = NewTicket {
            owner_id: identity.id,
            service_id: input.service_id,
            doctor_id: input.doctor_id,
            counter_id: input.counter_id,
            queue_date: self.calendar.local_day(now),
            created_at: now,
        };
        let ticket = self
            .bounded("ticket allocation", self.store.insert_ticket(&new))
            .await?;

        info!(
            ticket_id = %ticket.id,
            owner_id = %ticket.owner_id,
            service_id = %ticket.service_id,
            number = %ticket.number,
            "Queue ticket created",
        );

        let details = self.load(ticket.id).await?;
        Ok(self.view(details))
    }

    pub async fn show(&self, identity: &Identity, id: Uuid) -> QueueResult<TicketView> {
        let details = self.owned(identity, id).await?;
        Ok(self.view(details))
    }

    pub async fn edit_form(&self, identity: &Identity, id: Uuid) -> QueueResult<TicketForm> {
        let details = self.owned(identity, id).await?;
        ensure_editable(&details.ticket, self.calendar.today())?;
        Ok(TicketForm {
            services: self.store.list_active_services().await?,
            doctors: self.store.list_doctors().await?,
            ticket: Some(self.view(details)),
        })
    }

    /// Edits a waiting ticket. The number is regenerated only when the
    /// service changes; otherwise the stored number is kept verbatim.
    pub async fn update(
        &self,
        identity: &Identity,
        id: Uuid,
        input: &UpdateTicket,
    ) -> QueueResult<TicketView> {
        let details = self.owned(identity, id).await?;
        let now = self.calendar.now();
        let today = self.calendar.local_day(now);
        ensure_editable(&details.ticket, today)?;

        let renumber = input.service_id != details.ticket.service_id;
        if renumber {
            self.active_service(input.service_id).await?;
        }
        self.check_references(input.doctor_id, input.counter_id)
            .await?;

        let change = TicketChange {
            ticket_id: id,
            owner_id: identity.id,
            service_id: input.service_id,
            doctor_id: input.doctor_id,
            counter_id: input.counter_id,
            today,
            at: now,
        };
        let ticket = self
            .bounded("ticket update", self.store.update_ticket(&change))
            .await?;

        info!(
            ticket_id = %ticket.id,
            previous = %details.ticket.number,
            number = %ticket.number,
            renumbered = renumber,
            "Queue ticket updated",
        );

        let details = self.load(ticket.id).await?;
        Ok(self.view(details))
    }

    pub async fn cancel(&self, identity: &Identity, id: Uuid) -> QueueResult<TicketView> {
        let details = self.owned(identity, id).await?;
        ensure_cancelable(&details.ticket)?;

        let ticket = self
            .store
            .transition(&TicketTransition {
                ticket_id: id,
                from: TicketStatus::Waiting,
                to: TicketStatus::Canceled,
                at: self.calendar.now(),
                counter_id: None,
            })
            .await?;
        info!(ticket_id = %ticket.id, number = %ticket.number, "Queue ticket canceled by owner");

        Ok(self.view(TicketDetails { ticket, ..details }))
    }

    pub async fn print(&self, identity: &Identity, id: Uuid) -> QueueResult<TicketView> {
        let details = self.owned(identity, id).await?;
        Ok(self.view(details))
    }

    /// Canceled tickets are not handed to the PDF renderer.
    pub async fn download(&self, identity: &Identity, id: Uuid) -> QueueResult<TicketDownload> {
        let details = self.owned(identity, id).await?;
        if details.ticket.status == TicketStatus::Canceled {
            return Err(QueueError::InvalidState(format!(
                "ticket {} was canceled and cannot be downloaded",
                details.ticket.number
            )));
        }
        let stamp = self.calendar.local_time(self.calendar.now());
        let filename = format!(
            "tiket-antrian-{}-{}.pdf",
            details.ticket.number,
            stamp.format("%Y%m%d-%H%M%S")
        );
        Ok(TicketDownload {
            filename,
            ticket: self.view(details),
        })
    }

    // --- staff operations ---

    async fn advance(
        &self,
        staff: &Identity,
        id: Uuid,
        to: TicketStatus,
        counter_id: Option<Uuid>,
    ) -> QueueResult<TicketView> {
        staff.require_staff()?;
        self.check_references(None, counter_id).await?;
        let details = self.load(id).await?;
        let from = details.ticket.status;
        from.transition(to)?;

        let ticket = self
            .store
            .transition(&TicketTransition {
                ticket_id: id,
                from,
                to,
                at: self.calendar.now(),
                counter_id,
            })
            .await?;
        info!(
            ticket_id = %ticket.id,
            number = %ticket.number,
            %from,
            %to,
            staff_id = %staff.id,
            "Queue ticket status changed",
        );

        // Reloaded so a newly assigned counter shows up by name.
        let details = self.load(ticket.id).await?;
        Ok(self.view(details))
    }

    pub async fn call(
        &self,
        staff: &Identity,
        id: Uuid,
        input: &CallTicket,
    ) -> QueueResult<TicketView> {
        self.advance(staff, id, TicketStatus::Serving, input.counter_id)
            .await
    }

    pub async fn finish(&self, staff: &Identity, id: Uuid) -> QueueResult<TicketView> {
        self.advance(staff, id, TicketStatus::Finished, None).await
    }

    pub async fn staff_cancel(&self, staff: &Identity, id: Uuid) -> QueueResult<TicketView> {
        self.advance(staff, id, TicketStatus::Canceled, None).await
    }

    /// Today's tickets for one service, in calling order.
    pub async fn service_queue(
        &self,
        staff: &Identity,
        service_id: Uuid,
    ) -> QueueResult<Vec<TicketView>> {
        staff.require_staff()?;
        self.store
            .find_service(service_id)
            .await?
            .ok_or_else(|| QueueError::not_found("Service", service_id))?;
        let tickets = self
            .store
            .service_day_queue(service_id, self.calendar.today())
            .await?;
        Ok(tickets.into_iter().map(|details| self.view(details)).collect())
    }

    // --- reference data ---

    pub async fn list_services(&self) -> QueueResult<Vec<Service>> {
        self.store.list_active_services().await
    }

    pub async fn list_doctors(&self) -> QueueResult<Vec<Doctor>> {
        self.store.list_doctors().await
    }

    pub async fn create_service(
        &self,
        admin: &Identity,
        input: &CreateService,
    ) -> QueueResult<Service> {
        admin.require_admin()?;
        if input.name.trim().is_empty() {
            return Err(QueueError::Validation("service name is required".to_string()));
        }
        validate_format(&input.prefix, input.padding)?;
        self.store.create_service(input).await
    }

    /// Prefix and padding are frozen once the service has issued a ticket.
    pub async fn update_service(
        &self,
        admin: &Identity,
        id: Uuid,
        input: &UpdateService,
    ) -> QueueResult<Service> {
        admin.require_admin()?;
        if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(QueueError::Validation("service name is required".to_string()));
        }
        let service = self.store.update_service(id, input).await?;
        info!(service_id = %service.id, prefix = %service.prefix, "Service updated");
        Ok(service)
    }
}
