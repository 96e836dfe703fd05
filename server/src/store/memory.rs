//! In-process [`TicketStore`] used by tests and local demos.
//!
//! A single mutex guards all state, so every trait method is trivially atomic.
//! Sequences follow the same rule as the database: a per-(service, day)
//! counter that never moves backwards, seeded from the highest number already
//! issued for that day.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    Counter, CreateService, Doctor, NewTicket, QueueTicket, Service, TicketChange, TicketDetails,
    TicketStatus, TicketTransition, UpdateService, User,
};
use crate::queue::number::{format_number, next_sequence, validate_format};
use crate::queue::state::{ensure_editable, ensure_owner};
use crate::queue::{QueueError, QueueResult};
use crate::store::TicketStore;

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    services: HashMap<Uuid, Service>,
    doctors: HashMap<Uuid, Doctor>,
    counters: HashMap<Uuid, Counter>,
    tickets: Vec<QueueTicket>,
    sequences: HashMap<(Uuid, NaiveDate), i32>,
}

impl MemoryState {
    fn details(&self, ticket: &QueueTicket) -> TicketDetails {
        TicketDetails {
            ticket: ticket.clone(),
            service_name: self
                .services
                .get(&ticket.service_id)
                .map(|s| s.name.clone())
                .unwrap_or_default(),
            owner_name: self
                .users
                .get(&ticket.owner_id)
                .map(|u| u.name.clone())
                .unwrap_or_default(),
            doctor_name: ticket
                .doctor_id
                .and_then(|id| self.doctors.get(&id))
                .map(|d| d.name.clone()),
            counter_name: ticket
                .counter_id
                .and_then(|id| self.counters.get(&id))
                .map(|c| c.name.clone()),
        }
    }

    fn active_service(&self, id: Uuid) -> QueueResult<Service> {
        self.services
            .get(&id)
            .filter(|s| s.is_active)
            .cloned()
            .ok_or_else(|| QueueError::not_found("Service", id))
    }

    /// Same counter rule as the Postgres store: numbers vacated by a service
    /// change are never reissued, leaving an intended gap.
    fn allocate(&mut self, service: &Service, day: NaiveDate) -> i32 {
        let issued = next_sequence(
            &service.prefix,
            self.tickets
                .iter()
                .filter(|t| t.service_id == service.id && t.queue_date == day)
                .map(|t| t.number.as_str()),
        );
        let last = self.sequences.entry((service.id, day)).or_insert(0);
        *last = (*last + 1).max(issued);
        *last
    }

    fn active_for(&self, owner_id: Uuid, day: NaiveDate) -> Option<&QueueTicket> {
        self.tickets
            .iter()
            .find(|t| t.owner_id == owner_id && t.queue_date == day && t.status.is_active())
    }
}

#[derive(Default)]
pub struct MemoryTicketStore {
    state: Mutex<MemoryState>,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, name: &str, role: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            role: role.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.state.lock().await.users.insert(user.id, user.clone());
        user
    }

    pub async fn add_service(&self, name: &str, prefix: &str, padding: i32) -> Service {
        let now = Utc::now();
        let service = Service {
            id: Uuid::new_v4(),
            name: name.to_string(),
            prefix: prefix.to_string(),
            padding,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .await
            .services
            .insert(service.id, service.clone());
        service
    }

    pub async fn add_doctor(&self, name: &str, specialty: Option<&str>) -> Doctor {
        let doctor = Doctor {
            id: Uuid::new_v4(),
            name: name.to_string(),
            specialty: specialty.map(str::to_string),
            schedule: None,
            created_at: Utc::now(),
        };
        self.state
            .lock()
            .await
            .doctors
            .insert(doctor.id, doctor.clone());
        doctor
    }

    pub async fn add_counter(&self, name: &str) -> Counter {
        let counter = Counter {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.state
            .lock()
            .await
            .counters
            .insert(counter.id, counter.clone());
        counter
    }

    /// Inserts a ticket as-is, bypassing allocation. For seeding history.
    pub async fn put_ticket(&self, ticket: QueueTicket) {
        self.state.lock().await.tickets.push(ticket);
    }

    pub async fn tickets(&self) -> Vec<QueueTicket> {
        self.state.lock().await.tickets.clone()
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn find_service(&self, id: Uuid) -> QueueResult<Option<Service>> {
        Ok(self.state.lock().await.services.get(&id).cloned())
    }

    async fn list_active_services(&self) -> QueueResult<Vec<Service>> {
        let state = self.state.lock().await;
        let mut services: Vec<Service> = state
            .services
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(services)
    }

    async fn create_service(&self, input: &CreateService) -> QueueResult<Service> {
        let now = Utc::now();
        let service = Service {
            id: Uuid::new_v4(),
            name: input.name.clone(),
            prefix: input.prefix.clone(),
            padding: input.padding,
            is_active: input.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        self.state
            .lock()
            .await
            .services
            .insert(service.id, service.clone());
        Ok(service)
    }

    async fn update_service(&self, id: Uuid, input: &UpdateService) -> QueueResult<Service> {
        let mut state = self.state.lock().await;
        let current = state
            .services
            .get(&id)
            .cloned()
            .ok_or_else(|| QueueError::not_found("Service", id))?;

        if input.changes_numbering(&current) {
            if state.tickets.iter().any(|t| t.service_id == id) {
                return Err(QueueError::Conflict(format!(
                    "service {id} has issued tickets; its prefix and padding are frozen"
                )));
            }
            validate_format(
                input.prefix.as_deref().unwrap_or(&current.prefix),
                input.padding.unwrap_or(current.padding),
            )?;
        }

        let service = Service {
            name: input.name.clone().unwrap_or(current.name),
            prefix: input.prefix.clone().unwrap_or(current.prefix),
            padding: input.padding.unwrap_or(current.padding),
            is_active: input.is_active.unwrap_or(current.is_active),
            updated_at: Utc::now(),
            ..current
        };
        state.services.insert(id, service.clone());
        Ok(service)
    }

    async fn list_doctors(&self) -> QueueResult<Vec<Doctor>> {
        let state = self.state.lock().await;
        let mut doctors: Vec<Doctor> = state.doctors.values().cloned().collect();
        doctors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(doctors)
    }

    async fn doctor_exists(&self, id: Uuid) -> QueueResult<bool> {
        Ok(self.state.lock().await.doctors.contains_key(&id))
    }

    async fn counter_exists(&self, id: Uuid) -> QueueResult<bool> {
        Ok(self.state.lock().await.counters.contains_key(&id))
    }

    async fn find_ticket(&self, id: Uuid) -> QueueResult<Option<TicketDetails>> {
        let state = self.state.lock().await;
        Ok(state
            .tickets
            .iter()
            .find(|t| t.id == id)
            .map(|t| state.details(t)))
    }

    async fn latest_for_owner(&self, owner_id: Uuid) -> QueueResult<Option<TicketDetails>> {
        let state = self.state.lock().await;
        Ok(state
            .tickets
            .iter()
            .filter(|t| t.owner_id == owner_id)
            .max_by_key(|t| t.created_at)
            .map(|t| state.details(t)))
    }

    async fn history_for_owner(&self, owner_id: Uuid) -> QueueResult<Vec<TicketDetails>> {
        let state = self.state.lock().await;
        let mut tickets: Vec<&QueueTicket> = state
            .tickets
            .iter()
            .filter(|t| t.owner_id == owner_id)
            .collect();
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tickets.into_iter().map(|t| state.details(t)).collect())
    }

    async fn active_for_owner(
        &self,
        owner_id: Uuid,
        day: NaiveDate,
    ) -> QueueResult<Option<QueueTicket>> {
        Ok(self.state.lock().await.active_for(owner_id, day).cloned())
    }

    async fn service_day_queue(
        &self,
        service_id: Uuid,
        day: NaiveDate,
    ) -> QueueResult<Vec<TicketDetails>> {
        let state = self.state.lock().await;
        let mut tickets: Vec<&QueueTicket> = state
            .tickets
            .iter()
            .filter(|t| t.service_id == service_id && t.queue_date == day)
            .collect();
        tickets.sort_by_key(|t| t.sequence);
        Ok(tickets.into_iter().map(|t| state.details(t)).collect())
    }

    async fn insert_ticket(&self, new: &NewTicket) -> QueueResult<QueueTicket> {
        let mut state = self.state.lock().await;

        if !state.users.contains_key(&new.owner_id) {
            return Err(QueueError::not_found("User", new.owner_id));
        }
        let service = state.active_service(new.service_id)?;
        if let Some(active) = state.active_for(new.owner_id, new.queue_date) {
            return Err(QueueError::Conflict(format!(
                "owner already holds active ticket {} for {}",
                active.number, active.queue_date
            )));
        }

        let sequence = state.allocate(&service, new.queue_date);
        let ticket = QueueTicket {
            id: Uuid::new_v4(),
            service_id: service.id,
            owner_id: new.owner_id,
            doctor_id: new.doctor_id,
            counter_id: new.counter_id,
            number: format_number(&service.prefix, service.padding, sequence),
            sequence,
            queue_date: new.queue_date,
            status: TicketStatus::Waiting,
            created_at: new.created_at,
            called_at: None,
            served_at: None,
            canceled_at: None,
            finished_at: None,
            updated_at: new.created_at,
        };
        state.tickets.push(ticket.clone());
        Ok(ticket)
    }

    async fn update_ticket(&self, change: &TicketChange) -> QueueResult<QueueTicket> {
        let mut state = self.state.lock().await;

        let index = state
            .tickets
            .iter()
            .position(|t| t.id == change.ticket_id)
            .ok_or_else(|| QueueError::not_found("Ticket", change.ticket_id))?;
        let current = state.tickets[index].clone();
        ensure_owner(&current, change.owner_id)?;
        ensure_editable(&current, change.today)?;

        let mut updated = current.clone();
        if change.service_id != current.service_id {
            let service = state.active_service(change.service_id)?;
            let sequence = state.allocate(&service, change.today);
            updated.service_id = service.id;
            updated.number = format_number(&service.prefix, service.padding, sequence);
            updated.sequence = sequence;
            updated.queue_date = change.today;
        }
        updated.doctor_id = change.doctor_id;
        updated.counter_id = change.counter_id;
        updated.updated_at = change.at;

        state.tickets[index] = updated.clone();
        Ok(updated)
    }

    async fn transition(&self, transition: &TicketTransition) -> QueueResult<QueueTicket> {
        let mut state = self.state.lock().await;
        let ticket = state
            .tickets
            .iter_mut()
            .find(|t| t.id == transition.ticket_id)
            .ok_or_else(|| QueueError::not_found("Ticket", transition.ticket_id))?;

        if ticket.status != transition.from {
            return Err(QueueError::InvalidState(format!(
                "ticket {} is {}, expected {}",
                ticket.id, ticket.status, transition.from
            )));
        }
        let next = ticket.status.transition(transition.to)?;

        match next {
            TicketStatus::Serving => {
                ticket.called_at = Some(transition.at);
                ticket.served_at = Some(transition.at);
            }
            TicketStatus::Finished => ticket.finished_at = Some(transition.at),
            TicketStatus::Canceled => ticket.canceled_at = Some(transition.at),
            TicketStatus::Waiting => {}
        }
        ticket.status = next;
        if transition.counter_id.is_some() {
            ticket.counter_id = transition.counter_id;
        }
        ticket.updated_at = transition.at;
        Ok(ticket.clone())
    }
}
