//! Postgres-backed [`TicketStore`].
//!
//! Sequence allocation bumps a `service_day_sequences` row inside the
//! ticket-creating transaction, so concurrent creates for the same
//! (service, day) queue up on that row lock and a rollback hands the number
//! back. The partial unique index `uq_queues_owner_day_active` enforces the
//! one-active-ticket rule even if two creates pass the pre-check together.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    CreateService, Doctor, NewTicket, QueueTicket, Service, TicketChange, TicketDetails,
    TicketStatus, TicketTransition, UpdateService,
};
use crate::queue::number::{format_number, validate_format};
use crate::queue::state::{ensure_editable, ensure_owner};
use crate::queue::{QueueError, QueueResult};
use crate::store::TicketStore;

const SERVICE_COLUMNS: &str = "id, name, prefix, padding, is_active, created_at, updated_at";

const DOCTOR_COLUMNS: &str = "id, name, specialty, schedule, created_at";

const TICKET_COLUMNS: &str = "\
    id, service_id, owner_id, doctor_id, counter_id, number, sequence, queue_date, \
    status, created_at, called_at, served_at, canceled_at, finished_at, updated_at";

const DETAIL_SELECT: &str = "\
    SELECT q.id, q.service_id, q.owner_id, q.doctor_id, q.counter_id, q.number, \
           q.sequence, q.queue_date, q.status, q.created_at, q.called_at, q.served_at, \
           q.canceled_at, q.finished_at, q.updated_at, \
           s.name AS service_name, u.name AS owner_name, \
           d.name AS doctor_name, c.name AS counter_name \
    FROM queues q \
    JOIN services s ON s.id = q.service_id \
    JOIN users u ON u.id = q.owner_id \
    LEFT JOIN doctors d ON d.id = q.doctor_id \
    LEFT JOIN counters c ON c.id = q.counter_id";

const OWNER_ACTIVE_CONSTRAINT: &str = "uq_queues_owner_day_active";
const SEQUENCE_CONSTRAINTS: [&str; 2] = [
    "uq_queues_service_day_sequence",
    "uq_queues_service_day_number",
];

/// Attempts before a create gives up on repeated sequence collisions.
const MAX_ALLOCATION_ATTEMPTS: usize = 3;

const PG_UNIQUE_VIOLATION: &str = "23505";
const PG_FOREIGN_KEY_VIOLATION: &str = "23503";
const PG_LOCK_NOT_AVAILABLE: &str = "55P03";

#[derive(Clone)]
pub struct PgTicketStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PgTicketStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    async fn begin(&self) -> QueueResult<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        // SET does not take bind parameters; the value is an integer we format.
        let statement = format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        );
        sqlx::query(&statement).execute(&mut *tx).await?;
        Ok(tx)
    }

    fn classify(&self, operation: &'static str) -> impl Fn(sqlx::Error) -> QueueError + '_ {
        move |err| classify_error(err, operation, self.lock_timeout)
    }

    /// One create attempt. `Ok(None)` means the sequence was taken and the
    /// transaction was rolled back.
    async fn insert_once(&self, new: &NewTicket) -> QueueResult<Option<QueueTicket>> {
        let mut tx = self.begin().await?;

        let owner_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                .bind(new.owner_id)
                .fetch_one(&mut *tx)
                .await?;
        if !owner_exists {
            return Err(QueueError::not_found("User", new.owner_id));
        }

        let service = lock_active_service(&mut tx, new.service_id)
            .await
            .map_err(self.classify("create ticket"))?
            .ok_or_else(|| QueueError::not_found("Service", new.service_id))?;

        let query = format!(
            "SELECT {TICKET_COLUMNS} FROM queues \
             WHERE owner_id = $1 AND queue_date = $2 AND status IN ('waiting', 'serving') \
             LIMIT 1"
        );
        let active = sqlx::query_as::<_, QueueTicket>(&query)
            .bind(new.owner_id)
            .bind(new.queue_date)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(active) = active {
            return Err(QueueError::Conflict(format!(
                "owner already holds active ticket {} for {}",
                active.number, active.queue_date
            )));
        }

        let sequence = allocate_sequence(&mut tx, service.id, new.queue_date)
            .await
            .map_err(self.classify("allocate ticket number"))?;
        let number = format_number(&service.prefix, service.padding, sequence);

        let query = format!(
            "INSERT INTO queues \
                (id, service_id, owner_id, doctor_id, counter_id, number, sequence, \
                 queue_date, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'waiting', $9, $9) \
             RETURNING {TICKET_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, QueueTicket>(&query)
            .bind(Uuid::new_v4())
            .bind(service.id)
            .bind(new.owner_id)
            .bind(new.doctor_id)
            .bind(new.counter_id)
            .bind(&number)
            .bind(sequence)
            .bind(new.queue_date)
            .bind(new.created_at)
            .fetch_one(&mut *tx)
            .await;

        match inserted {
            Ok(ticket) => {
                tx.commit().await.map_err(self.classify("create ticket"))?;
                Ok(Some(ticket))
            }
            Err(err) if violates_any(&err, &SEQUENCE_CONSTRAINTS) => {
                warn!(service_id = %service.id, %number, "Sequence collision, retrying");
                tx.rollback().await?;
                Ok(None)
            }
            Err(err) => Err(classify_error(err, "create ticket", self.lock_timeout)),
        }
    }
}

#[async_trait]
impl TicketStore for PgTicketStore {
    async fn find_service(&self, id: Uuid) -> QueueResult<Option<Service>> {
        let query = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = $1");
        let service = sqlx::query_as::<_, Service>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(service)
    }

    async fn list_active_services(&self) -> QueueResult<Vec<Service>> {
        let query =
            format!("SELECT {SERVICE_COLUMNS} FROM services WHERE is_active ORDER BY name");
        let services = sqlx::query_as::<_, Service>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(services)
    }

    async fn create_service(&self, input: &CreateService) -> QueueResult<Service> {
        let query = format!(
            "INSERT INTO services (id, name, prefix, padding, is_active) \
             VALUES ($1, $2, $3, $4, COALESCE($5, TRUE)) \
             RETURNING {SERVICE_COLUMNS}"
        );
        let service = sqlx::query_as::<_, Service>(&query)
            .bind(Uuid::new_v4())
            .bind(&input.name)
            .bind(&input.prefix)
            .bind(input.padding)
            .bind(input.is_active)
            .fetch_one(&self.pool)
            .await
            .map_err(self.classify("create service"))?;
        info!(service_id = %service.id, prefix = %service.prefix, "Service created");
        Ok(service)
    }

    async fn update_service(&self, id: Uuid, input: &UpdateService) -> QueueResult<Service> {
        let mut tx = self.begin().await?;

        let query = format!("SELECT {SERVICE_COLUMNS} FROM services WHERE id = $1 FOR UPDATE");
        let current = sqlx::query_as::<_, Service>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(self.classify("update service"))?
            .ok_or_else(|| QueueError::not_found("Service", id))?;

        if input.changes_numbering(&current) {
            let issued: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM queues WHERE service_id = $1)")
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await?;
            if issued {
                return Err(QueueError::Conflict(format!(
                    "service {id} has issued tickets; its prefix and padding are frozen"
                )));
            }
            validate_format(
                input.prefix.as_deref().unwrap_or(&current.prefix),
                input.padding.unwrap_or(current.padding),
            )?;
        }

        let query = format!(
            "UPDATE services SET \
                 name = COALESCE($2, name), \
                 prefix = COALESCE($3, prefix), \
                 padding = COALESCE($4, padding), \
                 is_active = COALESCE($5, is_active), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {SERVICE_COLUMNS}"
        );
        let service = sqlx::query_as::<_, Service>(&query)
            .bind(id)
            .bind(input.name.as_deref())
            .bind(input.prefix.as_deref())
            .bind(input.padding)
            .bind(input.is_active)
            .fetch_one(&mut *tx)
            .await
            .map_err(self.classify("update service"))?;

        tx.commit().await?;
        Ok(service)
    }

    async fn list_doctors(&self) -> QueueResult<Vec<Doctor>> {
        let query = format!("SELECT {DOCTOR_COLUMNS} FROM doctors ORDER BY name");
        let doctors = sqlx::query_as::<_, Doctor>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(doctors)
    }

    async fn doctor_exists(&self, id: Uuid) -> QueueResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM doctors WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn counter_exists(&self, id: Uuid) -> QueueResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM counters WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn find_ticket(&self, id: Uuid) -> QueueResult<Option<TicketDetails>> {
        let query = format!("{DETAIL_SELECT} WHERE q.id = $1");
        let ticket = sqlx::query_as::<_, TicketDetails>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ticket)
    }

    async fn latest_for_owner(&self, owner_id: Uuid) -> QueueResult<Option<TicketDetails>> {
        let query =
            format!("{DETAIL_SELECT} WHERE q.owner_id = $1 ORDER BY q.created_at DESC LIMIT 1");
        let ticket = sqlx::query_as::<_, TicketDetails>(&query)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ticket)
    }

    async fn history_for_owner(&self, owner_id: Uuid) -> QueueResult<Vec<TicketDetails>> {
        let query = format!("{DETAIL_SELECT} WHERE q.owner_id = $1 ORDER BY q.created_at DESC");
        let tickets = sqlx::query_as::<_, TicketDetails>(&query)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(tickets)
    }

    async fn active_for_owner(
        &self,
        owner_id: Uuid,
        day: NaiveDate,
    ) -> QueueResult<Option<QueueTicket>> {
        let query = format!(
            "SELECT {TICKET_COLUMNS} FROM queues \
             WHERE owner_id = $1 AND queue_date = $2 AND status IN ('waiting', 'serving') \
             LIMIT 1"
        );
        let ticket = sqlx::query_as::<_, QueueTicket>(&query)
            .bind(owner_id)
            .bind(day)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ticket)
    }

    async fn service_day_queue(
        &self,
        service_id: Uuid,
        day: NaiveDate,
    ) -> QueueResult<Vec<TicketDetails>> {
        let query = format!(
            "{DETAIL_SELECT} WHERE q.service_id = $1 AND q.queue_date = $2 ORDER BY q.sequence"
        );
        let tickets = sqlx::query_as::<_, TicketDetails>(&query)
            .bind(service_id)
            .bind(day)
            .fetch_all(&self.pool)
            .await?;
        Ok(tickets)
    }

    async fn insert_ticket(&self, new: &NewTicket) -> QueueResult<QueueTicket> {
        for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
            if let Some(ticket) = self.insert_once(new).await? {
                debug!(attempt, ticket_id = %ticket.id, number = %ticket.number, "Ticket inserted");
                return Ok(ticket);
            }
        }
        Err(QueueError::Conflict(format!(
            "could not allocate a ticket number for service {} after {MAX_ALLOCATION_ATTEMPTS} attempts",
            new.service_id
        )))
    }

    async fn update_ticket(&self, change: &TicketChange) -> QueueResult<QueueTicket> {
        let mut tx = self.begin().await?;

        let query = format!("SELECT {TICKET_COLUMNS} FROM queues WHERE id = $1 FOR UPDATE");
        let ticket = sqlx::query_as::<_, QueueTicket>(&query)
            .bind(change.ticket_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(self.classify("update ticket"))?
            .ok_or_else(|| QueueError::not_found("Ticket", change.ticket_id))?;

        ensure_owner(&ticket, change.owner_id)?;
        ensure_editable(&ticket, change.today)?;

        let (number, sequence, queue_date) = if change.service_id != ticket.service_id {
            let service = lock_active_service(&mut tx, change.service_id)
                .await
                .map_err(self.classify("update ticket"))?
                .ok_or_else(|| QueueError::not_found("Service", change.service_id))?;
            let sequence = allocate_sequence(&mut tx, service.id, change.today)
                .await
                .map_err(self.classify("allocate ticket number"))?;
            (
                format_number(&service.prefix, service.padding, sequence),
                sequence,
                change.today,
            )
        } else {
            (ticket.number.clone(), ticket.sequence, ticket.queue_date)
        };

        let query = format!(
            "UPDATE queues SET \
                 service_id = $2, doctor_id = $3, counter_id = $4, \
                 number = $5, sequence = $6, queue_date = $7, updated_at = $8 \
             WHERE id = $1 \
             RETURNING {TICKET_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, QueueTicket>(&query)
            .bind(ticket.id)
            .bind(change.service_id)
            .bind(change.doctor_id)
            .bind(change.counter_id)
            .bind(&number)
            .bind(sequence)
            .bind(queue_date)
            .bind(change.at)
            .fetch_one(&mut *tx)
            .await
            .map_err(self.classify("update ticket"))?;

        tx.commit().await.map_err(self.classify("update ticket"))?;
        Ok(updated)
    }

    async fn transition(&self, transition: &TicketTransition) -> QueueResult<QueueTicket> {
        let stamps = match transition.to {
            TicketStatus::Serving => "called_at = $3, served_at = $3",
            TicketStatus::Finished => "finished_at = $3",
            TicketStatus::Canceled => "canceled_at = $3",
            TicketStatus::Waiting => {
                return Err(QueueError::InvalidTransition {
                    from: transition.from,
                    to: transition.to,
                })
            }
        };
        let query = format!(
            "UPDATE queues SET status = $2, {stamps}, \
                 counter_id = COALESCE($5, counter_id), updated_at = $3 \
             WHERE id = $1 AND status = $4 \
             RETURNING {TICKET_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, QueueTicket>(&query)
            .bind(transition.ticket_id)
            .bind(transition.to)
            .bind(transition.at)
            .bind(transition.from)
            .bind(transition.counter_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(self.classify("change ticket status"))?;

        if let Some(ticket) = updated {
            return Ok(ticket);
        }

        let current: Option<TicketStatus> =
            sqlx::query_scalar("SELECT status FROM queues WHERE id = $1")
                .bind(transition.ticket_id)
                .fetch_optional(&self.pool)
                .await?;
        match current {
            None => Err(QueueError::not_found("Ticket", transition.ticket_id)),
            Some(status) => Err(QueueError::InvalidState(format!(
                "ticket {} is {status}, expected {}",
                transition.ticket_id, transition.from
            ))),
        }
    }
}

/// Share-locks an active service so its numbering cannot change mid-allocation.
async fn lock_active_service(
    conn: &mut PgConnection,
    service_id: Uuid,
) -> Result<Option<Service>, sqlx::Error> {
    let query = format!(
        "SELECT {SERVICE_COLUMNS} FROM services WHERE id = $1 AND is_active FOR SHARE"
    );
    sqlx::query_as::<_, Service>(&query)
        .bind(service_id)
        .fetch_optional(conn)
        .await
}

/// Bumps the (service, day) counter, seeding it from the highest sequence
/// already stored. The row stays locked until the caller commits.
///
/// The counter never moves backwards. A number vacated when a ticket moves
/// to another service stays retired, so that day's sequence keeps a gap.
async fn allocate_sequence(
    conn: &mut PgConnection,
    service_id: Uuid,
    day: NaiveDate,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO service_day_sequences (service_id, queue_date, last_sequence) \
         VALUES ($1, $2, \
             (SELECT COALESCE(MAX(sequence), 0) + 1 FROM queues \
              WHERE service_id = $1 AND queue_date = $2)) \
         ON CONFLICT (service_id, queue_date) DO UPDATE SET \
             last_sequence = GREATEST( \
                 service_day_sequences.last_sequence, \
                 (SELECT COALESCE(MAX(sequence), 0) FROM queues \
                  WHERE service_id = $1 AND queue_date = $2)) + 1 \
         RETURNING last_sequence",
    )
    .bind(service_id)
    .bind(day)
    .fetch_one(conn)
    .await
}

fn violates_any(err: &sqlx::Error, constraints: &[&str]) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION)
                && db_err
                    .constraint()
                    .is_some_and(|name| constraints.contains(&name))
        }
        _ => false,
    }
}

fn classify_error(err: sqlx::Error, operation: &'static str, lock_timeout: Duration) -> QueueError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some(PG_UNIQUE_VIOLATION) => {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint == OWNER_ACTIVE_CONSTRAINT {
                    return QueueError::Conflict(
                        "owner already holds an active ticket for this day".to_string(),
                    );
                }
                if constraint.starts_with("uq_") {
                    return QueueError::Conflict(format!(
                        "duplicate value violates unique constraint: {constraint}"
                    ));
                }
            }
            Some(PG_FOREIGN_KEY_VIOLATION) => {
                let constraint = db_err.constraint().unwrap_or("unknown");
                return QueueError::Validation(format!(
                    "referenced record does not exist ({constraint})"
                ));
            }
            Some(PG_LOCK_NOT_AVAILABLE) => {
                warn!(operation, ?lock_timeout, "Lock wait timed out");
                return QueueError::Timeout {
                    operation,
                    after: lock_timeout,
                };
            }
            _ => {}
        }
    }
    QueueError::Database(err)
}
