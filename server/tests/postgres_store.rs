//! `PgTicketStore` against a real database.
//!
//! Each test gets a fresh database from `#[sqlx::test]`; run with
//! `DATABASE_URL` set and `--ignored`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use antrian_server::models::{NewTicket, TicketChange, TicketStatus, TicketTransition};
use antrian_server::queue::QueueError;
use antrian_server::store::{PgTicketStore, TicketStore};

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
}

async fn seed_user(pool: &PgPool, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, name) VALUES ($1, $2)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await
        .unwrap();
    id
}

async fn seed_service(pool: &PgPool, name: &str, prefix: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO services (id, name, prefix, padding) VALUES ($1, $2, $3, 3)")
        .bind(id)
        .bind(name)
        .bind(prefix)
        .execute(pool)
        .await
        .unwrap();
    id
}

fn new_ticket(owner_id: Uuid, service_id: Uuid) -> NewTicket {
    NewTicket {
        owner_id,
        service_id,
        doctor_id: None,
        counter_id: None,
        queue_date: day(),
        created_at: Utc::now(),
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_inserts_get_distinct_consecutive_numbers(pool: PgPool) {
    let service_id = seed_service(&pool, "General", "A").await;
    let store = Arc::new(PgTicketStore::new(pool.clone(), LOCK_TIMEOUT));

    let mut handles = Vec::new();
    for i in 0..10 {
        let owner_id = seed_user(&pool, &format!("patient-{i}")).await;
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .insert_ticket(&new_ticket(owner_id, service_id))
                .await
                .unwrap()
                .sequence
        }));
    }

    let mut sequences = Vec::new();
    for handle in handles {
        sequences.push(handle.await.unwrap());
    }
    sequences.sort_unstable();
    assert_eq!(sequences, (1..=10).collect::<Vec<_>>());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn second_active_ticket_conflicts(pool: PgPool) {
    let service_id = seed_service(&pool, "General", "A").await;
    let owner_id = seed_user(&pool, "Ani").await;
    let store = PgTicketStore::new(pool.clone(), LOCK_TIMEOUT);

    store
        .insert_ticket(&new_ticket(owner_id, service_id))
        .await
        .unwrap();
    let err = store
        .insert_ticket(&new_ticket(owner_id, service_id))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::Conflict(_)), "{err:?}");

    // The failed attempt must not have consumed a sequence.
    let other = seed_user(&pool, "Budi").await;
    let ticket = store
        .insert_ticket(&new_ticket(other, service_id))
        .await
        .unwrap();
    assert_eq!(ticket.number, "A002");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn renumbering_allocates_from_the_new_service(pool: PgPool) {
    let general = seed_service(&pool, "General", "A").await;
    let dental = seed_service(&pool, "Dental", "B").await;
    let owner_id = seed_user(&pool, "Ani").await;
    let store = PgTicketStore::new(pool.clone(), LOCK_TIMEOUT);

    let ticket = store
        .insert_ticket(&new_ticket(owner_id, general))
        .await
        .unwrap();
    let moved = store
        .update_ticket(&TicketChange {
            ticket_id: ticket.id,
            owner_id,
            service_id: dental,
            doctor_id: None,
            counter_id: None,
            today: day(),
            at: Utc::now(),
        })
        .await
        .unwrap();
    assert_eq!(moved.number, "B001");
    assert_eq!(moved.id, ticket.id);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn stale_transition_is_rejected(pool: PgPool) {
    let service_id = seed_service(&pool, "General", "A").await;
    let owner_id = seed_user(&pool, "Ani").await;
    let store = PgTicketStore::new(pool.clone(), LOCK_TIMEOUT);
    let ticket = store
        .insert_ticket(&new_ticket(owner_id, service_id))
        .await
        .unwrap();

    let cancel = TicketTransition {
        ticket_id: ticket.id,
        from: TicketStatus::Waiting,
        to: TicketStatus::Canceled,
        at: Utc::now(),
        counter_id: None,
    };
    let canceled = store.transition(&cancel).await.unwrap();
    assert_eq!(canceled.status, TicketStatus::Canceled);
    assert!(canceled.canceled_at.is_some());

    let err = store.transition(&cancel).await.unwrap_err();
    assert!(matches!(err, QueueError::InvalidState(_)), "{err:?}");
}
