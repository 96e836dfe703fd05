//! Allocation and the one-active-ticket rule under concurrent requests.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use antrian_server::models::TicketStatus;
use common::build_test_app;

const CONCURRENT_PATIENTS: usize = 25;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_yield_gapless_numbers() {
    let app = build_test_app();
    let service_id = app.registration().await.id;

    let mut patients = Vec::with_capacity(CONCURRENT_PATIENTS);
    for i in 0..CONCURRENT_PATIENTS {
        patients.push(app.patient(&format!("patient-{i}")).await);
    }

    let app = std::sync::Arc::new(app);
    let handles: Vec<_> = patients
        .into_iter()
        .map(|patient| {
            let app = app.clone();
            tokio::spawn(async move {
                let (status, json) = app
                    .post("/antrian", &patient, json!({ "service_id": service_id }))
                    .await;
                assert_eq!(status, StatusCode::CREATED, "{json}");
                json["data"]["number"].as_str().unwrap().to_string()
            })
        })
        .collect();

    let mut numbers = Vec::with_capacity(CONCURRENT_PATIENTS);
    for handle in handles {
        numbers.push(handle.await.unwrap());
    }
    numbers.sort();

    let expected: Vec<String> = (1..=CONCURRENT_PATIENTS)
        .map(|n| format!("A{n:03}"))
        .collect();
    assert_eq!(numbers, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_by_one_owner_admit_a_single_ticket() {
    let app = build_test_app();
    let service_id = app.registration().await.id;
    let ani = app.patient("Ani").await;

    let app = std::sync::Arc::new(app);
    let handles: Vec<_> = (0..10)
        .map(|_| {
            let app = app.clone();
            let ani = ani.clone();
            tokio::spawn(async move {
                app.post("/antrian", &ani, json!({ "service_id": service_id }))
                    .await
                    .0
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::CREATED => created += 1,
            StatusCode::CONFLICT => {}
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(created, 1);

    let active = app
        .store
        .tickets()
        .await
        .into_iter()
        .filter(|t| t.owner_id == ani.id && t.status == TicketStatus::Waiting)
        .count();
    assert_eq!(active, 1);
}
