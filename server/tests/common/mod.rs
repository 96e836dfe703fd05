#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use antrian_server::auth::{USER_ID_HEADER, USER_ROLE_HEADER};
use antrian_server::config::Config;
use antrian_server::models::{Service, User};
use antrian_server::queue::{FixedClock, QueueCalendar, QueueService};
use antrian_server::routes::create_routes;
use antrian_server::state::AppState;
use antrian_server::store::MemoryTicketStore;

/// 10:00 local time (UTC+7) on 2 June 2025.
pub fn opening_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 3, 0, 0).unwrap()
}

/// The full router over an in-memory store and a clock the test controls.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryTicketStore>,
    pub clock: Arc<FixedClock>,
}

/// Build the application router the same way `main.rs` does, swapping the
/// Postgres store for [`MemoryTicketStore`].
pub fn build_test_app() -> TestApp {
    let config = Config::default();
    let store = Arc::new(MemoryTicketStore::new());
    let clock = Arc::new(FixedClock::new(opening_time()));

    let calendar = QueueCalendar::new(clock.clone(), config.utc_offset);
    let queue = QueueService::new(store.clone(), calendar, Duration::from_secs(5));
    let state = AppState {
        queue,
        config: Arc::new(config),
    };

    TestApp {
        router: create_routes(state),
        store,
        clock,
    }
}

impl TestApp {
    pub async fn patient(&self, name: &str) -> User {
        self.store.add_user(name, "user").await
    }

    pub async fn staff(&self, name: &str, role: &str) -> User {
        self.store.add_user(name, role).await
    }

    /// Registration desk service numbered `A001`, `A002`, ...
    pub async fn registration(&self) -> Service {
        self.store.add_service("Pendaftaran", "A", 3).await
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<&User>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder
                .header(USER_ID_HEADER, user.id.to_string())
                .header(USER_ROLE_HEADER, user.role.as_str());
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        (status, body_json(response.into_body()).await)
    }

    pub async fn get(&self, uri: &str, user: &User) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(user), None).await
    }

    pub async fn post(&self, uri: &str, user: &User, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(user), Some(body)).await
    }

    pub async fn put(&self, uri: &str, user: &User, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(user), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, user: &User) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(user), None).await
    }

    /// Takes a ticket for `service_id` and returns its `data` payload.
    pub async fn take_ticket(&self, user: &User, service_id: Uuid) -> Value {
        let (status, json) = self
            .post(
                "/antrian",
                user,
                serde_json::json!({ "service_id": service_id }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "unexpected body: {json}");
        json["data"].clone()
    }
}

/// Collect a response body and parse it as JSON. Empty bodies become `Null`.
pub async fn body_json(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

pub fn ticket_id(ticket: &Value) -> Uuid {
    ticket["id"].as_str().unwrap().parse().unwrap()
}
