use axum::response::Response;
use serde::Serialize;

use crate::utils::response::success;

pub mod antrian;
pub mod reference;
pub mod staff;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "antrian-api",
    };

    success(payload, "Health check successful")
}
