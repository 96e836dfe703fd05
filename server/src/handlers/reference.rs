//! Services and doctors.

use axum::extract::State;
use axum::response::Response;
use uuid::Uuid;

use crate::auth::Identity;
use crate::models::{CreateService, UpdateService};
use crate::state::AppState;
use crate::utils::error::AppResult;
use crate::utils::extract::{Json, Path};
use crate::utils::response::{created, success};

/// GET /services
pub async fn list_services(State(state): State<AppState>) -> AppResult<Response> {
    let services = state.queue.list_services().await?;
    Ok(success(services, "Active services"))
}

/// POST /services (admin)
pub async fn create_service(
    admin: Identity,
    State(state): State<AppState>,
    Json(input): Json<CreateService>,
) -> AppResult<Response> {
    let service = state.queue.create_service(&admin, &input).await?;
    Ok(created(service, "Service created"))
}

/// PUT /services/:id (admin)
pub async fn update_service(
    admin: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateService>,
) -> AppResult<Response> {
    let service = state.queue.update_service(&admin, id, &input).await?;
    Ok(success(service, "Service updated"))
}

/// GET /doctors
pub async fn list_doctors(State(state): State<AppState>) -> AppResult<Response> {
    let doctors = state.queue.list_doctors().await?;
    Ok(success(doctors, "Doctor schedule"))
}
