//! Counter-side endpoints. Require the `admin` or `doctor` role.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use uuid::Uuid;

use crate::auth::Identity;
use crate::models::CallTicket;
use crate::state::AppState;
use crate::utils::error::AppResult;
use crate::utils::extract::Path;
use crate::utils::response::success;

/// POST /staff/antrian/:id/call
///
/// Body is optional; `{ "counter_id": ... }` assigns the calling station.
pub async fn call(
    staff: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    input: Result<axum::Json<CallTicket>, JsonRejection>,
) -> AppResult<Response> {
    let input = match input {
        Ok(axum::Json(input)) => input,
        Err(JsonRejection::MissingJsonContentType(_)) => CallTicket::default(),
        Err(rejection) => return Err(rejection.into()),
    };
    let ticket = state.queue.call(&staff, id, &input).await?;
    Ok(success(ticket, "Queue ticket called"))
}

/// POST /staff/antrian/:id/finish
pub async fn finish(
    staff: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let ticket = state.queue.finish(&staff, id).await?;
    Ok(success(ticket, "Queue ticket finished"))
}

/// POST /staff/antrian/:id/cancel
pub async fn cancel(
    staff: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let ticket = state.queue.staff_cancel(&staff, id).await?;
    Ok(success(ticket, "Queue ticket canceled"))
}

/// GET /staff/services/:id/queue
pub async fn service_queue(
    staff: Identity,
    State(state): State<AppState>,
    Path(service_id): Path<Uuid>,
) -> AppResult<Response> {
    let tickets = state.queue.service_queue(&staff, service_id).await?;
    Ok(success(tickets, "Today's queue"))
}
