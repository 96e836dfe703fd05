//! Patient-facing ticket endpoints under `/antrian`.

use axum::extract::State;
use axum::response::Response;
use uuid::Uuid;

use crate::auth::Identity;
use crate::models::{CreateTicket, UpdateTicket};
use crate::state::AppState;
use crate::utils::error::AppResult;
use crate::utils::extract::{Json, Path};
use crate::utils::response::{created, success};

/// GET /antrian
///
/// The caller's latest ticket, or `null` when they never took one.
pub async fn index(identity: Identity, State(state): State<AppState>) -> AppResult<Response> {
    let latest = state.queue.dashboard(&identity).await?;
    Ok(success(latest, "Latest queue ticket"))
}

/// GET /antrian/history
pub async fn history(identity: Identity, State(state): State<AppState>) -> AppResult<Response> {
    let tickets = state.queue.history(&identity).await?;
    Ok(success(tickets, "Queue history"))
}

/// GET /antrian/create
///
/// Services and doctors to choose from. Fails with 409 while the caller
/// still holds an active ticket today.
pub async fn create_form(
    identity: Identity,
    State(state): State<AppState>,
) -> AppResult<Response> {
    let form = state.queue.create_form(&identity).await?;
    Ok(success(form, "Ticket options"))
}

/// POST /antrian
pub async fn store(
    identity: Identity,
    State(state): State<AppState>,
    Json(input): Json<CreateTicket>,
) -> AppResult<Response> {
    let ticket = state.queue.create(&identity, &input).await?;
    let message = format!("Queue ticket {} created", ticket.details.ticket.number);
    Ok(created(ticket, message))
}

/// GET /antrian/:id
pub async fn show(
    identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let ticket = state.queue.show(&identity, id).await?;
    Ok(success(ticket, "Queue ticket"))
}

/// GET /antrian/:id/edit
pub async fn edit_form(
    identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let form = state.queue.edit_form(&identity, id).await?;
    Ok(success(form, "Ticket options"))
}

/// PUT /antrian/:id
pub async fn update(
    identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateTicket>,
) -> AppResult<Response> {
    let ticket = state.queue.update(&identity, id, &input).await?;
    Ok(success(ticket, "Queue ticket updated"))
}

/// DELETE /antrian/:id
///
/// Soft cancel; the ticket stays on record as `canceled`.
pub async fn cancel(
    identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let ticket = state.queue.cancel(&identity, id).await?;
    Ok(success(ticket, "Queue ticket canceled"))
}

/// GET /antrian/:id/print
pub async fn print(
    identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let ticket = state.queue.print(&identity, id).await?;
    Ok(success(ticket, "Printable queue ticket"))
}

/// GET /antrian/:id/download-pdf
///
/// Hands the ticket and target file name to the PDF renderer.
pub async fn download_pdf(
    identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let download = state.queue.download(&identity, id).await?;
    Ok(success(download, "Queue ticket download"))
}
