use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{antrian, health_check, reference, staff};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let config = state.config.clone();

    Router::new()
        .route("/health", get(health_check))
        .merge(antrian_routes())
        .merge(reference_routes())
        .nest("/staff", staff_routes())
        .with_state(state)
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(create_security_headers_layer(config.production))
        .layer(create_cors_layer(&config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

fn antrian_routes() -> Router<AppState> {
    Router::new()
        .route("/antrian", get(antrian::index).post(antrian::store))
        .route("/antrian/create", get(antrian::create_form))
        .route("/antrian/history", get(antrian::history))
        .route(
            "/antrian/:id",
            get(antrian::show)
                .put(antrian::update)
                .delete(antrian::cancel),
        )
        .route("/antrian/:id/edit", get(antrian::edit_form))
        .route("/antrian/:id/print", get(antrian::print))
        .route("/antrian/:id/download-pdf", get(antrian::download_pdf))
}

fn reference_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/services",
            get(reference::list_services).post(reference::create_service),
        )
        .route("/services/:id", put(reference::update_service))
        .route("/doctors", get(reference::list_doctors))
}

fn staff_routes() -> Router<AppState> {
    Router::new()
        .route("/antrian/:id/call", post(staff::call))
        .route("/antrian/:id/finish", post(staff::finish))
        .route("/antrian/:id/cancel", post(staff::cancel))
        .route("/services/:id/queue", get(staff::service_queue))
}
