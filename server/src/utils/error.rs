use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};

use crate::queue::QueueError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Queue(err) => match err {
                QueueError::NotFound { .. } => StatusCode::NOT_FOUND,
                QueueError::Forbidden(_) => StatusCode::FORBIDDEN,
                QueueError::InvalidState(_)
                | QueueError::InvalidTransition { .. }
                | QueueError::Conflict(_) => StatusCode::CONFLICT,
                QueueError::Validation(_) => StatusCode::BAD_REQUEST,
                QueueError::Timeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
                QueueError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Queue(err) => match err {
                QueueError::NotFound { .. } => "NOT_FOUND",
                QueueError::Forbidden(_) => "FORBIDDEN",
                QueueError::InvalidState(_) => "INVALID_STATE",
                QueueError::InvalidTransition { .. } => "INVALID_TRANSITION",
                QueueError::Conflict(_) => "CONFLICT",
                QueueError::Validation(_) => "VALIDATION_ERROR",
                QueueError::Timeout { .. } => "TIMEOUT",
                QueueError::Database(_) => "DATABASE_ERROR",
            },
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::Queue(QueueError::Database(e)) => {
                error!(error = ?e, "Database error");
            }
            AppError::Queue(QueueError::Timeout { operation, after }) => {
                error!(operation, ?after, "Queue operation timed out");
            }
            _ => {
                warn!(code = self.code(), error = %self, "Request rejected");
            }
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            AppError::Queue(QueueError::InvalidTransition { from, to }) => {
                Some(json!({ "from": from, "to": to }))
            }
            AppError::Queue(QueueError::NotFound { entity, id }) => {
                Some(json!({ "entity": entity, "id": id }))
            }
            _ => None,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        // Only expose high-level message to the client
        let public_message = match &self {
            AppError::Queue(QueueError::Database(_)) => "A database error occurred".to_string(),
            AppError::Queue(err) => err.to_string(),
            AppError::ValidationError(msg) | AppError::AuthError(msg) => msg.clone(),
        };

        error_response(code, public_message, self.details(), status)
    }
}
