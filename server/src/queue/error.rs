use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::models::TicketStatus;

/// Failure kinds of queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Cannot move ticket from {from} to {to}")]
    InvalidTransition { from: TicketStatus, to: TicketStatus },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{operation} did not complete within {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

pub type QueueResult<T> = Result<T, QueueError>;

impl QueueError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        QueueError::NotFound { entity, id }
    }
}
