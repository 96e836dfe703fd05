use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A staff station that calls and serves tickets.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Counter {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
