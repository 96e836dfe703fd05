use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub specialty: Option<String>,
    /// Free-form practice hours as shown on the schedule board.
    pub schedule: Option<String>,
    pub created_at: DateTime<Utc>,
}
