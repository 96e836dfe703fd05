use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A department tickets are issued against (poli).
///
/// `prefix` and `padding` define the ticket number format, e.g. prefix `"A"`
/// with padding `3` yields `A001`. Both are frozen once the service has
/// issued a ticket.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub prefix: String,
    pub padding: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateService {
    pub name: String,
    pub prefix: String,
    pub padding: i32,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateService {
    pub name: Option<String>,
    pub prefix: Option<String>,
    pub padding: Option<i32>,
    pub is_active: Option<bool>,
}

impl UpdateService {
    /// Whether applying this update to `service` would change its number format.
    pub fn changes_numbering(&self, service: &Service) -> bool {
        let prefix_changed = self
            .prefix
            .as_deref()
            .is_some_and(|prefix| prefix != service.prefix);
        let padding_changed = self
            .padding
            .is_some_and(|padding| padding != service.padding);
        prefix_changed || padding_changed
    }
}
