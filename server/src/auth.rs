//! Caller identity.
//!
//! Authentication happens upstream: the gateway validates the session and
//! forwards the caller as `x-user-id` / `x-user-role` headers. This module
//! only reads them back; it never consults a session store.

use std::str::FromStr;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::queue::QueueError;
use crate::utils::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Doctor,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "pasien" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "doctor" | "dokter" => Ok(Role::Doctor),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// The authenticated caller, passed explicitly into every queue operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub role: Role,
}

impl Identity {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Doctor)
    }

    pub fn require_staff(&self) -> Result<(), QueueError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(QueueError::Forbidden(
                "staff role required".to_string(),
            ))
        }
    }

    pub fn require_admin(&self) -> Result<(), QueueError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(QueueError::Forbidden("admin role required".to_string()))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::AuthError("Missing authenticated user".to_string()))?;
        let id = Uuid::parse_str(id.trim())
            .map_err(|_| AppError::AuthError("Malformed user id".to_string()))?;

        let role = match parts.headers.get(USER_ROLE_HEADER) {
            Some(value) => value
                .to_str()
                .map_err(|_| AppError::AuthError("Malformed user role".to_string()))?
                .parse::<Role>()
                .map_err(AppError::AuthError)?,
            None => Role::User,
        };

        Ok(Identity { id, role })
    }
}
