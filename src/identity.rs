//! Caller identity for HTTP requests
//!
//! Every request carries the acting user's id in `x-actor-id`. The role is
//! always the user's current role in the directory, never taken from the
//! request.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Actor;
use crate::AppState;

pub const ACTOR_HEADER: &str = "x-actor-id";

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACTOR_HEADER)
            .ok_or_else(|| AppError::Unauthenticated(format!("Missing {} header", ACTOR_HEADER)))?
            .to_str()
            .map_err(|_| AppError::Unauthenticated(format!("Malformed {} header", ACTOR_HEADER)))?;

        let id = Uuid::parse_str(raw.trim())
            .map_err(|_| AppError::Unauthenticated(format!("Malformed {} header", ACTOR_HEADER)))?;

        match state.engine.directory().get(id).await {
            Ok(user) => Ok(user.actor()),
            Err(AppError::NotFound(_)) => {
                tracing::debug!(actor_id = %id, "Rejected unknown actor");
                Err(AppError::Unauthenticated(format!("Unknown user: {}", id)))
            }
            Err(e) => Err(e),
        }
    }
}
