use crate::api::library::AppState;
use crate::error::{AppError, Result};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;
use uuid::Uuid;

/// Extracts and verifies the caller's session. The token travels in the
/// Authorization header, or in the `token` query parameter for SSE
/// endpoints (EventSource can't send custom headers).
pub struct RequireSession(pub Uuid);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self> {
        let token = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .or_else(|| {
                parts.uri.query().and_then(|q| {
                    q.split('&')
                        .find(|p| p.starts_with("token="))
                        .and_then(|p| p.strip_prefix("token="))
                })
            })
            .ok_or(AppError::Unauthorized)?;

        let session_id = state.sessions.verify_token(token)?;

        // A signed token can outlive the in-memory session (restart); the
        // client has to start a new run in that case.
        if state.sessions.get(session_id).await.is_none() {
            return Err(AppError::Unauthorized);
        }

        Ok(RequireSession(session_id))
    }
}
