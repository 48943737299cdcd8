use crate::api::library::AppState;
use crate::api::middleware::RequireSession;
use crate::error::{AppError, Result};
use crate::models::{AccountLink, AccountRole, UserProfile};
use crate::services::{OauthClient, SpotifyClient};
use axum::{
    extract::{Path, Query, State},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/session", post(create_session))
        .route("/login/:role", get(login))
        .route("/callback", get(callback))
        .route("/status", get(status))
        .route("/reset", post(reset))
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    token: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    authorize_url: String,
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    source_user: Option<UserProfile>,
    dest_user: Option<UserProfile>,
    snapshot_tracks: usize,
}

/// POST /api/v1/auth/session
/// Start a migration run. The returned token identifies the session on
/// every subsequent request.
async fn create_session(State(state): State<Arc<AppState>>) -> Result<Json<SessionResponse>> {
    let (_, token) = state.sessions.create().await?;
    Ok(Json(SessionResponse { token }))
}

/// GET /api/v1/auth/login/:role
/// Begin the OAuth flow for the source or destination account. The client
/// sends the browser to the returned URL.
async fn login(
    State(state): State<Arc<AppState>>,
    RequireSession(session_id): RequireSession,
    Path(role): Path<String>,
) -> Result<Json<LoginResponse>> {
    let role = AccountRole::parse(&role)
        .ok_or_else(|| AppError::Validation(format!("Unknown account role: {}", role)))?;

    let oauth_state = OauthClient::generate_state(role, session_id);
    let stored = oauth_state.clone();
    state
        .sessions
        .update(session_id, move |s| s.oauth_state = Some(stored))
        .await?;

    let authorize_url = state.oauth.authorize_url(role, &oauth_state)?;
    Ok(Json(LoginResponse { authorize_url }))
}

/// GET /api/v1/auth/callback
/// OAuth redirect target. Validates state, exchanges the code, fetches
/// the account profile, and links the account into the session under the
/// role the state was issued for.
async fn callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    if let Some(error) = params.error {
        tracing::warn!("Authorization declined upstream: {}", error);
        return Ok(Redirect::to(&format!("{}/error", state.config.frontend_url)));
    }

    let echoed_state = params
        .state
        .ok_or_else(|| AppError::Validation("Missing state parameter".to_string()))?;
    let (role, session_id) = OauthClient::parse_state(&echoed_state)
        .ok_or_else(|| AppError::Validation("Malformed state parameter".to_string()))?;

    let session = state
        .sessions
        .get(session_id)
        .await
        .ok_or(AppError::Unauthorized)?;
    if session.oauth_state.as_deref() != Some(echoed_state.as_str()) {
        return Err(AppError::Unauthorized);
    }

    let code = params
        .code
        .ok_or_else(|| AppError::Validation("Missing authorization code".to_string()))?;
    let grant = state.oauth.exchange_code(&code).await?;

    let client = SpotifyClient::new(
        state.config.api_base_url.clone(),
        grant.access_token.clone(),
    );
    let user = client.current_user().await?;
    tracing::info!("Linked {} account for {}", role.as_str(), user.display_name);

    let link = AccountLink { credential: grant, user };
    state
        .sessions
        .update(session_id, move |s| {
            s.oauth_state = None;
            match role {
                AccountRole::Source => s.source = Some(link),
                AccountRole::Dest => s.dest = Some(link),
            }
        })
        .await?;

    // A newly linked source invalidates any capture from the previous one
    if role == AccountRole::Source {
        state.snapshots.remove(session_id).await?;
    }

    Ok(Redirect::to(&state.config.frontend_url))
}

/// GET /api/v1/auth/status
/// Where this run stands: which accounts are linked, and whether a
/// snapshot has been captured.
async fn status(
    State(state): State<Arc<AppState>>,
    RequireSession(session_id): RequireSession,
) -> Result<Json<StatusResponse>> {
    let session = state
        .sessions
        .get(session_id)
        .await
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(StatusResponse {
        source_user: session.source.map(|l| l.user),
        dest_user: session.dest.map(|l| l.user),
        snapshot_tracks: state.snapshots.count(session_id).await?,
    }))
}

/// POST /api/v1/auth/reset
/// Unlink both accounts and discard the snapshot, keeping the session
/// usable for a fresh run.
async fn reset(
    State(state): State<Arc<AppState>>,
    RequireSession(session_id): RequireSession,
) -> Result<Json<serde_json::Value>> {
    state.sessions.reset(session_id).await?;
    state.snapshots.remove(session_id).await?;

    Ok(Json(serde_json::json!({ "status": "reset" })))
}
