use crate::api::middleware::RequireSession;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{ExtractEvent, SavedTrack, TransferEvent};
use crate::services::{extractor, transporter, OauthClient, SessionStore, SnapshotStore, SpotifyClient};
use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;

pub struct AppState {
    pub config: Config,
    pub sessions: Arc<SessionStore>,
    pub snapshots: Arc<SnapshotStore>,
    pub oauth: Arc<OauthClient>,
}

pub fn library_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/library/extract-stream", get(extract_stream))
        .route("/library/tracks", get(list_tracks))
        .route("/library/transfer-stream", get(transfer_stream))
}

#[derive(Debug, Serialize)]
struct TracksResponse {
    count: usize,
    tracks: Vec<SavedTrack>,
}

#[derive(Debug, Deserialize)]
struct TransferParams {
    #[serde(default = "default_preserve_order")]
    preserve_order: bool,
}

fn default_preserve_order() -> bool {
    true
}

/// GET /api/v1/library/extract-stream
/// Walk the source library and stream extraction progress via Server-Sent
/// Events. Track events are buffered here and persisted as the session's
/// snapshot before the terminal `complete` is forwarded.
async fn extract_stream(
    State(state): State<Arc<AppState>>,
    RequireSession(session_id): RequireSession,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let session = state
        .sessions
        .get(session_id)
        .await
        .ok_or(AppError::Unauthorized)?;
    let link = session.source.ok_or(AppError::Unauthorized)?;

    let client = SpotifyClient::new(
        state.config.api_base_url.clone(),
        link.credential.access_token,
    );
    let inner = extractor::extract_all(client, state.config.pacing.clone());
    let snapshots = Arc::clone(&state.snapshots);

    let stream = async_stream::stream! {
        tokio::pin!(inner);
        let mut buffered: Vec<SavedTrack> = Vec::new();

        while let Some(progress) = inner.next().await {
            if let ExtractEvent::Track { record } = &progress {
                buffered.push(record.clone());
            }

            // Persist before forwarding completion, so the client only
            // ever sees `complete` for a durable snapshot.
            if let ExtractEvent::Complete { .. } = &progress {
                if let Err(e) = snapshots.save(session_id, &buffered).await {
                    tracing::error!("Failed to persist snapshot: {}", e);
                    let failure = ExtractEvent::Error {
                        message: format!("Failed to persist snapshot: {}", e),
                    };
                    if let Ok(event) = Event::default().json_data(&failure) {
                        yield Ok::<Event, Infallible>(event);
                    }
                    break;
                }
            }

            let is_terminal = matches!(
                progress,
                ExtractEvent::Complete { .. } | ExtractEvent::Error { .. }
            );

            if let Ok(event) = Event::default().json_data(&progress) {
                yield Ok::<Event, Infallible>(event);
            }

            if is_terminal {
                break;
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// GET /api/v1/library/tracks
/// The captured snapshot for this session. 409 until extraction has
/// completed.
async fn list_tracks(
    State(state): State<Arc<AppState>>,
    RequireSession(session_id): RequireSession,
) -> Result<Json<TracksResponse>> {
    let tracks = state.snapshots.load(session_id).await?;

    Ok(Json(TracksResponse {
        count: tracks.len(),
        tracks,
    }))
}

/// GET /api/v1/library/transfer-stream
/// Replay the captured snapshot into the destination account, streaming
/// progress via Server-Sent Events. Requires a linked destination account
/// and an existing snapshot; the snapshot is discarded once the transfer
/// completes.
async fn transfer_stream(
    State(state): State<Arc<AppState>>,
    RequireSession(session_id): RequireSession,
    Query(params): Query<TransferParams>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let session = state
        .sessions
        .get(session_id)
        .await
        .ok_or(AppError::Unauthorized)?;
    let link = session.dest.ok_or(AppError::Unauthorized)?;

    // Fatal precondition: the snapshot must exist before transport starts
    let tracks = state.snapshots.load(session_id).await?;

    let client = SpotifyClient::new(
        state.config.api_base_url.clone(),
        link.credential.access_token,
    );
    let inner = transporter::transfer(
        client,
        tracks,
        state.config.pacing.clone(),
        params.preserve_order,
    );
    let snapshots = Arc::clone(&state.snapshots);

    let stream = async_stream::stream! {
        tokio::pin!(inner);

        while let Some(progress) = inner.next().await {
            let is_terminal = matches!(progress, TransferEvent::Complete { .. });

            if is_terminal {
                // The snapshot is consumed by a finished transfer
                if let Err(e) = snapshots.remove(session_id).await {
                    tracing::warn!("Failed to discard snapshot: {}", e);
                }
            }

            if let Ok(event) = Event::default().json_data(&progress) {
                yield Ok::<Event, Infallible>(event);
            }

            if is_terminal {
                break;
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
