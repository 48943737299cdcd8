mod api;
mod config;
mod error;
mod models;
mod services;

use crate::api::library::AppState;
use crate::config::Config;
use crate::services::{OauthClient, SessionStore, SnapshotStore};
use axum::{
    http::{header, Method},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,likeshift=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Initialize services
    let sessions = Arc::new(SessionStore::new(config.jwt_secret.clone()));
    let snapshots = Arc::new(SnapshotStore::new(config.snapshot_dir.clone()));
    let oauth = Arc::new(OauthClient::new(
        config.spotify_client_id.clone(),
        config.spotify_client_secret.clone(),
        config.redirect_uri.clone(),
        config.accounts_base_url.clone(),
    ));

    let app_state = Arc::new(AppState {
        config: config.clone(),
        sessions,
        snapshots,
        oauth,
    });

    // Allow any origin only when explicitly configured ("*" is development only)
    let allow_origin = if config.cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok()),
        )
    };

    // Build router
    let app = Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .nest("/auth", api::auth_routes())
                .merge(api::library_routes())
                .with_state(app_state.clone()),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(allow_origin)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        );

    // Start server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
