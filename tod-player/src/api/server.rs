//! HTTP server setup and routing
//!
//! Sets up Axum HTTP server with routes for control endpoints and SSE.

use crate::error::{Error, Result};
use crate::playback::Orchestrator;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub orchestrator: Arc<Orchestrator>,
}

/// Build the router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))

        // Playlists
        .route("/playlists", get(super::handlers::list_playlists))
        .route("/playlists/:playlist_index/select", post(super::handlers::select_playlist))

        // Playback control
        .route("/playback/state", get(super::handlers::get_playback_state))
        .route("/playback/track/:track_index", post(super::handlers::play_track))
        .route("/playback/toggle", post(super::handlers::play_pause))
        .route("/playback/next", post(super::handlers::skip_next))
        .route("/playback/previous", post(super::handlers::skip_previous))
        .route("/playback/shuffle", post(super::handlers::toggle_shuffle))
        .route("/playback/loop", post(super::handlers::toggle_loop))
        .route("/playback/seek", post(super::handlers::seek))

        // Volume
        .route("/audio/volume", get(super::handlers::get_volume))
        .route("/audio/volume", post(super::handlers::set_volume))

        // SSE event stream
        .route("/events", get(super::sse::event_stream))

        // Attach application context
        .with_state(ctx)

        .layer(TraceLayer::new_for_http())

        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}

/// Run HTTP API server until `shutdown` resolves
pub async fn run<F>(addr: SocketAddr, orchestrator: Arc<Orchestrator>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(AppContext { orchestrator });

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Config(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("HTTP server stopped");
    Ok(())
}
