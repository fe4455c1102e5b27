//! HTTP request handlers
//!
//! Thin adapters from REST calls to orchestrator commands. Commands that can
//! start a track respond after the load settles, with the resulting state.

use crate::api::server::AppContext;
use crate::error::Error;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tod_common::events::{PlaybackPhase, PlayerSnapshot};
use tracing::{info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub git_hash: String,
    pub build_timestamp: String,
    pub build_profile: String,
    pub engine: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrackInfo {
    pub index: usize,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistInfo {
    pub index: usize,
    pub name: String,
    pub track_count: usize,
    pub tracks: Vec<TrackInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistsResponse {
    pub playlists: Vec<PlaylistInfo>,
}

/// Result of a command that may start a track
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResponse {
    /// A track started playing as a result of the command
    pub started: bool,
    pub state: PlayerSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PhaseResponse {
    pub phase: PlaybackPhase,
    pub state: PlayerSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    /// Target position as a fraction of the track (0.0-1.0)
    pub ratio: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SeekResponse {
    /// The engine repositioned
    pub accepted: bool,
    pub progress_ratio: f64,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    volume: u64, // 0-100 user-facing scale
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VolumeResponse {
    pub volume: u8,
}

type ApiError = (StatusCode, Json<StatusResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(StatusResponse {
            status: format!("error: {}", message.into()),
        }),
    )
}

fn to_user_volume(volume: f32) -> u8 {
    (volume * 100.0).round().clamp(0.0, 100.0) as u8
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "tod-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
        engine: ctx.orchestrator.engine_name().to_string(),
    })
}

// ============================================================================
// Playlist Endpoints
// ============================================================================

/// GET /playlists - List the catalog
pub async fn list_playlists(State(ctx): State<AppContext>) -> Json<PlaylistsResponse> {
    let playlists = ctx
        .orchestrator
        .catalog()
        .iter()
        .enumerate()
        .map(|(index, playlist)| PlaylistInfo {
            index,
            name: playlist.name.clone(),
            track_count: playlist.len(),
            tracks: playlist
                .tracks
                .iter()
                .enumerate()
                .map(|(index, track)| TrackInfo {
                    index,
                    name: track.name.clone(),
                })
                .collect(),
        })
        .collect();
    Json(PlaylistsResponse { playlists })
}

/// POST /playlists/:playlist_index/select - Select a playlist and start a random track
pub async fn select_playlist(
    State(ctx): State<AppContext>,
    Path(playlist_index): Path<usize>,
) -> Result<Json<CommandResponse>, ApiError> {
    match ctx.orchestrator.select_playlist(playlist_index).await {
        Ok(started) => Ok(Json(CommandResponse {
            started,
            state: ctx.orchestrator.snapshot().await,
        })),
        Err(Error::NotFound(what)) => {
            warn!("Select of unknown playlist {}", playlist_index);
            Err(api_error(StatusCode::NOT_FOUND, format!("{} not found", what)))
        }
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

// ============================================================================
// Playback Control Endpoints
// ============================================================================

/// GET /playback/state - Current read model
pub async fn get_playback_state(State(ctx): State<AppContext>) -> Json<PlayerSnapshot> {
    Json(ctx.orchestrator.snapshot().await)
}

/// POST /playback/track/:track_index - Play a specific track of the selected playlist
pub async fn play_track(
    State(ctx): State<AppContext>,
    Path(track_index): Path<usize>,
) -> Result<Json<CommandResponse>, ApiError> {
    let snapshot = ctx.orchestrator.snapshot().await;
    let Some(playlist_index) = snapshot.playlist_index else {
        return Err(api_error(StatusCode::CONFLICT, "no playlist selected"));
    };
    let len = ctx
        .orchestrator
        .catalog()
        .get(playlist_index)
        .map(|p| p.len())
        .unwrap_or(0);
    if track_index >= len {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("track {} not in playlist ({} tracks)", track_index, len),
        ));
    }

    info!("Play track {} request", track_index);
    let started = ctx.orchestrator.play_track(track_index).await;
    Ok(Json(CommandResponse {
        started,
        state: ctx.orchestrator.snapshot().await,
    }))
}

/// POST /playback/toggle - Play/pause
pub async fn play_pause(State(ctx): State<AppContext>) -> Json<PhaseResponse> {
    let phase = ctx.orchestrator.play_pause().await;
    info!("Play/pause request -> {}", phase);
    Json(PhaseResponse {
        phase,
        state: ctx.orchestrator.snapshot().await,
    })
}

/// POST /playback/next - Skip to next track
pub async fn skip_next(State(ctx): State<AppContext>) -> Json<CommandResponse> {
    let started = ctx.orchestrator.next().await;
    Json(CommandResponse {
        started,
        state: ctx.orchestrator.snapshot().await,
    })
}

/// POST /playback/previous - Skip to previous track
pub async fn skip_previous(State(ctx): State<AppContext>) -> Json<CommandResponse> {
    let started = ctx.orchestrator.previous().await;
    Json(CommandResponse {
        started,
        state: ctx.orchestrator.snapshot().await,
    })
}

/// POST /playback/shuffle - Toggle shuffle
pub async fn toggle_shuffle(State(ctx): State<AppContext>) -> Json<ToggleResponse> {
    Json(ToggleResponse {
        enabled: ctx.orchestrator.toggle_shuffle().await,
    })
}

/// POST /playback/loop - Toggle loop
pub async fn toggle_loop(State(ctx): State<AppContext>) -> Json<ToggleResponse> {
    Json(ToggleResponse {
        enabled: ctx.orchestrator.toggle_loop().await,
    })
}

/// POST /playback/seek - Seek to a fraction of the current track
pub async fn seek(
    State(ctx): State<AppContext>,
    Json(req): Json<SeekRequest>,
) -> Result<Json<SeekResponse>, ApiError> {
    if !req.ratio.is_finite() || !(0.0..=1.0).contains(&req.ratio) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("ratio must be within 0.0-1.0, got {}", req.ratio),
        ));
    }
    let accepted = ctx.orchestrator.seek(req.ratio).await;
    Ok(Json(SeekResponse {
        accepted,
        progress_ratio: req.ratio,
    }))
}

// ============================================================================
// Volume Endpoints
// ============================================================================

/// GET /audio/volume - Get current volume (0-100)
pub async fn get_volume(State(ctx): State<AppContext>) -> Json<VolumeResponse> {
    Json(VolumeResponse {
        volume: to_user_volume(ctx.orchestrator.volume().await),
    })
}

/// POST /audio/volume - Set volume level (0-100)
pub async fn set_volume(
    State(ctx): State<AppContext>,
    Json(req): Json<VolumeRequest>,
) -> Result<Json<VolumeResponse>, StatusCode> {
    if req.volume > 100 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let old_volume = ctx.orchestrator.volume().await;
    let volume = ctx.orchestrator.set_volume(req.volume as f32 / 100.0).await;
    info!("Volume changed: {:.0}% -> {:.0}%", old_volume * 100.0, volume * 100.0);

    Ok(Json(VolumeResponse {
        volume: to_user_volume(volume),
    }))
}
