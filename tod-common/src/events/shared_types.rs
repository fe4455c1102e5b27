//! Shared type definitions for event data
//!
//! Common structs used across multiple event types and the HTTP read model.

use serde::{Deserialize, Serialize};

use super::playback_types::PlaybackPhase;

/// Point-in-time view of the orchestrator's read model
///
/// Sent as the first SSE event on connection and returned by the state
/// endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Coarse state machine phase
    pub phase: PlaybackPhase,
    /// Index of the selected playlist in the catalog
    pub playlist_index: Option<usize>,
    /// Name of the selected playlist
    pub playlist_name: Option<String>,
    /// Cursor within the selected playlist
    pub current_track_index: Option<usize>,
    /// Name of the track under the cursor
    pub current_track_name: Option<String>,
    pub is_playing: bool,
    pub is_shuffle: bool,
    pub is_loop: bool,
    /// Master volume (0.0-1.0)
    pub volume: f32,
    /// Playback progress (0.0-1.0)
    pub progress_ratio: f64,
    /// Duration reported by the most recent load
    pub duration_seconds: f64,
}
