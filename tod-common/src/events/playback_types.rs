//! Playback-related type definitions
//!
//! Supporting types for the orchestrator's state machine and UI feedback.

use serde::{Deserialize, Serialize};

/// Coarse playback phase derived from the orchestrator's state
///
/// `Stopped` means a playlist is selected but nothing is playing and nothing
/// is paused in a resumable way.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackPhase {
    /// No playlist selected
    Idle,
    /// A load is in flight
    Loading,
    /// Audio is playing
    Playing,
    /// Paused with a resume point
    Paused,
    /// Playlist selected, nothing active
    Stopped,
}

impl std::fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackPhase::Idle => write!(f, "idle"),
            PlaybackPhase::Loading => write!(f, "loading"),
            PlaybackPhase::Playing => write!(f, "playing"),
            PlaybackPhase::Paused => write!(f, "paused"),
            PlaybackPhase::Stopped => write!(f, "stopped"),
        }
    }
}

/// Click feedback requested by a manual command
///
/// UIs play a short sound for these. Automatic transitions (natural track
/// end) never request one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClickCue {
    /// Transport buttons (play/pause, next, prev, shuffle, loop)
    Controls,
    /// Playlist selection
    Playlist,
}

/// Why the cursor moved
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CursorTrigger {
    /// Explicit track pick or play/pause starting a track
    Select,
    /// Playlist switch
    Playlist,
    /// Next/previous buttons
    Skip,
    /// Natural end of the previous track
    TrackEnd,
}
