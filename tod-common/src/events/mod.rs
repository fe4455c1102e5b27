//! Event types for the TrackOrDie event system
//!
//! Provides shared event definitions and the EventBus used by the player and
//! its HTTP/SSE surface.

mod playback_types;
mod shared_types;

pub use playback_types::{ClickCue, CursorTrigger, PlaybackPhase};
pub use shared_types::PlayerSnapshot;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Player event types
///
/// Events are broadcast via EventBus and serialized as-is for SSE
/// transmission. Publishing never blocks the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TodEvent {
    /// Phase of the playback state machine changed
    PlaybackStateChanged {
        /// Phase before change
        old_state: PlaybackPhase,
        /// Phase after change
        new_state: PlaybackPhase,
        /// When state changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A playlist was selected
    PlaylistSelected {
        /// Catalog index of the playlist
        playlist_index: usize,
        /// Playlist display name
        playlist_name: String,
        /// Number of tracks in the playlist
        track_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// UI cursor moved to another track
    ///
    /// Emitted synchronously with the command that moved it, before any load
    /// resolves.
    TrackChanged {
        /// New cursor position (None when the playlist is empty)
        track_index: Option<usize>,
        /// Track name under the cursor
        track_name: Option<String>,
        /// What moved the cursor
        trigger: CursorTrigger,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A load completed and playback started
    TrackStarted {
        track_index: usize,
        track_name: String,
        /// Duration from engine metadata (seconds)
        duration_seconds: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Both the primary and fallback load paths failed
    LoadFailed {
        track_index: usize,
        track_name: String,
        /// Human-readable failure reason
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback progress update
    ///
    /// Emitted by the progress reporter while playing, and immediately on seek.
    PlaybackProgress {
        /// Normalized progress (0.0-1.0)
        progress_ratio: f64,
        /// Position in seconds
        position_seconds: f64,
        /// Track duration in seconds
        duration_seconds: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Volume changed
    VolumeChanged {
        /// New volume (0.0-1.0)
        volume: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Shuffle toggled
    ShuffleChanged {
        enabled: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Loop toggled
    LoopChanged {
        enabled: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Manual command asks the UI for click feedback
    ClickCue {
        cue: ClickCue,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Initial state sent on SSE connection
    InitialState {
        snapshot: PlayerSnapshot,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl TodEvent {
    /// Event type name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            TodEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            TodEvent::PlaylistSelected { .. } => "PlaylistSelected",
            TodEvent::TrackChanged { .. } => "TrackChanged",
            TodEvent::TrackStarted { .. } => "TrackStarted",
            TodEvent::LoadFailed { .. } => "LoadFailed",
            TodEvent::PlaybackProgress { .. } => "PlaybackProgress",
            TodEvent::VolumeChanged { .. } => "VolumeChanged",
            TodEvent::ShuffleChanged { .. } => "ShuffleChanged",
            TodEvent::LoopChanged { .. } => "LoopChanged",
            TodEvent::ClickCue { .. } => "ClickCue",
            TodEvent::InitialState { .. } => "InitialState",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use tod_common::events::{EventBus, TodEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(TodEvent::ShuffleChanged {
///     enabled: false,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(TodEvent::ShuffleChanged { enabled: false, .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TodEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered per subscriber before the
    /// oldest are dropped.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<TodEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: TodEvent) -> Result<usize, broadcast::error::SendError<TodEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: TodEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
