//! Shared playback state
//!
//! One authoritative record of what the player is doing, shared by the
//! orchestrator, the load coordinator and the progress reporter.
//!
//! All mutation goes through [`SharedState::update`], which holds the write
//! lock for the whole closure. A command decides and applies its state change
//! inside a single call, so two commands can never both act on the same
//! stale view. Engine calls are synchronous and cheap, so they are allowed
//! inside the closure; anything that awaits is not.

use crate::config::PlaybackSettings;
use crate::engine::EngineBuffer;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tod_common::events::{EventBus, PlaybackPhase, PlayerSnapshot, TodEvent};
use tod_common::Catalog;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, RwLock};

/// How playback was paused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseKind {
    /// The engine suspended in place and can resume
    InPlace,
    /// The engine had no pause; it was stopped and the position remembered
    Halted,
}

/// Mutable player state
#[derive(Debug)]
pub struct PlaybackState {
    /// Selected playlist (catalog index)
    pub playlist_index: Option<usize>,

    /// UI cursor within the selected playlist
    pub current_track_index: Option<usize>,

    /// Audio is (believed to be) coming out
    pub is_playing: bool,

    pub is_shuffle: bool,

    pub is_loop: bool,

    /// Master volume (0.0-1.0)
    pub volume: f32,

    /// Most recent successfully loaded buffer, kept for replay
    pub loaded_buffer: Option<EngineBuffer>,

    /// Where a later resume should seek to
    pub paused_position_seconds: Option<f64>,

    pub pause: Option<PauseKind>,

    /// Duration reported by the most recent load (0 when unknown)
    pub duration_seconds: f64,

    pub progress_ratio: f64,

    /// Token of the load in flight, if any
    pub loading: Option<u64>,

    /// Bumped when a load is claimed or completes, and on halt
    ///
    /// Deferred work (progress ticks, settle seeks) captures it and drops its
    /// result if it changed in the meantime.
    pub generation: u64,

    /// Engine initialization finished
    pub engine_ready: bool,

    /// Source of track picks
    pub rng: StdRng,
}

impl PlaybackState {
    pub fn new(settings: &PlaybackSettings, engine_ready: bool) -> Self {
        let rng = match settings.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            playlist_index: None,
            current_track_index: None,
            is_playing: false,
            is_shuffle: settings.shuffle,
            is_loop: settings.loop_playlist,
            volume: settings.default_volume.clamp(0.0, 1.0),
            loaded_buffer: None,
            paused_position_seconds: None,
            pause: None,
            duration_seconds: 0.0,
            progress_ratio: 0.0,
            loading: None,
            generation: 0,
            engine_ready,
            rng,
        }
    }

    /// Coarse phase
    pub fn phase(&self) -> PlaybackPhase {
        if self.playlist_index.is_none() {
            PlaybackPhase::Idle
        } else if self.loading.is_some() {
            PlaybackPhase::Loading
        } else if self.is_playing {
            PlaybackPhase::Playing
        } else if self.pause.is_some() {
            PlaybackPhase::Paused
        } else {
            PlaybackPhase::Stopped
        }
    }

    /// Stop tracking any playback: no load, nothing playing, nothing paused
    ///
    /// The loaded buffer is kept. The caller stops the engine.
    pub fn halt(&mut self) {
        if self.loading.take().is_some() {
            self.generation += 1;
        }
        self.is_playing = false;
        self.pause = None;
        self.paused_position_seconds = None;
    }
}

/// Shared state accessible by all components
pub struct SharedState {
    catalog: Catalog,
    state: RwLock<PlaybackState>,
    events: EventBus,
    /// Generation the engine's current track started under
    ///
    /// Readable without the lock so the engine's end handler can stamp its
    /// signal from any context.
    playing_generation: AtomicU64,
}

impl SharedState {
    pub fn new(catalog: Catalog, state: PlaybackState, events: EventBus) -> Self {
        Self {
            catalog,
            state: RwLock::new(state),
            events,
            playing_generation: AtomicU64::new(0),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Record the generation a freshly started track plays under
    pub fn mark_playing(&self, generation: u64) {
        self.playing_generation.store(generation, Ordering::SeqCst);
    }

    pub fn playing_generation(&self) -> u64 {
        self.playing_generation.load(Ordering::SeqCst)
    }

    /// Broadcast an event to all subscribers
    pub fn emit(&self, event: TodEvent) {
        self.events.emit_lossy(event);
    }

    /// Subscribe to event stream
    pub fn subscribe(&self) -> broadcast::Receiver<TodEvent> {
        self.events.subscribe()
    }

    /// Run `f` against a read-only view
    pub async fn read<R>(&self, f: impl FnOnce(&PlaybackState) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    /// Run `f` under the write lock
    ///
    /// Emits `PlaybackStateChanged` when the phase differs afterwards.
    pub async fn update<R>(&self, f: impl FnOnce(&mut PlaybackState) -> R) -> R {
        let mut state = self.state.write().await;
        let old_state = state.phase();
        let result = f(&mut state);
        let new_state = state.phase();
        if old_state != new_state {
            self.emit(TodEvent::PlaybackStateChanged {
                old_state,
                new_state,
                timestamp: chrono::Utc::now(),
            });
        }
        result
    }

    pub async fn phase(&self) -> PlaybackPhase {
        self.read(PlaybackState::phase).await
    }

    /// Read model for the HTTP surface and SSE clients
    pub async fn snapshot(&self) -> PlayerSnapshot {
        self.read(|s| {
            let playlist = s.playlist_index.and_then(|id| self.catalog.get(id));
            let track = playlist
                .zip(s.current_track_index)
                .and_then(|(playlist, index)| playlist.track(index));
            PlayerSnapshot {
                phase: s.phase(),
                playlist_index: s.playlist_index,
                playlist_name: playlist.map(|p| p.name.clone()),
                current_track_index: s.current_track_index,
                current_track_name: track.map(|t| t.name.clone()),
                is_playing: s.is_playing,
                is_shuffle: s.is_shuffle,
                is_loop: s.is_loop,
                volume: s.volume,
                progress_ratio: s.progress_ratio,
                duration_seconds: s.duration_seconds,
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> SharedState {
        let settings = PlaybackSettings {
            shuffle_seed: Some(1),
            ..PlaybackSettings::default()
        };
        SharedState::new(
            Catalog::builtin(),
            PlaybackState::new(&settings, true),
            EventBus::new(16),
        )
    }

    #[tokio::test]
    async fn test_initial_phase_is_idle() {
        let shared = shared();
        assert_eq!(shared.phase().await, PlaybackPhase::Idle);
        let snapshot = shared.snapshot().await;
        assert_eq!(snapshot.volume, 0.5);
        assert!(snapshot.is_shuffle);
        assert!(snapshot.is_loop);
        assert!(snapshot.playlist_name.is_none());
    }

    #[tokio::test]
    async fn test_update_emits_phase_change() {
        let shared = shared();
        let mut rx = shared.subscribe();

        shared.update(|s| s.playlist_index = Some(0)).await;
        match rx.try_recv() {
            Ok(TodEvent::PlaybackStateChanged {
                old_state,
                new_state,
                ..
            }) => {
                assert_eq!(old_state, PlaybackPhase::Idle);
                assert_eq!(new_state, PlaybackPhase::Stopped);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        // Same phase: no event
        shared.update(|s| s.volume = 0.2).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_phase_precedence() {
        let shared = shared();
        shared
            .update(|s| {
                s.playlist_index = Some(1);
                s.pause = Some(PauseKind::InPlace);
            })
            .await;
        assert_eq!(shared.phase().await, PlaybackPhase::Paused);

        shared.update(|s| s.loading = Some(3)).await;
        assert_eq!(shared.phase().await, PlaybackPhase::Loading);
    }

    #[tokio::test]
    async fn test_halt_invalidates_pending_load() {
        let shared = shared();
        let generation = shared
            .update(|s| {
                s.playlist_index = Some(0);
                s.loading = Some(7);
                s.is_playing = true;
                s.paused_position_seconds = Some(4.0);
                s.halt();
                s.generation
            })
            .await;
        assert_eq!(generation, 1);
        assert_eq!(shared.phase().await, PlaybackPhase::Stopped);
        assert!(shared.read(|s| s.paused_position_seconds.is_none()).await);
    }

    #[tokio::test]
    async fn test_snapshot_names_cursor_track() {
        let shared = shared();
        shared
            .update(|s| {
                s.playlist_index = Some(0);
                s.current_track_index = Some(1);
            })
            .await;
        let snapshot = shared.snapshot().await;
        let expected = Catalog::builtin().get(0).unwrap().track(1).unwrap().name.clone();
        assert_eq!(snapshot.current_track_name, Some(expected));
        assert_eq!(snapshot.playlist_name.as_deref(), Some(Catalog::builtin().get(0).unwrap().name.as_str()));
    }
}
