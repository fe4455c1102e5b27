//! Playback orchestrator
//!
//! Owns the player's state machine and turns user commands and engine
//! signals into engine calls, state changes and events. Every command makes
//! its decision inside one [`SharedState::update`] call; only the awaiting
//! part of a load runs outside it.

use super::fetch::SourceFetcher;
use super::loader::{LoadClaim, LoadCoordinator};
use super::progress::ProgressReporter;
use super::transition::{self, Decision, Direction};
use crate::config::PlaybackSettings;
use crate::engine::probe::{
    best_effort, first_available, reposition, run_transport, stop_quietly, Probe, PAUSE, REPLAY,
    RESUME, SEEK,
};
use crate::engine::{Capability, PlaybackEngine};
use crate::error::{Error, Result};
use crate::state::{PauseKind, PlaybackState, SharedState};
use rand::Rng;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tod_common::events::{ClickCue, CursorTrigger, EventBus, PlaybackPhase, PlayerSnapshot, TodEvent};
use tod_common::Catalog;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Engine initialization state at construction time
#[derive(Debug, Clone, Copy, Default)]
pub struct InitState {
    pub engine_ready: bool,
}

/// What a play/pause press turned into
enum Press {
    Ignored,
    Paused,
    Resumed,
    /// Buffer replayed from the top; seek to the position once it settles
    Replayed { settle_seek: Option<(u64, f64)> },
    Load(LoadClaim),
}

/// What a skip or track end turned into
enum Advance {
    Ignored,
    Load(Option<LoadClaim>),
    Halted,
}

pub struct Orchestrator {
    shared: Arc<SharedState>,
    engine: Arc<dyn PlaybackEngine>,
    loader: LoadCoordinator,
    progress: Arc<ProgressReporter>,
    settle_delay: Duration,
    end_listener: Mutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    /// Build the orchestrator and attach it to the engine's end signal
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        engine: Arc<dyn PlaybackEngine>,
        fetcher: Arc<dyn SourceFetcher>,
        catalog: Catalog,
        settings: &PlaybackSettings,
        init: InitState,
    ) -> Arc<Self> {
        let state = PlaybackState::new(settings, init.engine_ready);
        let volume = state.volume;
        let shared = Arc::new(SharedState::new(
            catalog,
            state,
            EventBus::new(settings.event_capacity),
        ));
        let progress = Arc::new(ProgressReporter::new(
            Arc::clone(&shared),
            Arc::clone(&engine),
            settings.progress_interval(),
        ));
        let loader = LoadCoordinator::new(
            Arc::clone(&shared),
            Arc::clone(&engine),
            fetcher,
            Arc::clone(&progress),
            settings.load_timeout(),
        );

        if init.engine_ready {
            best_effort(engine.as_ref(), Capability::SetVolume, |e| e.set_volume(volume));
        }
        info!(
            "Orchestrator using engine '{}' with {:?}",
            engine.name(),
            engine.capabilities()
        );

        let orchestrator = Arc::new(Self {
            shared,
            engine,
            loader,
            progress,
            settle_delay: settings.resume_settle(),
            end_listener: Mutex::new(None),
        });
        orchestrator.listen_for_track_end();
        orchestrator
    }

    /// Route the engine's end signal into `handle_track_end`
    ///
    /// The engine calls the handler from its own context; it only posts the
    /// generation of the track that was playing. The listener holds a weak
    /// reference so it never keeps the orchestrator alive.
    fn listen_for_track_end(self: &Arc<Self>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<u64>();
        let shared = self.shared.clone();
        self.engine.set_end_handler(Arc::new(move || {
            let _ = tx.send(shared.playing_generation());
        }));

        let weak = Arc::downgrade(self);
        let listener = tokio::spawn(async move {
            while let Some(generation) = rx.recv().await {
                let Some(orchestrator) = weak.upgrade() else {
                    break;
                };
                orchestrator.handle_track_end(generation).await;
            }
        });
        *lock(&self.end_listener) = Some(listener);
    }

    pub fn catalog(&self) -> &Catalog {
        self.shared.catalog()
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TodEvent> {
        self.shared.subscribe()
    }

    pub async fn snapshot(&self) -> PlayerSnapshot {
        self.shared.snapshot().await
    }

    pub async fn phase(&self) -> PlaybackPhase {
        self.shared.phase().await
    }

    fn click(&self, cue: ClickCue) {
        self.shared.emit(TodEvent::ClickCue {
            cue,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Move the cursor and announce it
    fn move_cursor(&self, state: &mut PlaybackState, index: Option<usize>, trigger: CursorTrigger) {
        state.current_track_index = index;
        let track_name = state
            .playlist_index
            .and_then(|id| self.shared.catalog().get(id))
            .zip(index)
            .and_then(|(playlist, index)| playlist.track(index))
            .map(|track| track.name.clone());
        self.shared.emit(TodEvent::TrackChanged {
            track_index: index,
            track_name,
            trigger,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Halt playback: stop the engine and forget any pause or pending load
    fn halt(&self, state: &mut PlaybackState) {
        state.halt();
        if state.engine_ready {
            stop_quietly(self.engine.as_ref());
        }
    }

    async fn run_load(&self, claim: Option<LoadClaim>) -> bool {
        match claim {
            Some(claim) => self.loader.run(claim).await.is_started(),
            None => false,
        }
    }

    /// Select a playlist and start a random track from it
    ///
    /// Returns `Ok(true)` when a track started. Playback only starts once the
    /// engine is ready; before that the cursor is still picked.
    pub async fn select_playlist(&self, playlist_index: usize) -> Result<bool> {
        let playlist = self
            .shared
            .catalog()
            .get(playlist_index)
            .ok_or_else(|| Error::NotFound(format!("playlist {}", playlist_index)))?;
        self.click(ClickCue::Playlist);
        info!("Selecting playlist '{}'", playlist.name);

        let claim = self
            .shared
            .update(|s| {
                s.playlist_index = Some(playlist_index);
                s.loaded_buffer = None;
                self.halt(s);
                self.shared.emit(TodEvent::PlaylistSelected {
                    playlist_index,
                    playlist_name: playlist.name.clone(),
                    track_count: playlist.len(),
                    timestamp: chrono::Utc::now(),
                });

                let cursor = (!playlist.is_empty()).then(|| s.rng.gen_range(0..playlist.len()));
                self.move_cursor(s, cursor, CursorTrigger::Playlist);
                cursor.and_then(|index| self.loader.claim(s, index))
            })
            .await;

        Ok(self.run_load(claim).await)
    }

    /// Play the track at `index` of the selected playlist
    ///
    /// An index outside the playlist (or no playlist) changes nothing.
    pub async fn play_track(&self, index: usize) -> bool {
        self.click(ClickCue::Controls);
        let claim = self
            .shared
            .update(|s| {
                let len = s
                    .playlist_index
                    .and_then(|id| self.shared.catalog().get(id))
                    .map(|p| p.len())?;
                if index >= len {
                    debug!("Ignoring play of track {} (playlist has {})", index, len);
                    return None;
                }
                self.move_cursor(s, Some(index), CursorTrigger::Select);
                self.loader.claim(s, index)
            })
            .await;
        self.run_load(claim).await
    }

    /// Toggle between playing and paused, returning the resulting phase
    ///
    /// Pausing never changes track. Resuming prefers, in order: resume in
    /// place, replay of the retained buffer, then loading the cursor track
    /// (or a random one when there is no cursor). Does nothing while a load
    /// is in flight.
    pub async fn play_pause(&self) -> PlaybackPhase {
        self.click(ClickCue::Controls);
        let engine = self.engine.as_ref();

        let ready = self.shared.read(|s| s.engine_ready).await;
        if !ready {
            debug!("Play/pause ignored: engine not ready");
            return self.phase().await;
        }
        best_effort(engine, Capability::ResumeOutput, |e| e.resume_output());

        let press = self.shared.update(|s| self.press(s)).await;

        match press {
            Press::Ignored | Press::Paused => {}
            Press::Resumed => self.progress.start(),
            Press::Replayed { settle_seek } => {
                self.progress.start();
                if let Some((generation, seconds)) = settle_seek {
                    self.schedule_settle_seek(generation, seconds);
                }
            }
            Press::Load(claim) => {
                self.loader.run(claim).await;
            }
        }
        self.phase().await
    }

    fn press(&self, s: &mut PlaybackState) -> Press {
        let engine = self.engine.as_ref();

        if s.is_playing {
            match run_transport(engine, PAUSE, None, "pause") {
                Probe::Exhausted => {
                    s.paused_position_seconds = best_effort(engine, Capability::Position, |e| e.position());
                    stop_quietly(engine);
                    s.pause = Some(PauseKind::Halted);
                }
                Probe::Done { .. } | Probe::Failed { .. } => s.pause = Some(PauseKind::InPlace),
            }
            s.is_playing = false;
            return Press::Paused;
        }

        if s.pause == Some(PauseKind::InPlace)
            && s.loaded_buffer.is_some()
            && run_transport(engine, RESUME, None, "resume").is_done()
        {
            s.pause = None;
            s.is_playing = true;
            return Press::Resumed;
        }

        if let Some(buffer) = s.loaded_buffer.clone() {
            if run_transport(engine, REPLAY, Some(&buffer), "replay").is_done() {
                s.pause = None;
                s.is_playing = true;
                let settle_seek = s.paused_position_seconds.map(|seconds| (s.generation, seconds));
                return Press::Replayed { settle_seek };
            }
            warn!("Replay of loaded buffer failed, loading the cursor track instead");
        }

        if s.loading.is_some() {
            debug!("Play/pause ignored: load in flight");
            return Press::Ignored;
        }

        let Some(len) = s
            .playlist_index
            .and_then(|id| self.shared.catalog().get(id))
            .map(|p| p.len())
            .filter(|len| *len > 0)
        else {
            return Press::Ignored;
        };
        let index = match s.current_track_index {
            Some(index) => index,
            None => s.rng.gen_range(0..len),
        };
        self.move_cursor(s, Some(index), CursorTrigger::Select);
        match self.loader.claim(s, index) {
            Some(claim) => Press::Load(claim),
            None => Press::Ignored,
        }
    }

    /// Seek to the remembered position once a replay has had time to start
    fn schedule_settle_seek(&self, generation: u64, seconds: f64) {
        let shared = Arc::clone(&self.shared);
        let engine = Arc::clone(&self.engine);
        let delay = self.settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared
                .update(|s| {
                    if s.generation != generation || s.loading.is_some() || !s.is_playing {
                        debug!("Settle seek dropped: playback moved on");
                        return;
                    }
                    first_available(engine.as_ref(), SEEK, |e, cap| reposition(e, cap, seconds))
                        .logged("resume seek");
                    s.paused_position_seconds = None;
                })
                .await;
        });
    }

    /// Manual skip forward
    pub async fn next(&self) -> bool {
        self.skip(Direction::Next).await
    }

    /// Manual skip backward
    pub async fn previous(&self) -> bool {
        self.skip(Direction::Prev).await
    }

    async fn skip(&self, direction: Direction) -> bool {
        self.click(ClickCue::Controls);
        let advance = self
            .shared
            .update(|s| {
                let Some(decision) = self.decide(s, direction) else {
                    return Advance::Ignored;
                };
                match decision {
                    Decision::Play(index) => {
                        self.move_cursor(s, Some(index), CursorTrigger::Skip);
                        Advance::Load(self.loader.claim(s, index))
                    }
                    Decision::Stop { candidate } => {
                        if s.current_track_index != Some(candidate) {
                            s.loaded_buffer = None;
                        }
                        self.move_cursor(s, Some(candidate), CursorTrigger::Skip);
                        self.halt(s);
                        Advance::Halted
                    }
                }
            })
            .await;
        self.finish_advance(advance).await
    }

    /// Natural end of the current track
    ///
    /// Same policy as a manual skip forward, except that reaching the end of
    /// a non-looping playlist leaves the cursor on the finished track, and no
    /// click cue is emitted. Ignored unless something is actually playing,
    /// and ignored when `generation` names a track that has since been
    /// replaced.
    pub async fn handle_track_end(&self, generation: u64) -> bool {
        let advance = self
            .shared
            .update(|s| {
                if !s.is_playing || s.loading.is_some() {
                    debug!("Ignoring end-of-track signal: not playing");
                    return Advance::Ignored;
                }
                if s.generation != generation {
                    debug!(
                        "Ignoring stale end-of-track signal (generation {}, now {})",
                        generation, s.generation
                    );
                    return Advance::Ignored;
                }
                let Some(decision) = self.decide(s, Direction::Next) else {
                    return Advance::Ignored;
                };
                match decision {
                    Decision::Play(index) => {
                        self.move_cursor(s, Some(index), CursorTrigger::TrackEnd);
                        Advance::Load(self.loader.claim(s, index))
                    }
                    Decision::Stop { .. } => {
                        info!("End of playlist reached");
                        self.halt(s);
                        Advance::Halted
                    }
                }
            })
            .await;
        self.finish_advance(advance).await
    }

    fn decide(&self, s: &mut PlaybackState, direction: Direction) -> Option<Decision> {
        let len = s
            .playlist_index
            .and_then(|id| self.shared.catalog().get(id))
            .map(|p| p.len())?;
        transition::next_index(
            &mut s.rng,
            s.current_track_index,
            len,
            s.is_shuffle,
            s.is_loop,
            direction,
        )
    }

    async fn finish_advance(&self, advance: Advance) -> bool {
        match advance {
            Advance::Ignored => false,
            Advance::Halted => {
                self.progress.stop();
                false
            }
            Advance::Load(claim) => self.run_load(claim).await,
        }
    }

    /// Flip shuffle, returning the new value
    pub async fn toggle_shuffle(&self) -> bool {
        self.click(ClickCue::Controls);
        let enabled = self
            .shared
            .update(|s| {
                s.is_shuffle = !s.is_shuffle;
                s.is_shuffle
            })
            .await;
        self.shared.emit(TodEvent::ShuffleChanged {
            enabled,
            timestamp: chrono::Utc::now(),
        });
        enabled
    }

    /// Flip loop, returning the new value
    pub async fn toggle_loop(&self) -> bool {
        self.click(ClickCue::Controls);
        let enabled = self
            .shared
            .update(|s| {
                s.is_loop = !s.is_loop;
                s.is_loop
            })
            .await;
        self.shared.emit(TodEvent::LoopChanged {
            enabled,
            timestamp: chrono::Utc::now(),
        });
        enabled
    }

    /// Seek to `ratio` (0.0-1.0) of the current track
    ///
    /// Progress is published immediately. The engine is then asked to
    /// reposition, and the position is remembered for a later replay.
    /// Returns whether the engine accepted the seek. Does nothing beyond the
    /// progress update while the duration is unknown or a load is in flight.
    pub async fn seek(&self, ratio: f64) -> bool {
        let ratio = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
        let engine = self.engine.as_ref();
        self.shared
            .update(|s| {
                s.progress_ratio = ratio;
                let duration = s.duration_seconds;
                let seconds = ratio * duration;
                self.shared.emit(TodEvent::PlaybackProgress {
                    progress_ratio: ratio,
                    position_seconds: seconds,
                    duration_seconds: duration,
                    timestamp: chrono::Utc::now(),
                });

                if !s.engine_ready || s.loading.is_some() || duration <= 0.0 {
                    return false;
                }
                s.paused_position_seconds = Some(seconds);
                first_available(engine, SEEK, |e, cap| reposition(e, cap, seconds))
                    .logged("seek")
                    .is_done()
            })
            .await
    }

    /// Set master volume, returning the clamped value
    ///
    /// Before the engine is ready the value is only stored; it is applied
    /// when the engine becomes ready.
    pub async fn set_volume(&self, ratio: f32) -> f32 {
        let volume = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
        let engine = self.engine.as_ref();
        self.shared
            .update(|s| {
                s.volume = volume;
                if s.engine_ready {
                    best_effort(engine, Capability::SetVolume, |e| e.set_volume(volume));
                } else {
                    debug!("Engine not ready, volume {:.2} deferred", volume);
                }
            })
            .await;
        self.shared.emit(TodEvent::VolumeChanged {
            volume,
            timestamp: chrono::Utc::now(),
        });
        volume
    }

    pub async fn volume(&self) -> f32 {
        self.shared.read(|s| s.volume).await
    }

    /// Engine initialization finished
    ///
    /// Applies the stored volume and starts the cursor track if a playlist
    /// was selected while the engine was still initializing. Returns whether
    /// a track started.
    pub async fn mark_engine_ready(&self) -> bool {
        let engine = self.engine.as_ref();
        let claim = self
            .shared
            .update(|s| {
                if s.engine_ready {
                    return None;
                }
                s.engine_ready = true;
                info!("Engine '{}' ready", engine.name());
                best_effort(engine, Capability::SetVolume, |e| e.set_volume(s.volume));

                let index = s.current_track_index?;
                if s.loading.is_some() || s.loaded_buffer.is_some() {
                    return None;
                }
                self.loader.claim(s, index)
            })
            .await;
        self.run_load(claim).await
    }

    /// Stop playback and release background tasks
    pub async fn shutdown(&self) {
        info!("Shutting down playback");
        self.progress.stop();
        if let Some(listener) = lock(&self.end_listener).take() {
            listener.abort();
        }
        self.shared.update(|s| self.halt(s)).await;
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if let Some(listener) = lock(&self.end_listener).take() {
            listener.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
