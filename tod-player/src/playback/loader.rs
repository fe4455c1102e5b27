//! Load coordinator
//!
//! Single-flight track loading. A load is split in two so callers can claim
//! the slot in the same critical section where they move the cursor:
//!
//! 1. [`LoadCoordinator::claim`] validates the request, supersedes any load
//!    in flight and issues a fresh token. Runs under the state write lock.
//! 2. [`LoadCoordinator::run`] drives the engine: primary URL load, falling
//!    back to fetch-then-load when the engine refuses the URL, then waits for
//!    the callback. A completion whose token is no longer current is dropped.

use super::fetch::SourceFetcher;
use super::progress::ProgressReporter;
use crate::engine::probe::{best_effort, run_transport, stop_quietly, START_LOADED};
use crate::engine::{Capability, EngineBuffer, PlaybackEngine, TrackSource};
use crate::state::{PlaybackState, SharedState};
use std::sync::Arc;
use std::time::Duration;
use tod_common::events::TodEvent;
use tod_common::Track;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// How a load request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The track loaded and playback started
    Started,
    /// Invalid request (engine not ready, no playlist, index out of range)
    Rejected,
    /// A newer load or a halt took over
    Superseded,
    /// Both load paths failed, or the engine never answered
    Failed,
}

impl LoadOutcome {
    pub fn is_started(self) -> bool {
        self == LoadOutcome::Started
    }
}

/// A claimed load slot
#[derive(Debug)]
#[must_use = "a claimed load does nothing until run"]
pub struct LoadClaim {
    token: u64,
    index: usize,
    track: Track,
}

impl LoadClaim {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn track(&self) -> &Track {
        &self.track
    }
}

pub struct LoadCoordinator {
    shared: Arc<SharedState>,
    engine: Arc<dyn PlaybackEngine>,
    fetcher: Arc<dyn SourceFetcher>,
    progress: Arc<ProgressReporter>,
    timeout: Duration,
}

impl LoadCoordinator {
    pub fn new(
        shared: Arc<SharedState>,
        engine: Arc<dyn PlaybackEngine>,
        fetcher: Arc<dyn SourceFetcher>,
        progress: Arc<ProgressReporter>,
        timeout: Duration,
    ) -> Self {
        Self {
            shared,
            engine,
            fetcher,
            progress,
            timeout,
        }
    }

    /// Claim the load slot for `index` of the selected playlist
    ///
    /// Returns `None` without touching state when the engine is not ready,
    /// no playlist is selected or the index is out of range.
    pub fn claim(&self, state: &mut PlaybackState, index: usize) -> Option<LoadClaim> {
        if !state.engine_ready {
            debug!("Load of track {} rejected: engine not ready", index);
            return None;
        }
        let playlist = state
            .playlist_index
            .and_then(|id| self.shared.catalog().get(id))?;
        let Some(track) = playlist.track(index) else {
            debug!(
                "Load rejected: index {} out of range for '{}' ({} tracks)",
                index,
                playlist.name,
                playlist.len()
            );
            return None;
        };

        if let Some(previous) = state.loading {
            debug!("Load #{} superseded", previous);
            stop_quietly(self.engine.as_ref());
        }

        state.generation += 1;
        let token = state.generation;
        state.loading = Some(token);
        state.loaded_buffer = None;
        state.paused_position_seconds = None;
        state.pause = None;
        state.is_playing = false;
        state.progress_ratio = 0.0;

        Some(LoadClaim {
            token,
            index,
            track: track.clone(),
        })
    }

    /// Claim and run in one step
    pub async fn request_load(&self, index: usize) -> LoadOutcome {
        match self.shared.update(|s| self.claim(s, index)).await {
            Some(claim) => self.run(claim).await,
            None => LoadOutcome::Rejected,
        }
    }

    /// Drive a claimed load to completion
    pub async fn run(&self, claim: LoadClaim) -> LoadOutcome {
        if !self.is_current(claim.token).await {
            return LoadOutcome::Superseded;
        }
        let engine = self.engine.as_ref();
        best_effort(engine, Capability::ResumeOutput, |e| e.resume_output());
        stop_quietly(engine);

        info!("Loading '{}' from {}", claim.track.name, claim.track.url);

        let (tx, completion) = oneshot::channel();
        let on_ready = Box::new(move |buffer: EngineBuffer| {
            let _ = tx.send(buffer);
        });

        let completion = match engine.load(TrackSource::Url(claim.track.url.clone()), on_ready) {
            Ok(()) => completion,
            Err(e) => {
                warn!("Engine refused {}: {}; fetching raw module", claim.track.url, e);
                match self.load_fetched(&claim).await {
                    Ok(Some(completion)) => completion,
                    Ok(None) => return LoadOutcome::Superseded,
                    Err(reason) => return self.fail(&claim, reason).await,
                }
            }
        };

        match tokio::time::timeout(self.timeout, completion).await {
            Ok(Ok(buffer)) => self.complete(claim, buffer).await,
            Ok(Err(_)) => {
                self.abandon(&claim, "engine dropped the load without a result")
                    .await
            }
            Err(_) => {
                self.abandon(&claim, &format!("no result after {:?}", self.timeout))
                    .await
            }
        }
    }

    /// Fallback path: fetch bytes, then hand them to the engine
    ///
    /// `Ok(None)` means the claim went stale while fetching.
    async fn load_fetched(
        &self,
        claim: &LoadClaim,
    ) -> std::result::Result<Option<oneshot::Receiver<EngineBuffer>>, String> {
        let bytes = self
            .fetcher
            .fetch(&claim.track.url)
            .await
            .map_err(|e| format!("fetch failed: {}", e))?;

        if !self.is_current(claim.token).await {
            debug!("Load #{} superseded while fetching", claim.token);
            return Ok(None);
        }

        let (tx, completion) = oneshot::channel();
        let on_ready = Box::new(move |buffer: EngineBuffer| {
            let _ = tx.send(buffer);
        });
        self.engine
            .load(TrackSource::Bytes(bytes), on_ready)
            .map_err(|e| format!("engine rejected fetched module: {}", e))?;
        Ok(Some(completion))
    }

    async fn is_current(&self, token: u64) -> bool {
        self.shared.read(|s| s.loading == Some(token)).await
    }

    async fn complete(&self, claim: LoadClaim, buffer: EngineBuffer) -> LoadOutcome {
        let engine = self.engine.as_ref();
        let started = self
            .shared
            .update(|s| {
                if s.loading != Some(claim.token) {
                    return None;
                }
                s.loading = None;
                s.generation += 1;
                self.shared.mark_playing(s.generation);
                s.loaded_buffer = Some(buffer.clone());

                run_transport(engine, START_LOADED, Some(&buffer), "start loaded track");
                s.is_playing = true;

                let reported = best_effort(engine, Capability::Metadata, |e| e.metadata())
                    .and_then(|m| m.duration_seconds)
                    .filter(|d| d.is_finite() && *d > 0.0);
                if let Some(duration) = reported {
                    s.duration_seconds = duration;
                }
                s.progress_ratio = 0.0;
                Some(s.duration_seconds)
            })
            .await;

        let Some(duration_seconds) = started else {
            debug!("Discarding completed load #{} ({}): superseded", claim.token, claim.track.name);
            return LoadOutcome::Superseded;
        };

        self.shared.emit(TodEvent::TrackStarted {
            track_index: claim.index,
            track_name: claim.track.name.clone(),
            duration_seconds,
            timestamp: chrono::Utc::now(),
        });
        self.progress.start();
        info!("Playing '{}' ({:.1}s)", claim.track.name, duration_seconds);
        LoadOutcome::Started
    }

    /// Both load paths failed: release the slot and report it
    async fn fail(&self, claim: &LoadClaim, reason: String) -> LoadOutcome {
        warn!("Could not load '{}': {}", claim.track.name, reason);
        let released = self.release(claim.token).await;
        if !released {
            return LoadOutcome::Superseded;
        }
        self.shared.emit(TodEvent::LoadFailed {
            track_index: claim.index,
            track_name: claim.track.name.clone(),
            reason,
            timestamp: chrono::Utc::now(),
        });
        LoadOutcome::Failed
    }

    /// The engine never answered: release the slot quietly
    async fn abandon(&self, claim: &LoadClaim, reason: &str) -> LoadOutcome {
        if self.release(claim.token).await {
            warn!("Load of '{}' abandoned: {}", claim.track.name, reason);
            LoadOutcome::Failed
        } else {
            LoadOutcome::Superseded
        }
    }

    async fn release(&self, token: u64) -> bool {
        self.shared
            .update(|s| {
                if s.loading != Some(token) {
                    return false;
                }
                s.loading = None;
                s.is_playing = false;
                true
            })
            .await
    }
}
