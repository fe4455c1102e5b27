//! Progress reporter
//!
//! Polls the engine's playhead on a fixed period and publishes progress. The
//! loop runs for the life of the current track and simply does nothing on
//! ticks where playback is paused or stopped, so pause/resume never has to
//! tear it down.

use crate::engine::probe::best_effort;
use crate::engine::{Capability, PlaybackEngine};
use crate::state::SharedState;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tod_common::events::TodEvent;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

pub struct ProgressReporter {
    shared: Arc<SharedState>,
    engine: Arc<dyn PlaybackEngine>,
    period: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ProgressReporter {
    pub fn new(shared: Arc<SharedState>, engine: Arc<dyn PlaybackEngine>, period: Duration) -> Self {
        Self {
            shared,
            engine,
            period,
            task: Mutex::new(None),
        }
    }

    /// (Re)start polling; any previous loop is cancelled first
    pub fn start(&self) {
        let mut slot = self.slot();
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        let shared = Arc::clone(&self.shared);
        let engine = Arc::clone(&self.engine);
        let period = self.period;
        *slot = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                tick(&shared, engine.as_ref()).await;
            }
        }));
        debug!("Progress reporter started ({:?} period)", period);
    }

    pub fn stop(&self) {
        if let Some(task) = self.slot().take() {
            task.abort();
            debug!("Progress reporter stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.slot().as_ref().is_some_and(|task| !task.is_finished())
    }

    fn slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One poll: read the playhead and publish the ratio
///
/// Returns the published ratio, or `None` when the tick was a no-op. A tick
/// that straddles the start or completion of a load is discarded.
pub async fn tick(shared: &SharedState, engine: &dyn PlaybackEngine) -> Option<f64> {
    let (generation, duration) = shared
        .read(|s| (s.is_playing && s.loading.is_none()).then_some((s.generation, s.duration_seconds)))
        .await?;

    let position = best_effort(engine, Capability::Position, |e| e.position()).unwrap_or(0.0);
    if duration.is_nan() || duration <= 0.0 {
        return None;
    }
    let ratio = (position / duration).clamp(0.0, 1.0);

    let published = shared
        .update(|s| {
            if s.generation != generation || !s.is_playing {
                return false;
            }
            s.progress_ratio = ratio;
            true
        })
        .await;
    if !published {
        debug!("Dropping progress tick from a previous load");
        return None;
    }

    shared.emit(TodEvent::PlaybackProgress {
        progress_ratio: ratio,
        position_seconds: position.clamp(0.0, duration),
        duration_seconds: duration,
        timestamp: chrono::Utc::now(),
    });
    Some(ratio)
}
