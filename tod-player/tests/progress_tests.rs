//! Progress reporting tests
//!
//! Run with paused time so ticks fire deterministically.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::*;
use tod_common::events::{EventBus, TodEvent};
use tod_player::engine::{
    Capabilities, EndHandler, EngineResult, LoadCallback, PlaybackEngine, TrackSource,
};
use tod_player::playback::{progress, ProgressReporter};
use tod_player::state::PlaybackState;
use tod_player::SharedState;

fn progress_events(events: Vec<TodEvent>) -> Vec<(f64, f64)> {
    events
        .into_iter()
        .filter_map(|e| match e {
            TodEvent::PlaybackProgress {
                progress_ratio,
                position_seconds,
                ..
            } => Some((progress_ratio, position_seconds)),
            _ => None,
        })
        .collect()
}

fn standalone() -> (Arc<SharedState>, Arc<ScriptedEngine>) {
    let shared = Arc::new(SharedState::new(
        test_catalog(),
        PlaybackState::new(&settings(), true),
        EventBus::new(16),
    ));
    (shared, ScriptedEngine::full())
}

#[tokio::test(start_paused = true)]
async fn test_progress_published_while_playing() {
    let h = Harness::new(ScriptedEngine::full());
    h.playing_alpha(0).await;
    h.engine.set_playhead(30.0);

    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(h.orchestrator.snapshot().await.progress_ratio, 0.25);
    assert_eq!(progress_events(h.events.drain()), vec![(0.25, 30.0)]);
}

#[tokio::test(start_paused = true)]
async fn test_no_progress_while_paused() {
    let h = Harness::new(ScriptedEngine::full());
    h.playing_alpha(0).await;
    h.engine.set_playhead(30.0);
    tokio::time::sleep(Duration::from_millis(250)).await;

    h.orchestrator.play_pause().await;
    h.events.drain();
    h.engine.set_playhead(90.0);
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(h.orchestrator.snapshot().await.progress_ratio, 0.25);
    assert!(progress_events(h.events.drain()).is_empty());

    // Picks up again after resuming
    h.orchestrator.play_pause().await;
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(h.orchestrator.snapshot().await.progress_ratio, 0.75);
}

#[tokio::test(start_paused = true)]
async fn test_no_progress_after_end_of_playlist() {
    let settings = tod_player::config::PlaybackSettings {
        loop_playlist: false,
        ..settings()
    };
    let h = Harness::build(ScriptedEngine::full(), ScriptedFetcher::ok(), settings, true);
    h.playing_alpha(3).await;

    h.engine.finish_track();
    settle().await;
    h.events.drain();
    h.engine.set_playhead(60.0);
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(progress_events(h.events.drain()).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_new_track_resets_progress() {
    let h = Harness::new(ScriptedEngine::full());
    h.playing_alpha(0).await;
    h.engine.set_playhead(60.0);
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(h.orchestrator.snapshot().await.progress_ratio, 0.5);

    assert!(h.orchestrator.play_track(1).await);
    assert_eq!(h.orchestrator.snapshot().await.progress_ratio, 0.0);
}

#[tokio::test]
async fn test_tick_requires_playing_and_duration() {
    let (shared, engine) = standalone();
    engine.set_playhead(25.0);

    assert_eq!(progress::tick(&shared, engine.as_ref()).await, None);

    shared.update(|s| s.is_playing = true).await;
    assert_eq!(progress::tick(&shared, engine.as_ref()).await, None);

    shared.update(|s| s.duration_seconds = 100.0).await;
    assert_eq!(progress::tick(&shared, engine.as_ref()).await, Some(0.25));

    shared.update(|s| s.loading = Some(s.generation + 1)).await;
    assert_eq!(progress::tick(&shared, engine.as_ref()).await, None);
}

/// Engine whose playhead query lands while a new load completes
struct LoadDuringPositionRead {
    shared: Arc<SharedState>,
}

impl PlaybackEngine for LoadDuringPositionRead {
    fn name(&self) -> &str {
        "load-during-position-read"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::POSITION
    }

    fn load(&self, _source: TrackSource, _on_ready: LoadCallback) -> EngineResult<()> {
        Ok(())
    }

    fn set_end_handler(&self, _handler: EndHandler) {}

    fn position(&self) -> EngineResult<f64> {
        futures::executor::block_on(self.shared.update(|s| s.generation += 1));
        Ok(30.0)
    }
}

#[tokio::test]
async fn test_tick_straddling_a_load_is_discarded() {
    let (shared, _) = standalone();
    shared
        .update(|s| {
            s.is_playing = true;
            s.duration_seconds = 100.0;
            s.progress_ratio = 0.1;
        })
        .await;
    let mut rx = shared.subscribe();
    let engine = LoadDuringPositionRead {
        shared: shared.clone(),
    };

    assert_eq!(progress::tick(&shared, &engine).await, None);
    assert_eq!(shared.read(|s| s.progress_ratio).await, 0.1);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_tick_clamps_ratio() {
    let (shared, engine) = standalone();
    shared
        .update(|s| {
            s.is_playing = true;
            s.duration_seconds = 100.0;
        })
        .await;

    engine.set_playhead(250.0);
    assert_eq!(progress::tick(&shared, engine.as_ref()).await, Some(1.0));
    engine.set_playhead(-3.0);
    assert_eq!(progress::tick(&shared, engine.as_ref()).await, Some(0.0));
}

#[tokio::test(start_paused = true)]
async fn test_reporter_restart_and_stop() {
    let (shared, engine) = standalone();
    let reporter = ProgressReporter::new(shared, engine, Duration::from_millis(200));
    assert!(!reporter.is_running());

    reporter.start();
    reporter.start();
    assert!(reporter.is_running());

    reporter.stop();
    settle().await;
    assert!(!reporter.is_running());
}
