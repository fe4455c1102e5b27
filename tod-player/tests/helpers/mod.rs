//! Test helper modules for tod-player integration tests
//!
//! - ScriptedEngine: engine adapter with a configurable capability set
//! - ScriptedFetcher: raw-source fetcher that succeeds or fails on demand
//! - Harness: orchestrator wired to both, plus an event recorder

#![allow(dead_code)]

pub mod scripted_engine;

pub use scripted_engine::{Call, LoadMode, ScriptedEngine};

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tod_common::events::TodEvent;
use tod_common::{Catalog, Playlist, Track};
use tod_player::config::PlaybackSettings;
use tod_player::playback::{InitState, Orchestrator, SourceFetcher};
use tokio::sync::broadcast;

/// Fetcher that returns fixed bytes, or fails
pub struct ScriptedFetcher {
    fail: bool,
    requests: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl SourceFetcher for ScriptedFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, tod_player::Result<Vec<u8>>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(url.to_string());
            if self.fail {
                Err(tod_player::Error::Fetch(format!("scripted failure for {}", url)))
            } else {
                Ok(b"M.K.".to_vec())
            }
        })
    }
}

/// URL of track `index` in playlist `playlist` of the test catalog
pub fn url(playlist: &str, index: usize) -> String {
    format!("/Music/{}/{}.mod", playlist.to_lowercase(), index)
}

/// ALPHA (4 tracks), BETA (3 tracks), EMPTY (no tracks)
pub fn test_catalog() -> Catalog {
    let playlist = |name: &str, count: usize| {
        Playlist::new(
            name,
            (0..count)
                .map(|i| Track::new(format!("{} {}", name, i), url(name, i)))
                .collect(),
        )
    };
    Catalog::new(vec![playlist("ALPHA", 4), playlist("BETA", 3), playlist("EMPTY", 0)]).unwrap()
}

pub const ALPHA: usize = 0;
pub const BETA: usize = 1;
pub const EMPTY: usize = 2;

/// Deterministic settings: sequential, looping, seeded picks
pub fn settings() -> PlaybackSettings {
    PlaybackSettings {
        shuffle: false,
        loop_playlist: true,
        shuffle_seed: Some(17),
        ..PlaybackSettings::default()
    }
}

pub struct Harness {
    pub engine: Arc<ScriptedEngine>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub orchestrator: Arc<Orchestrator>,
    pub events: EventLog,
}

impl Harness {
    pub fn new(engine: Arc<ScriptedEngine>) -> Self {
        Self::build(engine, ScriptedFetcher::ok(), settings(), true)
    }

    pub fn build(
        engine: Arc<ScriptedEngine>,
        fetcher: Arc<ScriptedFetcher>,
        settings: PlaybackSettings,
        engine_ready: bool,
    ) -> Self {
        let orchestrator = Orchestrator::new(
            engine.clone(),
            fetcher.clone(),
            test_catalog(),
            &settings,
            InitState { engine_ready },
        );
        let events = EventLog::new(orchestrator.subscribe());
        Self {
            engine,
            fetcher,
            orchestrator,
            events,
        }
    }

    /// Select ALPHA and move to track `index` with a completed load
    pub async fn playing_alpha(&self, index: usize) {
        self.orchestrator.select_playlist(ALPHA).await.unwrap();
        assert!(self.orchestrator.play_track(index).await);
        self.engine.clear_calls();
        self.events.drain();
    }
}

/// Collects events published by the orchestrator
pub struct EventLog {
    rx: Mutex<broadcast::Receiver<TodEvent>>,
}

impl EventLog {
    pub fn new(rx: broadcast::Receiver<TodEvent>) -> Self {
        Self { rx: Mutex::new(rx) }
    }

    /// Everything published since the last drain
    pub fn drain(&self) -> Vec<TodEvent> {
        let mut rx = self.rx.lock().unwrap();
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Event type names published since the last drain
    pub fn drain_types(&self) -> Vec<&'static str> {
        self.drain().iter().map(TodEvent::event_type).collect()
    }
}

/// Let spawned tasks run
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
