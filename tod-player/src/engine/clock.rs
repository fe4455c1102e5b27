//! Clock engine
//!
//! A silent engine adapter for running the player without a module decoder.
//! It reads module files from the media root, treats every module as
//! `track_seconds` long, advances a wall clock while "playing" and fires the
//! end handler when the clock reaches the end. Useful for exercising the
//! control surface end to end.
//!
//! It reads local paths only: `http(s)` URLs are refused synchronously, which
//! sends the player down its fetch-then-load fallback.

use super::{
    Capabilities, EndHandler, EngineBuffer, EngineError, EngineResult, LoadCallback,
    PlaybackEngine, TrackMetadata, TrackSource,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Clock engine settings
#[derive(Debug, Clone)]
pub struct ClockSettings {
    /// Folder that relative track URLs resolve against
    pub media_root: PathBuf,
    /// Length reported for every module
    pub track_seconds: f64,
}

/// "Decoded" module: just enough to report metadata
#[derive(Debug)]
struct ClockModule {
    title: String,
    size_bytes: usize,
    duration_seconds: f64,
}

#[derive(Default)]
struct ClockState {
    current: Option<EngineBuffer>,
    duration: f64,
    /// Seconds played before `started_at`
    offset: f64,
    /// Set while the clock runs
    started_at: Option<Instant>,
    volume: f32,
    /// Bumped whenever the end timer is invalidated
    epoch: u64,
    end_timer: Option<JoinHandle<()>>,
}

impl ClockState {
    fn position(&self) -> f64 {
        let running = self
            .started_at
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        (self.offset + running).min(self.duration)
    }

    fn cancel_timer(&mut self) {
        self.epoch += 1;
        if let Some(timer) = self.end_timer.take() {
            timer.abort();
        }
    }
}

/// Wall-clock engine adapter
pub struct ClockEngine {
    settings: ClockSettings,
    state: Arc<Mutex<ClockState>>,
    end_handler: Arc<Mutex<Option<EndHandler>>>,
    next_buffer_id: AtomicU64,
}

impl ClockEngine {
    pub fn new(settings: ClockSettings) -> Self {
        Self {
            settings,
            state: Arc::new(Mutex::new(ClockState {
                volume: 1.0,
                ..ClockState::default()
            })),
            end_handler: Arc::new(Mutex::new(None)),
            next_buffer_id: AtomicU64::new(1),
        }
    }

    /// Current output gain
    pub fn volume(&self) -> f32 {
        lock(&self.state).volume
    }

    fn resolve(&self, url: &str) -> PathBuf {
        self.settings.media_root.join(url.trim_start_matches('/'))
    }

    fn decode(&self, title: String, bytes: &[u8]) -> EngineBuffer {
        let id = self.next_buffer_id.fetch_add(1, Ordering::Relaxed);
        EngineBuffer::new(
            id,
            ClockModule {
                title,
                size_bytes: bytes.len(),
                duration_seconds: self.settings.track_seconds,
            },
        )
    }

    /// Start the clock from the current offset and schedule the end signal
    fn run_clock(&self, state: &mut ClockState) {
        state.cancel_timer();
        state.started_at = Some(Instant::now());

        let remaining = (state.duration - state.offset).max(0.0);
        let epoch = state.epoch;
        let shared = Arc::clone(&self.state);
        let end_handler = Arc::clone(&self.end_handler);

        state.end_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs_f64(remaining)).await;
            let finished = {
                let mut state = lock(&shared);
                if state.epoch != epoch || state.started_at.is_none() {
                    false
                } else {
                    state.offset = state.duration;
                    state.started_at = None;
                    state.end_timer = None;
                    state.epoch += 1;
                    true
                }
            };
            if finished {
                let handler = lock(&end_handler).clone();
                if let Some(handler) = handler {
                    handler();
                }
            }
        }));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn title_of(url: &str) -> String {
    Path::new(url)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| url.to_string())
}

impl PlaybackEngine for ClockEngine {
    fn name(&self) -> &str {
        "clock"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::PLAY
            | Capabilities::RESUME
            | Capabilities::PAUSE
            | Capabilities::STOP
            | Capabilities::POSITION
            | Capabilities::METADATA
            | Capabilities::SET_POSITION
            | Capabilities::SET_VOLUME
    }

    fn load(&self, source: TrackSource, on_ready: LoadCallback) -> EngineResult<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| EngineError::NotReady)?;

        match source {
            TrackSource::Url(url) => {
                if url.starts_with("http://") || url.starts_with("https://") {
                    return Err(EngineError::SourceUnsupported(url));
                }
                let path = self.resolve(&url);
                let title = title_of(&url);
                let id = self.next_buffer_id.fetch_add(1, Ordering::Relaxed);
                let track_seconds = self.settings.track_seconds;
                runtime.spawn(async move {
                    match tokio::fs::read(&path).await {
                        Ok(bytes) => {
                            debug!("Clock engine read {} ({} bytes)", path.display(), bytes.len());
                            on_ready(EngineBuffer::new(
                                id,
                                ClockModule {
                                    title,
                                    size_bytes: bytes.len(),
                                    duration_seconds: track_seconds,
                                },
                            ));
                        }
                        // The callback is dropped: the load never completes
                        Err(e) => warn!("Clock engine could not read {}: {}", path.display(), e),
                    }
                });
            }
            TrackSource::Bytes(bytes) => {
                let buffer = self.decode("module".to_string(), &bytes);
                runtime.spawn(async move {
                    tokio::task::yield_now().await;
                    on_ready(buffer);
                });
            }
        }
        Ok(())
    }

    fn set_end_handler(&self, handler: EndHandler) {
        *lock(&self.end_handler) = Some(handler);
    }

    fn play(&self, buffer: &EngineBuffer) -> EngineResult<()> {
        let module = buffer
            .downcast_ref::<ClockModule>()
            .ok_or_else(|| EngineError::Failed("buffer was not produced by this engine".into()))?;
        let mut state = lock(&self.state);
        debug!(
            "Clock engine playing '{}' ({} bytes, {:.0}s)",
            module.title, module.size_bytes, module.duration_seconds
        );
        state.current = Some(buffer.clone());
        state.duration = module.duration_seconds;
        state.offset = 0.0;
        self.run_clock(&mut state);
        Ok(())
    }

    fn resume(&self) -> EngineResult<()> {
        let mut state = lock(&self.state);
        if state.current.is_none() {
            return Err(EngineError::Failed("nothing loaded".into()));
        }
        if state.started_at.is_some() {
            return Ok(());
        }
        if state.offset >= state.duration {
            return Err(EngineError::Failed("track already finished".into()));
        }
        self.run_clock(&mut state);
        Ok(())
    }

    fn pause(&self) -> EngineResult<()> {
        let mut state = lock(&self.state);
        if state.started_at.is_some() {
            state.offset = state.position();
            state.started_at = None;
            state.cancel_timer();
        }
        Ok(())
    }

    fn stop(&self) -> EngineResult<()> {
        let mut state = lock(&self.state);
        state.cancel_timer();
        state.started_at = None;
        state.offset = 0.0;
        state.current = None;
        Ok(())
    }

    fn position(&self) -> EngineResult<f64> {
        Ok(lock(&self.state).position())
    }

    fn metadata(&self) -> EngineResult<TrackMetadata> {
        let state = lock(&self.state);
        let module = state
            .current
            .as_ref()
            .and_then(|buffer| buffer.downcast_ref::<ClockModule>());
        Ok(TrackMetadata {
            duration_seconds: module.map(|m| m.duration_seconds),
            title: module.map(|m| m.title.clone()),
        })
    }

    fn set_position(&self, seconds: f64) -> EngineResult<()> {
        let mut state = lock(&self.state);
        if state.current.is_none() {
            return Err(EngineError::Failed("nothing loaded".into()));
        }
        state.offset = seconds.clamp(0.0, state.duration);
        if state.started_at.is_some() {
            self.run_clock(&mut state);
        }
        Ok(())
    }

    fn set_volume(&self, ratio: f32) -> EngineResult<()> {
        lock(&self.state).volume = ratio.clamp(0.0, 1.0);
        Ok(())
    }
}

impl Drop for ClockEngine {
    fn drop(&mut self) {
        lock(&self.state).cancel_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::oneshot;

    fn engine(track_seconds: f64) -> ClockEngine {
        ClockEngine::new(ClockSettings {
            media_root: PathBuf::from("/nonexistent"),
            track_seconds,
        })
    }

    async fn load_bytes(engine: &ClockEngine) -> EngineBuffer {
        let (tx, rx) = oneshot::channel();
        engine
            .load(
                TrackSource::Bytes(vec![0u8; 64]),
                Box::new(move |buffer| {
                    let _ = tx.send(buffer);
                }),
            )
            .unwrap();
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn test_http_url_is_refused_synchronously() {
        let engine = engine(10.0);
        let result = engine.load(
            TrackSource::Url("http://example.com/a.mod".into()),
            Box::new(|_| {}),
        );
        assert!(matches!(result, Err(EngineError::SourceUnsupported(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_advances_and_pauses() {
        let engine = engine(10.0);
        let buffer = load_bytes(&engine).await;
        engine.play(&buffer).unwrap();
        assert_eq!(engine.metadata().unwrap().duration_seconds, Some(10.0));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert!((engine.position().unwrap() - 3.0).abs() < 0.01);

        engine.pause().unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!((engine.position().unwrap() - 3.0).abs() < 0.01);

        engine.resume().unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!((engine.position().unwrap() - 4.0).abs() < 0.01);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_handler_fires_once_at_end() {
        let engine = engine(2.0);
        let ends = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ends);
        engine.set_end_handler(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let buffer = load_bytes(&engine).await;
        engine.play(&buffer).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(ends.load(Ordering::SeqCst), 1);
        assert!((engine.position().unwrap() - 2.0).abs() < 0.01);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_does_not_fire_end_handler() {
        let engine = engine(2.0);
        let ends = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ends);
        engine.set_end_handler(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let buffer = load_bytes(&engine).await;
        engine.play(&buffer).unwrap();
        engine.stop().unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(ends.load(Ordering::SeqCst), 0);
        assert!(engine.resume().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_position_moves_playhead() {
        let engine = engine(100.0);
        let buffer = load_bytes(&engine).await;
        engine.play(&buffer).unwrap();
        engine.set_position(60.0).unwrap();
        assert!((engine.position().unwrap() - 60.0).abs() < 0.01);
    }
}
