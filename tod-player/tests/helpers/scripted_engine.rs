//! Scripted engine adapter
//!
//! Implements every optional operation, but only advertises the configured
//! capability set. Loads complete according to a [`LoadMode`]; every call is
//! written to a journal the tests inspect.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tod_player::engine::{
    Capabilities, Capability, EndHandler, EngineBuffer, EngineError, EngineResult, LoadCallback,
    PlaybackEngine, TrackMetadata, TrackSource,
};

/// How `load` behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Callback fires before `load` returns
    Immediate,
    /// Callback is held until the test completes it
    Deferred,
    /// URL loads are refused synchronously; byte loads complete immediately
    RefuseUrl,
    /// Every load is refused synchronously
    RefuseAll,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Load(String),
    Play(u64),
    Resume,
    Start,
    Pause,
    TogglePause,
    Stop,
    SetPosition(f64),
    Seek(f64),
    SetVolume(f32),
    ResumeOutput,
}

struct Inner {
    mode: LoadMode,
    journal: Vec<Call>,
    pending: Vec<(String, LoadCallback)>,
    end_handler: Option<EndHandler>,
    playhead: f64,
    duration: Option<f64>,
    failing: HashSet<Capability>,
    next_id: u64,
}

pub struct ScriptedEngine {
    caps: Capabilities,
    inner: Mutex<Inner>,
}

impl ScriptedEngine {
    pub fn new(caps: Capabilities, mode: LoadMode) -> Arc<Self> {
        Arc::new(Self {
            caps,
            inner: Mutex::new(Inner {
                mode,
                journal: Vec::new(),
                pending: Vec::new(),
                end_handler: None,
                playhead: 0.0,
                duration: Some(120.0),
                failing: HashSet::new(),
                next_id: 1,
            }),
        })
    }

    /// Everything implemented and advertised, immediate loads
    pub fn full() -> Arc<Self> {
        Self::new(Capabilities::all(), LoadMode::Immediate)
    }

    pub fn set_mode(&self, mode: LoadMode) {
        self.inner.lock().unwrap().mode = mode;
    }

    pub fn set_playhead(&self, seconds: f64) {
        self.inner.lock().unwrap().playhead = seconds;
    }

    /// Duration reported by `metadata` for subsequent loads
    pub fn set_duration(&self, seconds: Option<f64>) {
        self.inner.lock().unwrap().duration = seconds;
    }

    /// Make an advertised capability fail with a real error
    pub fn fail(&self, cap: Capability) {
        self.inner.lock().unwrap().failing.insert(cap);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().journal.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().journal.clear();
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    /// URLs of loads whose callbacks are still held
    pub fn pending_loads(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .pending
            .iter()
            .map(|(source, _)| source.clone())
            .collect()
    }

    /// Fire the held callback for `source`
    pub fn complete_load(&self, source: &str) -> bool {
        let (entry, id) = {
            let mut inner = self.inner.lock().unwrap();
            let Some(position) = inner.pending.iter().position(|(s, _)| s == source) else {
                return false;
            };
            let id = inner.next_id;
            inner.next_id += 1;
            (inner.pending.remove(position), id)
        };
        let (source, callback) = entry;
        callback(EngineBuffer::new(id, source));
        true
    }

    /// Drop every held callback without firing it
    pub fn drop_pending(&self) {
        self.inner.lock().unwrap().pending.clear();
    }

    /// Signal a natural end of track
    pub fn finish_track(&self) {
        let handler = self.inner.lock().unwrap().end_handler.clone();
        if let Some(handler) = handler {
            handler();
        }
    }

    fn record(&self, cap: Capability, call: Call) -> EngineResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.journal.push(call);
        if inner.failing.contains(&cap) {
            Err(EngineError::Failed(format!("scripted {} failure", cap)))
        } else {
            Ok(())
        }
    }
}

impl PlaybackEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn load(&self, source: TrackSource, on_ready: LoadCallback) -> EngineResult<()> {
        let description = source.describe();
        let (mode, id) = {
            let mut inner = self.inner.lock().unwrap();
            inner.journal.push(Call::Load(description.clone()));
            let id = inner.next_id;
            inner.next_id += 1;
            (inner.mode, id)
        };

        let is_url = matches!(source, TrackSource::Url(_));
        match mode {
            LoadMode::RefuseAll => Err(EngineError::SourceUnsupported(description)),
            LoadMode::RefuseUrl if is_url => Err(EngineError::SourceUnsupported(description)),
            LoadMode::Immediate | LoadMode::RefuseUrl => {
                on_ready(EngineBuffer::new(id, description));
                Ok(())
            }
            LoadMode::Deferred => {
                self.inner.lock().unwrap().pending.push((description, on_ready));
                Ok(())
            }
        }
    }

    fn set_end_handler(&self, handler: EndHandler) {
        self.inner.lock().unwrap().end_handler = Some(handler);
    }

    fn play(&self, buffer: &EngineBuffer) -> EngineResult<()> {
        self.record(Capability::Play, Call::Play(buffer.id()))
    }

    fn resume(&self) -> EngineResult<()> {
        self.record(Capability::Resume, Call::Resume)
    }

    fn start(&self) -> EngineResult<()> {
        self.record(Capability::Start, Call::Start)
    }

    fn pause(&self) -> EngineResult<()> {
        self.record(Capability::Pause, Call::Pause)
    }

    fn toggle_pause(&self) -> EngineResult<()> {
        self.record(Capability::TogglePause, Call::TogglePause)
    }

    fn stop(&self) -> EngineResult<()> {
        self.record(Capability::Stop, Call::Stop)
    }

    fn position(&self) -> EngineResult<f64> {
        Ok(self.inner.lock().unwrap().playhead)
    }

    fn metadata(&self) -> EngineResult<TrackMetadata> {
        Ok(TrackMetadata {
            duration_seconds: self.inner.lock().unwrap().duration,
            title: None,
        })
    }

    fn set_position(&self, seconds: f64) -> EngineResult<()> {
        self.record(Capability::SetPosition, Call::SetPosition(seconds))
    }

    fn seek(&self, seconds: f64) -> EngineResult<()> {
        self.record(Capability::Seek, Call::Seek(seconds))
    }

    fn set_volume(&self, ratio: f32) -> EngineResult<()> {
        self.record(Capability::SetVolume, Call::SetVolume(ratio))
    }

    fn resume_output(&self) -> EngineResult<()> {
        self.record(Capability::ResumeOutput, Call::ResumeOutput)
    }
}
