//! Playback engine adapter contract
//!
//! The module decoder/renderer is an external collaborator. The player only
//! sees it through [`PlaybackEngine`], a capability-probed interface: apart
//! from `load` and the end handler, every operation is optional. Engines
//! advertise what they implement through [`Capabilities`]; unimplemented
//! methods fall back to default bodies that report
//! [`EngineError::Unsupported`]. Callers never invoke an operation directly
//! when alternatives exist; they walk a preference chain with
//! [`probe::first_available`].

pub mod clock;
pub mod probe;

use std::any::Any;
use std::fmt;
use bitflags::bitflags;
use std::sync::Arc;
use thiserror::Error;

pub use clock::{ClockEngine, ClockSettings};

/// Optional engine operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Start playing a decoded buffer
    Play,
    /// Continue after an in-place pause
    Resume,
    /// Start whatever is loaded
    Start,
    /// Suspend in place
    Pause,
    /// Flip between paused and playing
    TogglePause,
    /// Halt and drop the position
    Stop,
    /// Report the playhead in seconds
    Position,
    /// Report track metadata
    Metadata,
    /// Absolute reposition (preferred form)
    SetPosition,
    /// Absolute reposition (alternate form)
    Seek,
    /// Output gain
    SetVolume,
    /// Wake a suspended audio output before playing
    ResumeOutput,
}

impl Capability {
    /// Flag for this capability in a [`Capabilities`] set
    pub const fn flag(self) -> Capabilities {
        match self {
            Capability::Play => Capabilities::PLAY,
            Capability::Resume => Capabilities::RESUME,
            Capability::Start => Capabilities::START,
            Capability::Pause => Capabilities::PAUSE,
            Capability::TogglePause => Capabilities::TOGGLE_PAUSE,
            Capability::Stop => Capabilities::STOP,
            Capability::Position => Capabilities::POSITION,
            Capability::Metadata => Capabilities::METADATA,
            Capability::SetPosition => Capabilities::SET_POSITION,
            Capability::Seek => Capabilities::SEEK,
            Capability::SetVolume => Capabilities::SET_VOLUME,
            Capability::ResumeOutput => Capabilities::RESUME_OUTPUT,
        }
    }

    /// Operation name used in logs
    pub fn name(self) -> &'static str {
        match self {
            Capability::Play => "play",
            Capability::Resume => "resume",
            Capability::Start => "start",
            Capability::Pause => "pause",
            Capability::TogglePause => "toggle_pause",
            Capability::Stop => "stop",
            Capability::Position => "position",
            Capability::Metadata => "metadata",
            Capability::SetPosition => "set_position",
            Capability::Seek => "seek",
            Capability::SetVolume => "set_volume",
            Capability::ResumeOutput => "resume_output",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Set of operations an engine implements
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u16 {
        const PLAY = 1 << 0;
        const RESUME = 1 << 1;
        const START = 1 << 2;
        const PAUSE = 1 << 3;
        const TOGGLE_PAUSE = 1 << 4;
        const STOP = 1 << 5;
        const POSITION = 1 << 6;
        const METADATA = 1 << 7;
        const SET_POSITION = 1 << 8;
        const SEEK = 1 << 9;
        const SET_VOLUME = 1 << 10;
        /// Wake a suspended audio output before playing
        const RESUME_OUTPUT = 1 << 11;
    }
}

impl Capabilities {
    /// Check whether the engine implements `cap`
    pub fn supports(&self, cap: Capability) -> bool {
        self.contains(cap.flag())
    }
}

impl From<Capability> for Capabilities {
    fn from(cap: Capability) -> Self {
        cap.flag()
    }
}

/// What to hand the engine's loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    /// Let the engine resolve and read the URL itself
    Url(String),
    /// Raw module bytes fetched by the player
    Bytes(Vec<u8>),
}

impl TrackSource {
    pub fn describe(&self) -> String {
        match self {
            TrackSource::Url(url) => url.clone(),
            TrackSource::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        }
    }
}

/// Opaque handle to decoded audio produced by a successful load
///
/// Cloning shares the underlying data. The player never looks inside; it
/// only keeps the most recent handle so a stopped track can be replayed
/// without decoding again.
#[derive(Clone)]
pub struct EngineBuffer {
    id: u64,
    data: Arc<dyn Any + Send + Sync>,
}

impl EngineBuffer {
    pub fn new<T: Any + Send + Sync>(id: u64, data: T) -> Self {
        Self {
            id,
            data: Arc::new(data),
        }
    }

    /// Engine-assigned identifier
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Access the engine's own representation
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }
}

impl fmt::Debug for EngineBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuffer").field("id", &self.id).finish()
    }
}

/// Track metadata reported after a load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    pub duration_seconds: Option<f64>,
    pub title: Option<String>,
}

/// Invoked at most once with the decoded buffer when a load succeeds
pub type LoadCallback = Box<dyn FnOnce(EngineBuffer) + Send + 'static>;

/// Invoked when the current track finishes on its own (never on `stop`)
pub type EndHandler = Arc<dyn Fn() + Send + Sync + 'static>;

/// Engine adapter errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The engine does not implement this operation
    #[error("operation not supported: {0}")]
    Unsupported(Capability),

    /// Engine not initialized yet
    #[error("engine not ready")]
    NotReady,

    /// The engine cannot read this kind of source directly
    #[error("source not supported: {0}")]
    SourceUnsupported(String),

    /// The operation was attempted and failed
    #[error("{0}")]
    Failed(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Module-music playback engine
///
/// All methods are synchronous: `load` only starts decoding and reports the
/// result later through its callback, or fails immediately. Implementations
/// must be cheap to call from async code and must never block.
pub trait PlaybackEngine: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Operations this engine implements
    fn capabilities(&self) -> Capabilities;

    /// Begin decoding `source`; `on_ready` fires at most once on success
    ///
    /// An `Err` means the load was refused synchronously and the callback
    /// will never fire. A started load may still silently never complete.
    fn load(&self, source: TrackSource, on_ready: LoadCallback) -> EngineResult<()>;

    /// Install the natural end-of-track handler, replacing any previous one
    fn set_end_handler(&self, handler: EndHandler);

    fn play(&self, _buffer: &EngineBuffer) -> EngineResult<()> {
        Err(EngineError::Unsupported(Capability::Play))
    }

    fn resume(&self) -> EngineResult<()> {
        Err(EngineError::Unsupported(Capability::Resume))
    }

    fn start(&self) -> EngineResult<()> {
        Err(EngineError::Unsupported(Capability::Start))
    }

    fn pause(&self) -> EngineResult<()> {
        Err(EngineError::Unsupported(Capability::Pause))
    }

    fn toggle_pause(&self) -> EngineResult<()> {
        Err(EngineError::Unsupported(Capability::TogglePause))
    }

    fn stop(&self) -> EngineResult<()> {
        Err(EngineError::Unsupported(Capability::Stop))
    }

    /// Playhead in seconds
    fn position(&self) -> EngineResult<f64> {
        Err(EngineError::Unsupported(Capability::Position))
    }

    fn metadata(&self) -> EngineResult<TrackMetadata> {
        Err(EngineError::Unsupported(Capability::Metadata))
    }

    fn set_position(&self, _seconds: f64) -> EngineResult<()> {
        Err(EngineError::Unsupported(Capability::SetPosition))
    }

    fn seek(&self, _seconds: f64) -> EngineResult<()> {
        Err(EngineError::Unsupported(Capability::Seek))
    }

    /// Output gain, 0.0-1.0
    fn set_volume(&self, _ratio: f32) -> EngineResult<()> {
        Err(EngineError::Unsupported(Capability::SetVolume))
    }

    fn resume_output(&self) -> EngineResult<()> {
        Err(EngineError::Unsupported(Capability::ResumeOutput))
    }
}
