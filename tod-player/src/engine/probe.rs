//! Capability probing
//!
//! One helper walks a preference chain and calls the first operation the
//! engine advertises. Chains for each player operation live here so every
//! call site uses the same order.

use super::{Capability, EngineBuffer, EngineError, EngineResult, PlaybackEngine};
use tracing::{debug, warn};

/// Start playback of a freshly loaded buffer
pub const START_LOADED: &[Capability] = &[Capability::Play, Capability::Resume, Capability::Start];

/// Pause in place. When exhausted the caller remembers the position and stops.
pub const PAUSE: &[Capability] = &[Capability::Pause, Capability::TogglePause];

/// Resume after an in-place pause. When exhausted the caller replays the buffer.
pub const RESUME: &[Capability] = &[Capability::Resume, Capability::TogglePause];

/// Replay the retained buffer from the top
pub const REPLAY: &[Capability] = &[Capability::Play, Capability::Start];

/// Absolute reposition
pub const SEEK: &[Capability] = &[Capability::SetPosition, Capability::Seek];

/// Result of walking a preference chain
#[derive(Debug, Clone, PartialEq)]
pub enum Probe {
    /// An operation ran successfully
    Done { via: Capability },
    /// The engine implements none of the chain
    Exhausted,
    /// The first implemented operation failed; later links were not tried
    Failed { via: Capability, error: EngineError },
}

impl Probe {
    pub fn is_done(&self) -> bool {
        matches!(self, Probe::Done { .. })
    }

    /// Capability that handled the call, if any
    pub fn via(&self) -> Option<Capability> {
        match self {
            Probe::Done { via } => Some(*via),
            _ => None,
        }
    }

    /// Log failures and exhaustion under `operation`, returning self
    pub fn logged(self, operation: &str) -> Self {
        match &self {
            Probe::Done { via } => debug!("{} handled by engine {}", operation, via),
            Probe::Exhausted => debug!("{}: engine offers no implementation", operation),
            Probe::Failed { via, error } => warn!("{} failed in engine {}: {}", operation, via, error),
        }
        self
    }
}

/// Call the first capability in `order` that the engine advertises
///
/// Links the engine does not advertise are skipped, as are links whose call
/// reports `Unsupported` despite being advertised. Any other error stops the
/// walk: a real failure is not retried through a different operation.
pub fn first_available<F>(engine: &dyn PlaybackEngine, order: &[Capability], mut call: F) -> Probe
where
    F: FnMut(&dyn PlaybackEngine, Capability) -> EngineResult<()>,
{
    let caps = engine.capabilities();
    for &cap in order {
        if !caps.supports(cap) {
            continue;
        }
        match call(engine, cap) {
            Ok(()) => return Probe::Done { via: cap },
            Err(EngineError::Unsupported(_)) => continue,
            Err(error) => return Probe::Failed { via: cap, error },
        }
    }
    Probe::Exhausted
}

/// Dispatch a transport capability (play/resume/start/pause/toggle/stop)
///
/// `Play` needs a buffer; without one it reports `Unsupported` so the walk
/// moves on.
pub fn transport(engine: &dyn PlaybackEngine, cap: Capability, buffer: Option<&EngineBuffer>) -> EngineResult<()> {
    match cap {
        Capability::Play => match buffer {
            Some(buffer) => engine.play(buffer),
            None => Err(EngineError::Unsupported(Capability::Play)),
        },
        Capability::Resume => engine.resume(),
        Capability::Start => engine.start(),
        Capability::Pause => engine.pause(),
        Capability::TogglePause => engine.toggle_pause(),
        Capability::Stop => engine.stop(),
        other => Err(EngineError::Unsupported(other)),
    }
}

/// Dispatch a seek capability
pub fn reposition(engine: &dyn PlaybackEngine, cap: Capability, seconds: f64) -> EngineResult<()> {
    match cap {
        Capability::SetPosition => engine.set_position(seconds),
        Capability::Seek => engine.seek(seconds),
        other => Err(EngineError::Unsupported(other)),
    }
}

/// Walk a transport chain, logging the outcome
pub fn run_transport(
    engine: &dyn PlaybackEngine,
    order: &[Capability],
    buffer: Option<&EngineBuffer>,
    operation: &str,
) -> Probe {
    first_available(engine, order, |engine, cap| transport(engine, cap, buffer)).logged(operation)
}

/// Call a single optional operation, swallowing and logging failure
pub fn best_effort<T, F>(engine: &dyn PlaybackEngine, cap: Capability, call: F) -> Option<T>
where
    F: FnOnce(&dyn PlaybackEngine) -> EngineResult<T>,
{
    if !engine.capabilities().supports(cap) {
        return None;
    }
    match call(engine) {
        Ok(value) => Some(value),
        Err(EngineError::Unsupported(_)) => None,
        Err(error) => {
            warn!("engine {} failed: {}", cap, error);
            None
        }
    }
}

/// Best-effort `stop()`
pub fn stop_quietly(engine: &dyn PlaybackEngine) {
    best_effort(engine, Capability::Stop, |engine| engine.stop());
}
