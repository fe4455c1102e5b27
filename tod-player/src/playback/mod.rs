//! Playback orchestration
//!
//! - [`orchestrator`]: user commands and the end-of-track signal
//! - [`loader`]: single-flight track loading with a fetch fallback
//! - [`progress`]: periodic playhead polling
//! - [`transition`]: next/previous track policy
//! - [`fetch`]: raw module fetching for the fallback path

pub mod fetch;
pub mod loader;
pub mod orchestrator;
pub mod progress;
pub mod transition;

pub use fetch::{MediaFetcher, SourceFetcher};
pub use loader::{LoadClaim, LoadCoordinator, LoadOutcome};
pub use orchestrator::{InitState, Orchestrator};
pub use progress::ProgressReporter;
pub use transition::{Decision, Direction};
