//! # TrackOrDie Player Library (tod-player)
//!
//! Playback orchestration for a playlist-driven tracker-music player.
//!
//! **Purpose:** Decide which module plays when, drive a capability-probed
//! engine adapter through loads, pauses, seeks and track transitions, and
//! expose the result over an HTTP/SSE control interface.
//!
//! **Architecture:** One authoritative [`state::SharedState`] behind an async
//! lock, mutated only by the [`playback::Orchestrator`]; the engine is an
//! external collaborator behind [`engine::PlaybackEngine`].

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod playback;
pub mod state;

pub use error::{Error, Result};
pub use playback::Orchestrator;
pub use state::SharedState;
