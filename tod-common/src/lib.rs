//! # TrackOrDie Common Library
//!
//! Shared code for the TrackOrDie player workspace:
//! - Playlist catalog (static playlists and tracks)
//! - Event types (TodEvent enum) and the EventBus
//! - Configuration file resolution
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod playlist;

pub use error::{Error, Result};
pub use playlist::{Catalog, Playlist, Track};
