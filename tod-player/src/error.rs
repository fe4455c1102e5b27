//! Error types for tod-player
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//! Playback commands never return these: adapter failures are logged and
//! absorbed by the orchestrator. They surface from startup, configuration,
//! source fetching and the HTTP layer.

use crate::engine::EngineError;
use thiserror::Error;

/// Main error type for tod-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Engine adapter errors
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Raw source fetch errors (fallback load path)
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Errors from the shared library
    #[error(transparent)]
    Common(#[from] tod_common::Error),
}

/// Convenience Result type using tod-player Error
pub type Result<T> = std::result::Result<T, Error>;
