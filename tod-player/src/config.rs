//! Configuration management for tod-player
//!
//! Bootstrap configuration comes from an optional TOML file. Every field has
//! a built-in default, so the player runs without any file at all.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--port, --media-root, --config)
//! 2. Environment variables (TOD_PORT, TOD_MEDIA_ROOT, TOD_CONFIG)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tod_common::{Catalog, Playlist};
use tracing::info;

/// Environment variable naming the media root
pub const MEDIA_ROOT_ENV: &str = "TOD_MEDIA_ROOT";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// HTTP server port
    pub port: u16,

    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// Folder that relative track URLs resolve against
    pub media_root: Option<PathBuf>,

    /// When set, relative track URLs are fetched over HTTP from this base
    pub media_base_url: Option<String>,

    pub logging: LoggingConfig,

    pub playback: PlaybackSettings,

    pub engine: EngineConfig,

    /// Playlists; the built-in collection is used when empty
    pub playlists: Vec<Playlist>,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_addr: "127.0.0.1".to_string(),
            media_root: None,
            media_base_url: None,
            logging: LoggingConfig::default(),
            playback: PlaybackSettings::default(),
            engine: EngineConfig::default(),
            playlists: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Orchestrator tuning and initial toggles
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Progress poll period
    pub progress_interval_ms: u64,

    /// Delay between replaying a buffer and seeking to the remembered position
    pub resume_settle_ms: u64,

    /// Give up on a load whose callback has not fired after this long
    pub load_timeout_ms: u64,

    /// Initial volume (0.0-1.0)
    pub default_volume: f32,

    /// Initial shuffle toggle
    pub shuffle: bool,

    /// Initial loop toggle
    pub loop_playlist: bool,

    /// Event bus capacity per subscriber
    pub event_capacity: usize,

    /// Fixed seed for track picks (random when unset)
    pub shuffle_seed: Option<u64>,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            progress_interval_ms: 200,
            resume_settle_ms: 40,
            load_timeout_ms: 30_000,
            default_volume: 0.5,
            shuffle: true,
            loop_playlist: true,
            event_capacity: 1000,
            shuffle_seed: None,
        }
    }
}

impl PlaybackSettings {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn resume_settle(&self) -> Duration {
        Duration::from_millis(self.resume_settle_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.progress_interval_ms == 0 {
            return Err(Error::Config("progress_interval_ms must be > 0".into()));
        }
        if self.load_timeout_ms == 0 {
            return Err(Error::Config("load_timeout_ms must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.default_volume) {
            return Err(Error::Config(format!(
                "default_volume must be within 0.0-1.0, got {}",
                self.default_volume
            )));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be > 0".into()));
        }
        Ok(())
    }
}

/// Bundled clock engine settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Length the clock engine reports for every module
    pub track_seconds: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            track_seconds: 180.0,
        }
    }
}

fn default_port() -> u16 {
    5794
}

impl TomlConfig {
    /// Load from `path`, or built-in defaults when there is no file
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Ok(tod_common::config::load_toml(path)?)
            }
            None => {
                info!("No configuration file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Build the catalog, falling back to the built-in collection
    pub fn catalog(&self) -> Result<Catalog> {
        if self.playlists.is_empty() {
            Ok(Catalog::builtin())
        } else {
            Ok(Catalog::new(self.playlists.clone())?)
        }
    }
}

/// Command-line/environment overrides applied on top of the TOML file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub media_root: Option<PathBuf>,
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub media_root: PathBuf,
    pub media_base_url: Option<reqwest::Url>,
    pub logging: LoggingConfig,
    pub playback: PlaybackSettings,
    pub engine: EngineConfig,
    pub catalog: Catalog,
}

impl Config {
    pub fn resolve(toml: TomlConfig, overrides: Overrides) -> Result<Self> {
        toml.playback.validate()?;
        if !(toml.engine.track_seconds > 0.0 && toml.engine.track_seconds.is_finite()) {
            return Err(Error::Config("engine.track_seconds must be > 0".into()));
        }

        let ip: IpAddr = toml
            .bind_addr
            .parse()
            .map_err(|e| Error::Config(format!("invalid bind_addr '{}': {}", toml.bind_addr, e)))?;
        let port = overrides.port.unwrap_or(toml.port);

        let media_root = tod_common::config::resolve_media_root(
            overrides.media_root.as_deref(),
            MEDIA_ROOT_ENV,
            toml.media_root.as_deref(),
        );

        let media_base_url = toml
            .media_base_url
            .as_deref()
            .map(|url| {
                reqwest::Url::parse(url)
                    .map_err(|e| Error::Config(format!("invalid media_base_url '{}': {}", url, e)))
            })
            .transpose()?;

        let catalog = toml.catalog()?;

        Ok(Self {
            listen_addr: SocketAddr::new(ip, port),
            media_root,
            media_base_url,
            logging: toml.logging,
            playback: toml.playback,
            engine: toml.engine,
            catalog,
        })
    }
}
