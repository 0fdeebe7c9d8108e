//! Configuration for bpsync.
//!
//! The configuration is a small TOML document with two tables:
//!
//! ```toml
//! [logging]
//! level = "info"
//!
//! [sync]
//! reply_timeout_ms = 10000
//! unknown_removal = "error"
//! ```
//!
//! Every key has a default, so an empty document is a valid configuration.
//! Unknown keys are rejected.

mod logging;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use logging::{init_tracing, LoggingConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
    #[error("invalid value for `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // `Display` for `toml::de::Error` quotes the offending source line; keep only the message.
        ConfigError::Toml(err.message().to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BpsyncConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl BpsyncConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text)
    }

    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        let config: BpsyncConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sync.validate()
    }
}

/// What to do when a removal targets a location that has no remote actor and
/// no remaining client-side breakpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownRemovalPolicy {
    /// Report `UnknownBreakpoint` and publish nothing.
    #[default]
    Error,
    /// Treat the removal as already done.
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Upper bound for a single remote round trip, in milliseconds. `0` disables the bound.
    #[serde(default = "SyncConfig::default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,

    #[serde(default)]
    pub unknown_removal: UnknownRemovalPolicy,

    /// Capacity of the outcome event channel handed to listeners.
    #[serde(default = "SyncConfig::default_event_channel_size")]
    pub event_channel_size: usize,
}

impl SyncConfig {
    fn default_reply_timeout_ms() -> u64 {
        10_000
    }

    fn default_event_channel_size() -> usize {
        64
    }

    pub fn reply_timeout(&self) -> Option<Duration> {
        (self.reply_timeout_ms > 0).then(|| Duration::from_millis(self.reply_timeout_ms))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_channel_size == 0 {
            return Err(ConfigError::Invalid {
                key: "sync.event_channel_size",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: Self::default_reply_timeout_ms(),
            unknown_removal: UnknownRemovalPolicy::default(),
            event_channel_size: Self::default_event_channel_size(),
        }
    }
}
