use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Mutex, Once};

use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

static TRACING_INIT: Once = Once::new();

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// A level name (`info`, `debug`, ...) or `EnvFilter` directives such as
    /// `bpsync.sync=trace,info`.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// One JSON object per line instead of the human-readable format.
    #[serde(default)]
    pub json: bool,

    /// Write to stderr.
    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,

    /// Also append to this file. When it cannot be opened the other sinks are
    /// still installed and a warning is logged.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    fn default_stderr() -> bool {
        true
    }

    /// `level` as filter directives. Bare level names are matched without case
    /// and `warning` is read as `warn`; anything else is passed through as is.
    pub(crate) fn directives(&self) -> String {
        let level = self.level.trim();
        if level.is_empty() {
            return Self::default_level();
        }
        let lowered = level.to_ascii_lowercase();
        match lowered.as_str() {
            "warning" => "warn".to_owned(),
            "trace" | "debug" | "info" | "warn" | "error" => lowered,
            _ => level.to_owned(),
        }
    }

    /// The filter to install. `RUST_LOG` directives are appended after the
    /// configured ones, so they win for the targets they name. An unparsable
    /// combination falls back to the configured directives, then to `info`.
    pub fn env_filter(&self) -> EnvFilter {
        let configured = self.directives();
        let combined = match std::env::var("RUST_LOG") {
            Ok(env) if !env.trim().is_empty() => format!("{configured},{}", env.trim()),
            _ => configured.clone(),
        };
        EnvFilter::try_new(&combined)
            .or_else(|_| EnvFilter::try_new(&configured))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: Self::default_stderr(),
            file: None,
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn fmt_layer<W>(json: bool, writer: W) -> BoxedLayer
where
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false);
    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

/// Install the global `tracing` subscriber described by `config`.
///
/// Only the first call in a process has an effect. Returns `true` when this
/// call installed the subscriber.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let mut installed = false;
    TRACING_INIT.call_once(|| {
        let mut layers: Vec<BoxedLayer> = Vec::new();
        if config.stderr {
            layers.push(fmt_layer(config.json, std::io::stderr));
        }

        let file = config.file.as_ref().and_then(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });
        let file_failed = config.file.is_some() && file.is_none();
        if let Some(file) = file {
            layers.push(fmt_layer(config.json, Mutex::new(file)));
        }

        let subscriber = tracing_subscriber::registry()
            .with(layers)
            .with(config.env_filter());
        installed = tracing::subscriber::set_global_default(subscriber).is_ok();

        if installed && file_failed {
            if let Some(path) = config.file.as_ref() {
                tracing::warn!(
                    target: "bpsync.config",
                    path = %path.display(),
                    "failed to open log file; file logging disabled"
                );
            }
        }
    });
    installed
}
