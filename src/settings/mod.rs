//! Settings - application configuration
//!
//! Layered from embedded defaults, an optional file and the environment.
//! Command-line flags are applied on top by the CLI.

mod loader;

pub use loader::load_settings;

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub reader: ReaderConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Schema sources loaded at startup
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub proto_files: Vec<PathBuf>,
    #[serde(default)]
    pub import_paths: Vec<PathBuf>,
    #[serde(default)]
    pub descriptor_sets: Vec<PathBuf>,
}

/// Capture reading
#[derive(Debug, Clone, Deserialize)]
pub struct ReaderConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_channel_capacity() -> usize {
    binlog_codec::DEFAULT_CHANNEL_CAPACITY
}

fn default_poll_interval_ms() -> u64 {
    250
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ReaderConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Replay behaviour
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplayConfig {
    #[serde(default)]
    pub timeout_secs: u64,
    #[serde(default)]
    pub forward_metadata: bool,
}

impl ReplayConfig {
    /// Per-call deadline, `None` when disabled
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Table rendering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStyle {
    /// Borderless, column aligned
    #[default]
    Plain,
    /// Box drawing borders
    Utf8,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub table_style: TableStyle,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "binlog=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}
