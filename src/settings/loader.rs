//! Configuration loading
//!
//! Handles loading configuration from embedded defaults, files, and environment.

use super::AppConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use std::path::Path;

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Load configuration, reading `explicit` instead of `./binlog.toml` when given
pub fn load_settings(explicit: Option<&Path>) -> Result<AppConfig> {
    let file = match explicit {
        Some(path) => File::from(path).required(true),
        None => File::with_name("binlog").required(false),
    };

    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. Optional overrides
        .add_source(file)
        // 3. Environment variables (highest priority), e.g. BINLOG_REPLAY__TIMEOUT_SECS
        .add_source(
            Environment::with_prefix("BINLOG")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}
