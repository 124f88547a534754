//! Configuration management for audiobox
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use audiobox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `AUDIOBOX__<section>__<key>`
//!
//! Examples:
//! - `AUDIOBOX__SERVER__BIND_ADDR=127.0.0.1:5000`
//! - `AUDIOBOX__WORKER__POOL_SIZE=4`
//! - `AUDIOBOX__RETENTION__TASK_TTL=24h`
//!
//! `FFMPEG_LOCATION` is also read and overrides `extractor.ffmpeg_location`.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/audiobox.toml`.
//! This can be overridden using the `AUDIOBOX_CONFIG` environment variable
//! or the `--config` CLI flag.

mod models;
mod sources;
mod validation;

pub use crate::humanize::{ByteSize, HumanDuration};
pub use models::{Config, ExtractorConfig, RetentionConfig, ServerConfig, WorkerConfig};
pub use validation::{MAX_POOL_SIZE, ValidationError};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`AUDIOBOX__*`, `FFMPEG_LOCATION`)
    /// 2. TOML file (default: `config/audiobox.toml`)
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Like [`Config::load`], reading the TOML file from `path` when given
    pub fn load_with(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path, ignoring `FFMPEG_LOCATION`
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
