//! Configuration management for mediafetch
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use mediafetch::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `MEDIAFETCH__<section>__<key>`
//!
//! Examples:
//! - `MEDIAFETCH__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `MEDIAFETCH__DOWNLOADER__EXECUTABLE=/usr/local/bin/yt-dlp`
//! - `MEDIAFETCH__WORKERS__MAX_CONCURRENT_JOBS=8`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/mediafetch.toml`.
//! This can be overridden using the `MEDIAFETCH_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    CacheConfig, Config, DownloaderConfig, ProgressConfig, ServerConfig, WorkerConfig,
};
pub use validation::ValidationError;

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
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or a value
    /// fails validation (zero timeouts, empty executable, ...).
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
