//! Configuration management for gridstream
//!
//! This module provides unified configuration management with
//! multi-source loading and zero-config defaults: built-in values, an
//! optional TOML file found in standard locations (or named explicitly),
//! and CLI arguments layered on top by the command handlers.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::ReaderConfig;
use crate::constants::{gobbler, logging, queue};
use crate::errors::{ConfigError, ConfigResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Stream reader settings
    pub streams: StreamConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly stream reader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfigToml {
    /// Instance working directory root (None = current directory)
    pub instance_root: Option<PathBuf>,
    /// Gobbler read buffer size in bytes
    pub gobble_buffer_size: usize,
    /// Bound on queued reads per stream (0 = unbounded)
    pub max_pending_reads: usize,
}

impl Default for StreamConfigToml {
    fn default() -> Self {
        Self {
            instance_root: None,
            gobble_buffer_size: gobbler::GOBBLE_BUFFER_SIZE,
            max_pending_reads: queue::DEFAULT_MAX_PENDING_READS,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
    /// Enable colored output
    pub colored_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
            colored_output: true,
        }
    }
}

impl AppConfig {
    /// Convert TOML-friendly configuration to the runtime reader config
    pub fn to_reader_config(&self) -> ReaderConfig {
        ReaderConfig {
            gobble_buffer_size: self.streams.gobble_buffer_size,
            max_pending_reads: self.streams.max_pending_reads,
        }
    }

    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (if present)
    /// 3. CLI arguments (applied by the command handlers)
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path });
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        match config_path {
            Some(path) => Self::load_from_file(&path).await,
            None => Ok(Self::default()),
        }
    }

    /// Find a configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![
            // Project-local config
            PathBuf::from("./gridstream.toml"),
        ];
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("gridstream").join("config.toml"));
        }
        #[cfg(unix)]
        search_paths.push(PathBuf::from("/etc/gridstream/config.toml"));

        for path in search_paths {
            if path.exists() {
                debug!("Found config file: {}", path.display());
                return Some(path);
            }
        }

        debug!("No config file found in standard locations");
        None
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &PathBuf) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Generate default configuration content with helpful comments
    pub fn generate_default_config_content() -> String {
        format!(
            r#"# gridstream configuration
# All settings are optional; omitted values fall back to these defaults.

[streams]
# Instance working directory root (omit to use the current directory)
# instance_root = "/var/lib/gridstream/instances"

# Gobbler read buffer size in bytes. Larger buffers reduce syscall
# overhead but delay visibility of new data to pending readers.
gobble_buffer_size = {}

# Bound on queued reads per stream (0 = unbounded)
max_pending_reads = {}

[logging]
level = "info"  # error, warn, info, debug, trace
colored_output = true
"#,
            gobbler::GOBBLE_BUFFER_SIZE,
            queue::DEFAULT_MAX_PENDING_READS
        )
    }
}
