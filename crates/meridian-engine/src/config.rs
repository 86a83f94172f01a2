//! Configuration loading and typed config structures for the Meridian engine.
//!
//! The configuration lives in `meridian-config.yaml` in the working
//! directory. Every section and field is optional; anything left out takes
//! the default documented on its field.

use std::path::Path;

use serde::Deserialize;

use meridian_registry::EntityOptions;
use meridian_source::ClusteringOptions;

/// Environment variable overriding `logging.level`.
pub const LOG_LEVEL_ENV: &str = "MERIDIAN_LOG_LEVEL";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration, mirroring `meridian-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// The data source the engine drives.
    #[serde(default)]
    pub source: SourceConfig,

    /// Frame pacing.
    #[serde(default)]
    pub frames: FrameConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Seed records loaded into the data source at start-up.
    #[serde(default)]
    pub entities: Vec<EntityOptions>,
}

impl EngineConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `MERIDIAN_LOG_LEVEL` overrides `logging.level` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.logging.apply_env_overrides();
        Ok(config)
    }
}

/// Data source settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceConfig {
    /// Name given to the data source.
    #[serde(default = "default_source_name")]
    pub name: String,

    /// Whether the source's entities start out shown.
    #[serde(default = "default_true")]
    pub show: bool,

    /// Clustering settings handed to renderers.
    #[serde(default)]
    pub clustering: ClusteringOptions,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            name: default_source_name(),
            show: true,
            clustering: ClusteringOptions::default(),
        }
    }
}

/// Frame pacing settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FrameConfig {
    /// Number of frames to run before exiting.
    #[serde(default = "default_frame_count")]
    pub count: u64,

    /// Real-time milliseconds between frames.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Wall-clock seconds credited to the data source clock per frame.
    #[serde(default = "default_step_seconds")]
    pub step_seconds: f64,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            count: default_frame_count(),
            interval_ms: default_interval_ms(),
            step_seconds: default_step_seconds(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` still wins.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl LoggingConfig {
    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(LOG_LEVEL_ENV) {
            self.level = val;
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_source_name() -> String {
    "meridian".to_owned()
}

const fn default_true() -> bool {
    true
}

const fn default_frame_count() -> u64 {
    10
}

const fn default_interval_ms() -> u64 {
    100
}

const fn default_step_seconds() -> f64 {
    1.0
}

fn default_log_level() -> String {
    "info".to_owned()
}
