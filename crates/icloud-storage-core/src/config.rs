//! Configuration module.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Container identifier → local root, used by the directory-backed adapters.
    pub containers: BTreeMap<String, PathBuf>,
    pub monitoring: MonitoringConfig,
    pub logging: LoggingConfig,
}

/// Transfer monitoring settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub stall_fallback: StallFallbackConfig,
}

/// Forced completion of uploads whose progress notifications stall.
///
/// Some index implementations stop reporting upload progress shortly before
/// 100% even though the item finished uploading. When enabled, an upload is
/// forced to end-of-stream after a delay proportional to the source size,
/// counted from its first progress report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StallFallbackConfig {
    pub enabled: bool,
    /// Delay per whole megabyte (1,000,000 bytes) of the local source file.
    pub millis_per_megabyte: u64,
    /// Lower bound for the computed delay.
    pub minimum_ms: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `pretty` or `json`.
    pub format: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/icloud-storage/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("icloud-storage")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for StallFallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            millis_per_megabyte: 300,
            minimum_ms: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl StallFallbackConfig {
    /// A policy that never forces completion.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Delay before forcing completion of an upload of `size_bytes`.
    ///
    /// Returns `None` when the fallback is disabled. Only whole megabytes
    /// count, so sources under 1 MB get `minimum_ms`.
    pub fn delay_for(&self, size_bytes: u64) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        let whole_mb = size_bytes / 1_000_000;
        let millis = whole_mb
            .saturating_mul(self.millis_per_megabyte)
            .max(self.minimum_ms);
        Some(Duration::from_millis(millis))
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"logging.level"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["pretty", "json"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- containers ---
        for (id, root) in &self.containers {
            if id.trim().is_empty() {
                errors.push(ValidationError {
                    field: "containers".into(),
                    message: "container identifiers must not be empty".into(),
                });
            }
            if !root.is_absolute() {
                errors.push(ValidationError {
                    field: format!("containers.{id}"),
                    message: format!("root must be an absolute path: {}", root.display()),
                });
            }
        }

        // --- monitoring ---
        let fallback = &self.monitoring.stall_fallback;
        if fallback.enabled && fallback.millis_per_megabyte == 0 && fallback.minimum_ms == 0 {
            errors.push(ValidationError {
                field: "monitoring.stall_fallback.millis_per_megabyte".into(),
                message: "must be greater than 0 when the fallback is enabled and minimum_ms is 0"
                    .into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use icloud_storage_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .container("iCloud.com.example", "/srv/containers/example")
///     .stall_fallback_enabled(false)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- containers ---

    pub fn container(mut self, id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.config.containers.insert(id.into(), root.into());
        self
    }

    // --- monitoring ---

    pub fn stall_fallback_enabled(mut self, enabled: bool) -> Self {
        self.config.monitoring.stall_fallback.enabled = enabled;
        self
    }

    pub fn stall_fallback_millis_per_megabyte(mut self, millis: u64) -> Self {
        self.config.monitoring.stall_fallback.millis_per_megabyte = millis;
        self
    }

    pub fn stall_fallback_minimum_ms(mut self, millis: u64) -> Self {
        self.config.monitoring.stall_fallback.minimum_ms = millis;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
