//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/quizflow/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/quizflow/` (~/.config/quizflow/)
//! - Data: `$XDG_DATA_HOME/quizflow/` (~/.local/share/quizflow/)
//! - State/Logs: `$XDG_STATE_HOME/quizflow/` (~/.local/state/quizflow/)

use crate::analytics::CsvOptions;
use crate::error::{Error, Result};
use crate::format::{is_valid_date_format, DEFAULT_DATE_FORMAT};
use crate::scoring::{ScoreTable, ScoreTier};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Fast-answer point thresholds
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// CSV report options
    #[serde(default)]
    pub report: ReportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Fast-answer scoring configuration
///
/// ```toml
/// [[scoring.tiers]]
/// max_elapsed_secs = 3.0
/// points = 1000
/// ```
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ScoringConfig {
    /// Ordered point tiers; an empty list means "use the defaults"
    #[serde(default)]
    pub tiers: Vec<ScoreTier>,
}

impl ScoringConfig {
    /// Build the score table described by this configuration.
    pub fn table(&self) -> Result<ScoreTable> {
        if self.tiers.is_empty() {
            return Ok(ScoreTable::default());
        }
        ScoreTable::new(self.tiers.clone())
    }
}

/// Report rendering configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    /// chrono format string for completion dates
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            date_format: default_date_format(),
        }
    }
}

impl ReportConfig {
    /// Reject date formats chrono cannot render.
    pub fn validate(&self) -> Result<()> {
        if is_valid_date_format(&self.date_format) {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "invalid report date_format {:?}",
                self.date_format
            )))
        }
    }

    pub fn csv_options(&self) -> CsvOptions {
        CsvOptions {
            date_format: self.date_format.clone(),
        }
    }
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        // Surface bad tiers at load time rather than on first answer
        config.scoring.table()?;
        config.report.validate()?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/quizflow/config.toml` (~/.config/quizflow/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("quizflow").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/quizflow/` (~/.local/share/quizflow/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("quizflow")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/quizflow/` (~/.local/state/quizflow/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("quizflow")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/quizflow/quizflow.db`
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("quizflow.db")
    }
}
