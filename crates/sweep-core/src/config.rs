//! Configuration management for sweep.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. Command-line flags override both.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// User agent presented by every browser page the workspace opens.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Main application configuration.
///
/// This is loaded from `~/.config/sweep/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Browser launch and navigation settings
    pub browser: BrowserConfig,
    /// Orchestration cadences
    pub run: RunConfig,
    /// Where results are persisted
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, falling back to defaults
    /// if the file does not exist.
    pub fn load_from(config_path: &Path) -> ConfigResult<Self> {
        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(config_path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `SWEEP_HEADLESS`: Override browser headless mode (true/false)
    /// - `SWEEP_BATCH_SIZE`: Override checkpoint cadence
    /// - `SWEEP_RECYCLE_EVERY`: Override browser recycle cadence
    /// - `SWEEP_RETRIES`: Override the per-item retry bound
    pub fn load_with_env() -> ConfigResult<Self> {
        Self::load_with_env_from(&Self::config_path()?)
    }

    /// [`AppConfig::load_with_env`] for a config file at an explicit path.
    pub fn load_with_env_from(config_path: &Path) -> ConfigResult<Self> {
        let mut config = Self::load_from(config_path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `SWEEP_*` environment overrides in place.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("SWEEP_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Ok(val) = std::env::var("SWEEP_BATCH_SIZE") {
            if let Ok(batch_size) = val.parse() {
                self.run.batch_size = batch_size;
                tracing::debug!("Override run.batch_size from env: {}", batch_size);
            }
        }

        if let Ok(val) = std::env::var("SWEEP_RECYCLE_EVERY") {
            if let Ok(recycle_every) = val.parse() {
                self.run.recycle_every = recycle_every;
                tracing::debug!("Override run.recycle_every from env: {}", recycle_every);
            }
        }

        if let Ok(val) = std::env::var("SWEEP_RETRIES") {
            if let Ok(retries) = val.parse() {
                self.run.retries_per_item = retries;
                tracing::debug!("Override run.retries_per_item from env: {}", retries);
            }
        }
    }

    /// Reject values the orchestrator cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.run.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "run.batch_size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.run.recycle_every == 0 {
            return Err(ConfigError::InvalidValue {
                field: "run.recycle_every".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.run.chunk_size == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "run.chunk_size".to_string(),
                reason: "must be at least 1 when set".to_string(),
            });
        }
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/sweep/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "sweep", "sweep").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/sweep`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "sweep", "sweep").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Disable the Chromium sandbox (needed in most containers)
    pub no_sandbox: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Fixed user agent set on every page
    pub user_agent: String,
    /// Explicit Chrome/Chromium binary; autodetected when unset
    pub executable: Option<PathBuf>,
    /// How long to wait for the browser process to come up
    pub launch_timeout_secs: u64,
    /// Navigation timeout for the initial page, in seconds
    pub navigation_timeout_secs: u64,
    /// Command run once when the first launch fails (empty = skip)
    pub install_command: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            no_sandbox: true,
            window_width: 1920,
            window_height: 1080,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            executable: None,
            launch_timeout_secs: 30,
            navigation_timeout_secs: 60,
            install_command: Vec::new(),
        }
    }
}

/// Orchestration cadences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Flush to the checkpoint sink every N items
    pub batch_size: usize,
    /// Recycle the browser session every N items
    pub recycle_every: usize,
    /// Upper bound on extractor retries per item
    pub retries_per_item: u32,
    /// Process items in concurrent chunks of this size
    pub chunk_size: Option<usize>,
    /// Re-process earlier `TransientError` / `UnknownOutcome` results on resume
    pub retry_failed: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            recycle_every: 50,
            retries_per_item: 2,
            chunk_size: None,
            retry_failed: true,
        }
    }
}

/// Result persistence settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `SQLite` database holding runs and their results
    pub database_path: Option<PathBuf>,
    /// JSON checkpoint file used when no database is configured
    pub checkpoint_path: Option<PathBuf>,
}
