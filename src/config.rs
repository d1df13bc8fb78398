//! Configuration loading.
//!
//! nbfiddle reads `~/.nbfiddle/config.toml` (the root moves with
//! `$NBFIDDLE_HOME`). Every section is optional. Environment variables
//! override file values, and file values override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::remote::GithubEndpoints;

/// Environment variable that relocates the runtime root.
pub const HOME_ENV: &str = "NBFIDDLE_HOME";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local notebook storage.
    pub storage: StorageConfig,
    /// GitHub endpoints and HTTP behaviour.
    pub github: GithubConfig,
    /// Public app settings used for share links.
    pub app: AppConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// Local notebook storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding `notebooks.db`. Defaults to `<root>/data`.
    pub data_dir: Option<PathBuf>,

    /// Debounce window of the autosave writer in milliseconds.
    #[serde(default = "default_autosave_debounce_ms")]
    pub autosave_debounce_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            autosave_debounce_ms: default_autosave_debounce_ms(),
        }
    }
}

/// GitHub endpoints and request settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// REST API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Raw file content base URL.
    #[serde(default = "default_raw_base")]
    pub raw_base: String,

    /// Gist web base URL.
    #[serde(default = "default_gist_web_base")]
    pub gist_web_base: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            raw_base: default_raw_base(),
            gist_web_base: default_gist_web_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GithubConfig {
    /// Endpoints for [`crate::remote::GithubClient`].
    pub fn endpoints(&self) -> GithubEndpoints {
        GithubEndpoints {
            api_base: self.api_base.clone(),
            raw_base: self.raw_base.clone(),
            gist_web_base: self.gist_web_base.clone(),
        }
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// App settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the web app, used to build share links.
    #[serde(default = "default_app_base_url")]
    pub base_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_app_base_url(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write JSON logs to `<root>/logs` with daily rotation.
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: false,
        }
    }
}

// Default value functions for serde

fn default_autosave_debounce_ms() -> u64 {
    1000
}
fn default_api_base() -> String {
    "https://api.github.com".to_owned()
}
fn default_raw_base() -> String {
    "https://raw.githubusercontent.com".to_owned()
}
fn default_gist_web_base() -> String {
    "https://gist.github.com".to_owned()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_app_base_url() -> String {
    "https://nbfiddle.app".to_owned()
}
fn default_log_level() -> String {
    "info".to_owned()
}

impl Config {
    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed.
    pub fn from_toml(toml_str: &str) -> anyhow::Result<Self> {
        toml::from_str(toml_str).context("failed to parse config TOML")
    }

    /// Autosave debounce window.
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.storage.autosave_debounce_ms)
    }

    /// Apply `NBFIDDLE_*` overrides read through `env`.
    ///
    /// Takes a resolver so tests do not have to mutate the process environment.
    /// Unparseable numeric values are ignored.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = env("NBFIDDLE_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(ms) = env("NBFIDDLE_AUTOSAVE_MS").and_then(|v| v.parse().ok()) {
            self.storage.autosave_debounce_ms = ms;
        }
        if let Some(base) = env("NBFIDDLE_GITHUB_API") {
            self.github.api_base = base;
        }
        if let Some(base) = env("NBFIDDLE_GITHUB_RAW") {
            self.github.raw_base = base;
        }
        if let Some(base) = env("NBFIDDLE_GIST_WEB") {
            self.github.gist_web_base = base;
        }
        if let Some(secs) = env("NBFIDDLE_HTTP_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.github.timeout_secs = secs;
        }
        if let Some(url) = env("NBFIDDLE_APP_URL") {
            self.app.base_url = url;
        }
        if let Some(level) = env("NBFIDDLE_LOG_LEVEL") {
            self.logging.level = level;
        }
    }
}

/// Load configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    Config::from_toml(&contents).with_context(|| format!("invalid config at {}", path.display()))
}

/// Load `<root>/config.toml` (defaults when absent) and apply env overrides.
///
/// # Errors
///
/// Returns an error if the root cannot be resolved or the file is invalid.
pub fn load_default_config() -> anyhow::Result<Config> {
    let root = config_dir()?;
    let path = root.join("config.toml");
    let mut config = if path.exists() {
        tracing::debug!(path = %path.display(), "loading config from file");
        load_config(&path)?
    } else {
        Config::default()
    };
    config.apply_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

/// Resolve the runtime root (`$NBFIDDLE_HOME` or `~/.nbfiddle/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    config_dir_with(|key| std::env::var(key).ok())
}

/// Resolve the runtime root using a custom env resolver.
///
/// # Errors
///
/// Returns an error if no override is set and the home directory cannot be
/// determined.
pub fn config_dir_with(env: impl Fn(&str) -> Option<String>) -> anyhow::Result<PathBuf> {
    if let Some(root) = env(HOME_ENV).filter(|v| !v.trim().is_empty()) {
        return Ok(PathBuf::from(root));
    }
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".nbfiddle"))
}

/// Files and directories under the runtime root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    /// Runtime root.
    pub root: PathBuf,
    /// `config.toml`.
    pub config_toml: PathBuf,
    /// `.env` holding credentials.
    pub env_file: PathBuf,
    /// Data directory.
    pub data_dir: PathBuf,
    /// Notebook database.
    pub notebooks_db: PathBuf,
    /// Rotated log files.
    pub logs_dir: PathBuf,
}

impl RuntimePaths {
    /// Lay out paths under `root`, honouring a configured data directory.
    pub fn new(root: &Path, data_dir: Option<&Path>) -> Self {
        let data_dir = data_dir.map_or_else(|| root.join("data"), Path::to_path_buf);
        Self {
            root: root.to_path_buf(),
            config_toml: root.join("config.toml"),
            env_file: root.join(".env"),
            notebooks_db: data_dir.join("notebooks.db"),
            data_dir,
            logs_dir: root.join("logs"),
        }
    }
}

/// Runtime paths under the default root, ignoring any configured data dir.
///
/// # Errors
///
/// Returns an error if the root cannot be resolved.
pub fn runtime_paths() -> anyhow::Result<RuntimePaths> {
    Ok(RuntimePaths::new(&config_dir()?, None))
}
