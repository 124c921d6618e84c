//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides. The browser
//! shell deserializes the same structure from a JSON object instead.

use crate::router::{PrefetchMode, RouterConfig};
use crate::scroll::ScrollConfig;
use crate::signin::{SignInConfig, DEFAULT_IDENTITY_ENDPOINT};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub scroll: ScrollConfig,

    #[serde(default)]
    pub signin: SignInConfig,

    #[serde(default)]
    pub identity: IdentityConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Identity provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_identity_endpoint")]
    pub endpoint: String,

    /// API key sent with every request
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_identity_timeout")]
    pub timeout_secs: u64,
}

fn default_identity_endpoint() -> String {
    DEFAULT_IDENTITY_ENDPOINT.to_string()
}

fn default_identity_timeout() -> u64 {
    10
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            endpoint: default_identity_endpoint(),
            api_key: String::new(),
            timeout_secs: default_identity_timeout(),
        }
    }
}

/// Native key-value storage configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// Directory of the storage file; the platform data directory when unset
    pub data_dir: Option<String>,

    /// Keep everything in memory for this run
    #[serde(default)]
    pub in_memory: bool,
}

impl StorageConfig {
    /// Resolved data directory, if any
    #[cfg(feature = "native")]
    pub fn resolve_dir(&self) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(PathBuf::from)
            .or_else(crate::storage::FileStore::default_dir)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    #[cfg(feature = "native")]
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("waypoint").join("config.toml")),
            Some(PathBuf::from("./waypoint.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Router overrides
        if let Some(mode) = var("WAYPOINT_PREFETCH_MODE") {
            match parse_prefetch_mode(&mode) {
                Some(mode) => self.router.prefetch_mode = mode,
                None => tracing::warn!("Ignoring unknown WAYPOINT_PREFETCH_MODE {:?}", mode),
            }
        }
        if let Some(logging) = var("WAYPOINT_ROUTER_LOGGING") {
            self.router.logging = matches!(logging.as_str(), "1" | "true" | "yes");
        }

        // Scroll overrides
        if let Some(capacity) = var("WAYPOINT_SCROLL_CAPACITY") {
            if let Ok(c) = capacity.parse() {
                self.scroll.capacity = c;
            }
        }

        // Identity overrides
        if let Some(endpoint) = var("WAYPOINT_IDENTITY_ENDPOINT") {
            self.identity.endpoint = endpoint;
        }
        if let Some(api_key) = var("WAYPOINT_API_KEY") {
            self.identity.api_key = api_key;
        }

        // Storage overrides
        if let Some(data_dir) = var("WAYPOINT_DATA_DIR") {
            self.storage.data_dir = Some(data_dir);
        }

        // Logging overrides
        if let Some(level) = var("WAYPOINT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("WAYPOINT_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

fn parse_prefetch_mode(raw: &str) -> Option<PrefetchMode> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "hover" => Some(PrefetchMode::Hover),
        "visible" => Some(PrefetchMode::Visible),
        "none" | "off" => Some(PrefetchMode::None),
        _ => None,
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Waypoint Configuration
#
# Environment variables override these settings:
# - WAYPOINT_PREFETCH_MODE
# - WAYPOINT_ROUTER_LOGGING
# - WAYPOINT_SCROLL_CAPACITY
# - WAYPOINT_IDENTITY_ENDPOINT
# - WAYPOINT_API_KEY
# - WAYPOINT_DATA_DIR
# - WAYPOINT_LOG_LEVEL
# - WAYPOINT_LOG_FORMAT

[router]
# When linked pages are fetched ahead of a click: "hover", "visible" or "none"
prefetch_mode = "hover"

# Log navigation lifecycle at info level
logging = false

[scroll]
# Number of routes whose scroll position is remembered
capacity = 50

# Forget a position once it has been restored
discard_on_restore = false

[signin]
# URL parameter carrying the sign-in code
marker_param = "signInLink"

# Storage key of the email awaiting confirmation
email_key = "emailForSignIn"

[identity]
endpoint = "https://identitytoolkit.googleapis.com/v1"
api_key = ""
timeout_secs = 10

[storage]
# Defaults to the platform data directory
# data_dir = "~/.local/share/waypoint"
in_memory = false

[logging]
level = "info"
format = "pretty"
"#
    .to_string()
}
