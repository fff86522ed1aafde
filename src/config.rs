//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::relay::{DEFAULT_INTAKE_CAPACITY, DEFAULT_OUTBOUND_BUFFER};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Database file name inside `data_dir`, or an absolute path
    #[serde(default = "default_db_file")]
    pub db_file: String,

    /// Rooms created at startup if missing
    #[serde(default = "default_rooms")]
    pub default_rooms: Vec<String>,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("roomcast").to_string_lossy().to_string())
        .unwrap_or_else(|| "./roomcast_data".to_string())
}

fn default_db_file() -> String {
    "roomcast.db".to_string()
}

fn default_rooms() -> Vec<String> {
    vec!["general".to_string()]
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            db_file: default_db_file(),
            default_rooms: default_rooms(),
        }
    }
}

impl StoreConfig {
    /// Full path of the SQLite database
    pub fn db_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.db_file)
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Mark the auth cookie `Secure` (requires HTTPS)
    #[serde(default)]
    pub secure_cookies: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            secure_cookies: false,
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret; empty means generate one under `data_dir`
    #[serde(default)]
    pub jwt_secret: String,

    #[serde(default = "default_token_ttl")]
    pub token_ttl_hours: i64,
}

fn default_token_ttl() -> i64 {
    24
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: default_token_ttl(),
        }
    }
}

/// Relay (registry, dispatcher, sessions) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Messages the dispatcher queue holds before producers wait
    #[serde(default = "default_intake_capacity")]
    pub intake_capacity: usize,

    /// Frames queued per connection before it is treated as dead
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,

    /// Close connections silent for this long; 0 disables
    #[serde(default)]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> usize {
    1000
}

fn default_intake_capacity() -> usize {
    DEFAULT_INTAKE_CAPACITY
}

fn default_outbound_buffer() -> usize {
    DEFAULT_OUTBOUND_BUFFER
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            intake_capacity: default_intake_capacity(),
            outbound_buffer: default_outbound_buffer(),
            idle_timeout_secs: 0,
        }
    }
}

impl RelayConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
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

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
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

    /// First existing file among the default config locations
    pub fn find_default_path() -> Option<PathBuf> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("roomcast").join("config.toml")),
            Some(PathBuf::from("/etc/roomcast/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        config_paths.into_iter().flatten().find(|p| p.exists())
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // Store overrides
        if let Ok(data_dir) = std::env::var("ROOMCAST_DATA_DIR") {
            self.store.data_dir = data_dir;
        }

        // API overrides
        if let Ok(host) = std::env::var("ROOMCAST_API_HOST") {
            self.api.host = host;
        }
        if let Ok(port) = std::env::var("ROOMCAST_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        // Auth overrides
        if let Ok(secret) = std::env::var("ROOMCAST_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }

        // Logging overrides
        if let Ok(level) = std::env::var("ROOMCAST_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("ROOMCAST_LOG_FORMAT") {
            self.logging.format = format;
        }
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
    r#"# Roomcast Configuration
#
# Environment variables override these settings:
# - ROOMCAST_DATA_DIR
# - ROOMCAST_API_HOST
# - ROOMCAST_API_PORT
# - ROOMCAST_JWT_SECRET
# - ROOMCAST_LOG_LEVEL
# - ROOMCAST_LOG_FORMAT

[store]
# Directory for the database and generated secrets
data_dir = "~/.local/share/roomcast"

# SQLite database file (relative to data_dir)
db_file = "roomcast.db"

# Rooms created at startup if they do not exist
default_rooms = ["general"]

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8080

# Allowed CORS origins (empty = any origin)
cors_origins = []

# Mark the auth cookie Secure (enable behind HTTPS)
secure_cookies = false

[auth]
# HS256 signing secret. Leave empty to generate one in data_dir/jwt_secret
jwt_secret = ""

# Token lifetime in hours
token_ttl_hours = 24

[relay]
# Maximum concurrent streaming connections
max_connections = 1000

# Messages buffered for fan-out before producers wait
intake_capacity = 256

# Frames buffered per connection before it is dropped as too slow
outbound_buffer = 64

# Close connections that send nothing for this many seconds (0 = never)
idle_timeout_secs = 0

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
