//! Client configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via GDS_CONFIG)
//! 3. Environment variables

use gds_protocol::{ConnectionData, PROTOCOL_VERSION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default capacity of the connection event channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Service endpoint, handed to the transport.
    pub url: String,
    pub user_name: String,
    pub password: Option<String>,
    pub cluster_name: String,
    pub serve_on_the_same_connection: bool,
    /// Whether outgoing payloads may be split into fragments.
    pub fragmentation_supported: bool,
    /// Largest payload slice in bytes when fragmentation is supported.
    pub fragment_transmission_unit: usize,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub event_channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8888/gate".to_string(),
            user_name: "user".to_string(),
            password: None,
            cluster_name: String::new(),
            serve_on_the_same_connection: true,
            fragmentation_supported: false,
            fragment_transmission_unit: 0,
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_name: user_name.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("GDS_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: ClientConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("GDS_URL") {
            self.url = url;
        }
        if let Some(user) = lookup("GDS_USER") {
            self.user_name = user;
        }
        if let Some(password) = lookup("GDS_PASSWORD") {
            self.password = Some(password);
        }
        if let Some(cluster) = lookup("GDS_CLUSTER") {
            self.cluster_name = cluster;
        }
        if let Some(timeout) = lookup("GDS_CONNECT_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.connect_timeout_ms = ms;
            }
        }
        if let Some(timeout) = lookup("GDS_REQUEST_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.request_timeout_ms = ms;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user_name.is_empty() {
            return Err(ConfigError::Invalid("user_name must not be empty".to_string()));
        }
        if self.connect_timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be positive".to_string()));
        }
        if self.fragmentation_supported && self.fragment_transmission_unit == 0 {
            return Err(ConfigError::Invalid(
                "fragmentation requires a positive fragment_transmission_unit".to_string(),
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event_channel_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Builds the login request described by this configuration.
    pub fn connection_data(&self) -> ConnectionData {
        let mut data = ConnectionData::new(&self.cluster_name, PROTOCOL_VERSION)
            .with_serve_on_the_same_connection(self.serve_on_the_same_connection);
        if self.fragmentation_supported {
            data = data.with_fragmentation(self.fragment_transmission_unit as i64);
        }
        if let Some(password) = &self.password {
            data = data.with_password(password);
        }
        data
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_cluster_name(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = name.into();
        self
    }

    pub fn with_fragmentation(mut self, transmission_unit: usize) -> Self {
        self.fragmentation_supported = true;
        self.fragment_transmission_unit = transmission_unit;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_serve_on_the_same_connection(mut self, same: bool) -> Self {
        self.serve_on_the_same_connection = same;
        self
    }
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {1}", .0.display())]
    IoError(PathBuf, std::io::Error),

    #[error("failed to parse config file '{}': {1}", .0.display())]
    ParseError(PathBuf, String),

    #[error("configuration validation failed: {0}")]
    Invalid(String),
}
