//! Server configuration.
//!
//! Loading flow:
//! 1. Start with compiled [`ServerConfig::default()`]
//! 2. If a JSON config file is given, deep-merge its values over defaults
//! 3. Apply `RELAY_*` environment variable overrides (highest priority)

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Configuration for the relay server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Outbound frames buffered per connection before pushes start failing.
    pub max_send_queue: usize,
    /// Interval between server pings.
    pub heartbeat_interval_secs: u64,
    /// Silence after which a connection is treated as gone.
    pub heartbeat_timeout_secs: u64,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            max_send_queue: 256,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Load config from an optional JSON file, then apply process env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::load_file(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Defaults merged with the file at `path`, if any. No env overrides.
    pub fn load_file(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = serde_json::to_value(Self::default())?;
        let merged = match path {
            Some(path) => {
                debug!(?path, "loading config from file");
                let content = std::fs::read_to_string(path)?;
                let user: Value = serde_json::from_str(&content)?;
                deep_merge(defaults, user)
            }
            None => defaults,
        };
        Ok(serde_json::from_value(merged)?)
    }

    /// Apply `RELAY_*` overrides read through `lookup`. Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("RELAY_HOST").filter(|v| !v.trim().is_empty()) {
            self.host = v;
        }
        if let Some(v) = parse_env(&lookup, "RELAY_PORT") {
            self.port = v;
        }
        if let Some(v) = parse_env(&lookup, "RELAY_MAX_SEND_QUEUE") {
            self.max_send_queue = v;
        }
        if let Some(v) = parse_env(&lookup, "RELAY_HEARTBEAT_INTERVAL_SECS") {
            self.heartbeat_interval_secs = v;
        }
        if let Some(v) = parse_env(&lookup, "RELAY_HEARTBEAT_TIMEOUT_SECS") {
            self.heartbeat_timeout_secs = v;
        }
        if let Some(v) = parse_env(&lookup, "RELAY_MAX_MESSAGE_SIZE") {
            self.max_message_size = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_send_queue == 0 {
            return Err(ConfigError::InvalidValue("max_send_queue must be > 0".into()));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "heartbeat_interval_secs must be > 0".into(),
            ));
        }
        if self.heartbeat_timeout_secs < self.heartbeat_interval_secs {
            return Err(ConfigError::InvalidValue(
                "heartbeat_timeout_secs must be >= heartbeat_interval_secs".into(),
            ));
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::InvalidValue("max_message_size must be > 0".into()));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

/// Recursive deep merge of two JSON values.
///
/// Objects merge per key, everything else is replaced by `source`. Nulls in
/// `source` are skipped.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}
