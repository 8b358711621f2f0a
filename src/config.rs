//! # Configuration Management
//!
//! Centralized configuration for the proxy.
//!
//! Structured settings for the listener, the upstream game server, the
//! payload cache, and transport tuning, loadable from TOML files or
//! environment variables with validation before startup.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use crate::error::{ProtocolError, Result};

/// Max allowed payload size (16 MB).
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Default minimum payload size considered by the parse cache.
pub const DEFAULT_CACHE_THRESHOLD: usize = 512;

/// Default interval between cache reap passes.
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(30);

/// Zstd level used for the compressed-transport upgrade.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Main proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProxyConfig {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream game-server configuration
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Payload cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Transport tuning
    #[serde(default)]
    pub transport: TransportConfig,
}

impl ProxyConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables over the defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("STARBRIDGE_BIND_ADDRESS") {
            config.server.bind_address = addr;
        }

        if let Ok(addr) = std::env::var("STARBRIDGE_UPSTREAM_ADDRESS") {
            config.upstream.address = addr;
        }

        if let Ok(threshold) = std::env::var("STARBRIDGE_CACHE_THRESHOLD") {
            if let Ok(val) = threshold.parse::<usize>() {
                config.cache.threshold_bytes = val;
            }
        }

        if let Ok(interval) = std::env::var("STARBRIDGE_REAP_INTERVAL_MS") {
            if let Ok(val) = interval.parse::<u64>() {
                config.cache.reap_interval = Duration::from_millis(val);
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration.
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Validate the configuration. Empty list means it is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.upstream.validate());
        errors.extend(self.cache.validate());
        errors.extend(self.transport.validate());
        errors
    }

    /// Validate and return Result - convenience method.
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Proxy listen address (e.g., "0.0.0.0:21025")
    pub bind_address: String,

    /// Maximum number of concurrent client sessions
    pub max_sessions: usize,

    /// Timeout for graceful shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("0.0.0.0:21025"),
            max_sessions: 512,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.bind_address.is_empty() {
            errors.push("Bind address cannot be empty".to_string());
        } else if self.bind_address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid bind address: '{}' (expected format: '0.0.0.0:21025')",
                self.bind_address
            ));
        }

        if self.max_sessions == 0 {
            errors.push("Max sessions must be greater than 0".to_string());
        }

        if self.shutdown_timeout.as_secs() < 1 {
            errors.push("Shutdown timeout too short (minimum: 1s)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Upstream game-server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Real game-server address
    pub address: String,

    /// Timeout for the outbound connect
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:21024"),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl UpstreamConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Upstream address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid upstream address: '{}' (expected format: '127.0.0.1:21024')",
                self.address
            ));
        }

        if self.connect_timeout.as_millis() < 100 {
            errors.push("Connect timeout too short (minimum: 100ms)".to_string());
        } else if self.connect_timeout.as_secs() > 60 {
            errors.push("Connect timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Payload cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Minimum payload size (bytes) before the parse cache is consulted
    pub threshold_bytes: usize,

    /// Interval between reap passes
    #[serde(with = "duration_serde")]
    pub reap_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            threshold_bytes: DEFAULT_CACHE_THRESHOLD,
            reap_interval: DEFAULT_REAP_INTERVAL,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.threshold_bytes > MAX_PAYLOAD_SIZE {
            errors.push("Cache threshold cannot exceed max payload size".to_string());
        }

        if self.reap_interval.as_millis() < 100 {
            errors.push("Reap interval too short (minimum: 100ms)".to_string());
        }

        errors
    }
}

/// Transport tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Maximum allowed payload size in bytes
    pub max_payload_size: usize,

    /// Zstd level for the compressed-transport upgrade
    pub compression_level: i32,

    /// Socket read chunk size in bytes
    pub read_chunk_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD_SIZE,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            read_chunk_bytes: 8192,
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_payload_size == 0 {
            errors.push("Max payload size cannot be 0".to_string());
        } else if self.max_payload_size > 100 * 1024 * 1024 {
            errors.push(format!(
                "Max payload size too large: {} bytes (maximum recommended: 100 MB)",
                self.max_payload_size
            ));
        }

        if !(1..=22).contains(&self.compression_level) {
            errors.push(format!(
                "Invalid compression level: {} (valid range: 1-22)",
                self.compression_level
            ));
        }

        if self.read_chunk_bytes < 64 {
            errors.push("Read chunk size too small (minimum: 64 bytes)".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization (milliseconds).
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(ProxyConfig::default().validate().is_empty());
    }

    #[test]
    fn toml_roundtrip() {
        let toml = r#"
            [server]
            bind_address = "127.0.0.1:4000"
            max_sessions = 8
            shutdown_timeout = 2000

            [upstream]
            address = "127.0.0.1:4001"
            connect_timeout = 1000

            [cache]
            threshold_bytes = 256
            reap_interval = 5000

            [transport]
            max_payload_size = 1048576
            compression_level = 5
            read_chunk_bytes = 4096
        "#;
        let config = ProxyConfig::from_toml(toml).unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:4000");
        assert_eq!(config.cache.threshold_bytes, 256);
        assert_eq!(config.cache.reap_interval, Duration::from_secs(5));
        assert!(config.validate().is_empty());
    }

    #[test]
    fn bad_addresses_flagged() {
        let config = ProxyConfig::default_with_overrides(|c| {
            c.server.bind_address = String::from("not-an-address");
            c.upstream.address = String::new();
        });
        let errors = config.validate();
        assert_eq!(errors.len(), 2);
        assert!(config.validate_strict().is_err());
    }
}
