// adserve-config - Runtime configuration for the ad server
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from ADSERVE_CONFIG env var
// 3. Config file contents from ADSERVE_CONFIG_CONTENT env var
// 4. Default config file locations (./config.toml, ./.adserve.toml)
// 5. Built-in defaults (lowest priority)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{apply_env_overrides, EnvSource, ENV_PREFIX};

/// Main runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub app: AppConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub tracking: TrackingConfig,

    #[serde(default)]
    pub sink: SinkConfig,

    #[serde(default)]
    pub ads: AdsConfig,
}

/// Application identity, reported by the health endpoint and in logs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub environment: String,
    pub version: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Ad Bidding Service".to_string(),
            environment: "development".to_string(),
            version: "1.0.0".to_string(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub request_timeout_secs: u64,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Tracking pipeline configuration, fixed for the lifetime of the batch worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Ingest queue capacity
    pub queue_capacity: usize,
    /// Events per batch before a size-triggered flush
    pub max_chunk_size: usize,
    /// Max time an event waits in a partial batch
    pub flush_every_ms: u64,
    /// Deadline for a single sink write
    pub write_timeout_ms: u64,
}

impl TrackingConfig {
    pub fn flush_every(&self) -> Duration {
        Duration::from_millis(self.flush_every_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1000,
            max_chunk_size: 100,
            flush_every_ms: 3_000,
            write_timeout_ms: 10_000,
        }
    }
}

/// Where flushed tracking batches go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub backend: SinkBackend,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fs: Option<FsConfig>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            backend: SinkBackend::Discard,
            fs: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkBackend {
    /// Drop every batch
    Discard,
    /// Emit every batch to the log
    Log,
    /// JSON Lines objects on the local filesystem
    Fs,
    /// JSON Lines objects in process memory
    Memory,
}

impl std::fmt::Display for SinkBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkBackend::Discard => write!(f, "discard"),
            SinkBackend::Log => write!(f, "log"),
            SinkBackend::Fs => write!(f, "fs"),
            SinkBackend::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for SinkBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "discard" | "none" => Ok(SinkBackend::Discard),
            "log" | "stdout" => Ok(SinkBackend::Log),
            "fs" | "filesystem" => Ok(SinkBackend::Fs),
            "memory" => Ok(SinkBackend::Memory),
            _ => anyhow::bail!(
                "Unsupported sink backend: {}. Supported: discard, log, fs, memory",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsConfig {
    pub path: String,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            path: "./data".to_string(),
        }
    }
}

/// Ad selection configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdsConfig {
    /// Prefix for `serve_url` of returned ads; empty URLs when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serve_base_url: Option<String>,
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load from an explicit file (CLI `--config`), then apply env overrides
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Fill in sections that the chosen backend needs but the sources left out
    fn apply_backend_defaults(&mut self) {
        if self.sink.backend == SinkBackend::Fs && self.sink.fs.is_none() {
            self.sink.fs = Some(FsConfig::default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_backend_from_str() {
        assert_eq!(
            "discard".parse::<SinkBackend>().unwrap(),
            SinkBackend::Discard
        );
        assert_eq!("log".parse::<SinkBackend>().unwrap(), SinkBackend::Log);
        assert_eq!("FS".parse::<SinkBackend>().unwrap(), SinkBackend::Fs);
        assert_eq!(
            "filesystem".parse::<SinkBackend>().unwrap(),
            SinkBackend::Fs
        );
        assert_eq!(
            "memory".parse::<SinkBackend>().unwrap(),
            SinkBackend::Memory
        );
        assert!("kafka".parse::<SinkBackend>().is_err());
    }

    #[test]
    fn test_default_configs() {
        let config = RuntimeConfig::default();
        assert_eq!(config.app.name, "Ad Bidding Service");
        assert_eq!(config.server.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.server.log_format, LogFormat::Text);
        assert_eq!(config.server.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.tracking.queue_capacity, 1000);
        assert_eq!(config.tracking.max_chunk_size, 100);
        assert_eq!(config.tracking.flush_every(), Duration::from_secs(3));
        assert_eq!(config.tracking.write_timeout(), Duration::from_secs(10));
        assert_eq!(config.sink.backend, SinkBackend::Discard);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: RuntimeConfig = toml::from_str(
            r#"
            [tracking]
            max_chunk_size = 10

            [sink]
            backend = "fs"
            "#,
        )
        .unwrap();

        assert_eq!(config.tracking.max_chunk_size, 10);
        assert_eq!(config.tracking.queue_capacity, 1000);
        assert_eq!(config.server.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.sink.backend, SinkBackend::Fs);
        assert!(config.sink.fs.is_none());
    }

    #[test]
    fn test_backend_defaults_fill_fs_section() {
        let mut config = RuntimeConfig::default();
        config.sink.backend = SinkBackend::Fs;
        config.apply_backend_defaults();
        assert_eq!(config.sink.fs, Some(FsConfig::default()));
    }
}
