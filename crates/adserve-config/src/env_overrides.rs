use super::{FsConfig, LogFormat, RuntimeConfig, SinkBackend};
use anyhow::{anyhow, Context, Result};
use std::str::FromStr;

pub const ENV_PREFIX: &str = "ADSERVE_";

/// Abstraction over environment-variable lookups so tests can supply
/// their own source of overrides.
pub trait EnvSource {
    /// Look up `key` with the ADSERVE_ prefix applied
    fn get(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Application identity
    if let Some(name) = env.get("APP_NAME") {
        config.app.name = name;
    }
    if let Some(environment) = env.get("APP_ENVIRONMENT") {
        config.app.environment = environment;
    }

    // Server configuration (listen addr, timeout, log level/format)
    if let Some(addr) = env.get("LISTEN_ADDR") {
        config.server.listen_addr = addr;
    } else if let Some(port) = get_env_parsed::<_, u16>(env, "PORT")? {
        config.server.listen_addr = format!("0.0.0.0:{}", port);
    }
    if let Some(val) = get_env_parsed(env, "REQUEST_TIMEOUT_SECS")? {
        config.server.request_timeout_secs = val;
    }
    if let Some(level) = env.get("LOG_LEVEL") {
        config.server.log_level = level;
    }
    if let Some(format) = env.get("LOG_FORMAT") {
        config.server.log_format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    // Tracking pipeline
    if let Some(val) = get_env_parsed(env, "TRACKING_QUEUE_CAPACITY")? {
        config.tracking.queue_capacity = val;
    }
    if let Some(val) = get_env_parsed(env, "TRACKING_MAX_CHUNK_SIZE")? {
        config.tracking.max_chunk_size = val;
    }
    if let Some(val) = get_env_parsed(env, "TRACKING_FLUSH_EVERY_MS")? {
        config.tracking.flush_every_ms = val;
    }
    if let Some(val) = get_env_parsed(env, "TRACKING_WRITE_TIMEOUT_MS")? {
        config.tracking.write_timeout_ms = val;
    }

    // Sink
    if let Some(backend) = env.get("SINK_BACKEND") {
        config.sink.backend = backend
            .parse::<SinkBackend>()
            .context("Invalid ADSERVE_SINK_BACKEND value")?;
    }
    if let Some(path) = env.get("SINK_PATH") {
        config.sink.fs.get_or_insert_with(FsConfig::default).path = path;
    }

    // Ads
    if let Some(url) = env.get("SERVE_BASE_URL") {
        config.ads.serve_base_url = Some(url);
    }

    Ok(())
}

fn get_env_parsed<E, T>(env: &E, key: &str) -> Result<Option<T>>
where
    E: EnvSource,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env.get(key) {
        Some(val) => {
            let parsed = val
                .trim()
                .parse::<T>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapEnv(HashMap<&'static str, &'static str>);

    impl EnvSource for MapEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|v| v.to_string())
        }
    }

    fn env(pairs: &[(&'static str, &'static str)]) -> MapEnv {
        MapEnv(pairs.iter().copied().collect())
    }

    #[test]
    fn test_tracking_overrides() {
        let mut config = RuntimeConfig::default();
        apply_env_overrides(
            &mut config,
            &env(&[
                ("TRACKING_QUEUE_CAPACITY", "5"),
                ("TRACKING_MAX_CHUNK_SIZE", "2"),
                ("TRACKING_FLUSH_EVERY_MS", "250"),
                ("TRACKING_WRITE_TIMEOUT_MS", " 1000 "),
            ]),
        )
        .unwrap();

        assert_eq!(config.tracking.queue_capacity, 5);
        assert_eq!(config.tracking.max_chunk_size, 2);
        assert_eq!(config.tracking.flush_every_ms, 250);
        assert_eq!(config.tracking.write_timeout_ms, 1000);
    }

    #[test]
    fn test_server_and_sink_overrides() {
        let mut config = RuntimeConfig::default();
        apply_env_overrides(
            &mut config,
            &env(&[
                ("PORT", "9090"),
                ("LOG_FORMAT", "JSON"),
                ("SINK_BACKEND", "fs"),
                ("SINK_PATH", "/var/lib/adserve"),
            ]),
        )
        .unwrap();

        assert_eq!(config.server.listen_addr, "0.0.0.0:9090");
        assert_eq!(config.server.log_format, LogFormat::Json);
        assert_eq!(config.sink.backend, SinkBackend::Fs);
        assert_eq!(config.sink.fs.unwrap().path, "/var/lib/adserve");
    }

    #[test]
    fn test_listen_addr_beats_port() {
        let mut config = RuntimeConfig::default();
        apply_env_overrides(
            &mut config,
            &env(&[("LISTEN_ADDR", "127.0.0.1:7000"), ("PORT", "9090")]),
        )
        .unwrap();
        assert_eq!(config.server.listen_addr, "127.0.0.1:7000");
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let mut config = RuntimeConfig::default();
        let err = apply_env_overrides(&mut config, &env(&[("TRACKING_MAX_CHUNK_SIZE", "lots")]))
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("ADSERVE_TRACKING_MAX_CHUNK_SIZE"));
    }

    #[test]
    fn test_invalid_backend_is_an_error() {
        let mut config = RuntimeConfig::default();
        assert!(apply_env_overrides(&mut config, &env(&[("SINK_BACKEND", "kafka")])).is_err());
    }
}
