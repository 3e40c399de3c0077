// Configuration validation
//
// Validates that required fields are present and values are sensible

use crate::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_server_config(&config.server)?;
    validate_tracking_config(&config.tracking)?;
    validate_sink_config(&config.sink)?;
    Ok(())
}

fn validate_server_config(config: &ServerConfig) -> Result<()> {
    if config.listen_addr.is_empty() {
        bail!("server.listen_addr must not be empty");
    }

    // Basic validation that it looks like an address
    if !config.listen_addr.contains(':') {
        bail!("server.listen_addr must be in format 'host:port'");
    }

    if config.request_timeout_secs == 0 {
        bail!("server.request_timeout_secs must be greater than 0");
    }

    Ok(())
}

fn validate_tracking_config(config: &TrackingConfig) -> Result<()> {
    if config.queue_capacity == 0 {
        bail!("tracking.queue_capacity must be greater than 0");
    }

    if config.max_chunk_size == 0 {
        bail!("tracking.max_chunk_size must be greater than 0");
    }

    if config.flush_every_ms == 0 {
        bail!("tracking.flush_every_ms must be greater than 0");
    }

    if config.write_timeout_ms == 0 {
        bail!("tracking.write_timeout_ms must be greater than 0");
    }

    if config.queue_capacity > 10_000_000 {
        warn!(
            queue_capacity = config.queue_capacity,
            "tracking.queue_capacity is very large; may cause memory issues"
        );
    }

    if config.max_chunk_size > config.queue_capacity {
        warn!(
            max_chunk_size = config.max_chunk_size,
            queue_capacity = config.queue_capacity,
            "tracking.max_chunk_size exceeds queue_capacity; a full batch needs more events than the queue holds"
        );
    }

    if config.write_timeout_ms > config.flush_every_ms.saturating_mul(10) {
        warn!(
            write_timeout_ms = config.write_timeout_ms,
            flush_every_ms = config.flush_every_ms,
            "tracking.write_timeout_ms is much larger than flush_every_ms; a slow sink will stall ingestion"
        );
    }

    Ok(())
}

fn validate_sink_config(config: &SinkConfig) -> Result<()> {
    if config.backend == SinkBackend::Fs {
        let fs = config
            .fs
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("fs sink backend requires 'sink.fs' configuration"))?;

        if fs.path.is_empty() {
            bail!("sink.fs.path must not be empty");
        }
    }

    Ok(())
}
