// Initialization utilities for server mode
//
// Tracking sink selection, batch settings and logging/tracing setup

use std::sync::Arc;

use adserve_batch::{BatchConfig, DiscardSink, EventSink, LogSink};
use adserve_config::{LogFormat, RuntimeConfig, SinkBackend, SinkConfig, TrackingConfig};
use adserve_writer::JsonlSink;
use anyhow::{Context, Result};
use tracing::info;

/// Build the tracking sink selected by the configuration
pub fn init_sink(config: &SinkConfig) -> Result<Arc<dyn EventSink>> {
    info!("Initializing tracking sink with backend: {}", config.backend);

    let sink: Arc<dyn EventSink> = match config.backend {
        SinkBackend::Discard => Arc::new(DiscardSink),
        SinkBackend::Log => Arc::new(LogSink),
        SinkBackend::Fs => {
            let fs = config
                .fs
                .as_ref()
                .context("fs config required for filesystem sink")?;
            info!("Writing tracking batches under: {}", fs.path);
            Arc::new(JsonlSink::new_fs(&fs.path)?)
        }
        SinkBackend::Memory => Arc::new(JsonlSink::new_memory()?),
    };

    Ok(sink)
}

pub fn batch_config(tracking: &TrackingConfig) -> BatchConfig {
    BatchConfig {
        queue_capacity: tracking.queue_capacity,
        max_chunk_size: tracking.max_chunk_size,
        flush_every: tracking.flush_every(),
        write_timeout: tracking.write_timeout(),
    }
}

/// Initialize tracing/logging from RuntimeConfig
pub fn init_tracing(config: &RuntimeConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // Parse log level from config
    let env_filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // A subscriber may already be installed (tests, embedding binaries)
    let _ = match config.server.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Text => registry.with(fmt::layer()).try_init(),
    };
}
