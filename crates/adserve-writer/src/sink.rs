// OpenDAL-backed tracking sink
//
// One object per flushed batch, one JSON document per line, written with a
// single `Operator::write` call. The fs backend stages each object under
// `<root>/.tmp` and renames it into place, so a write abandoned at the deadline
// leaves no partial object at its final path. The memory backend stores the
// buffer only once the write completes.

use std::path::Path;

use adserve_batch::EventSink;
use adserve_core::TrackingEvent;
use async_trait::async_trait;
use chrono::Utc;
use opendal::{services, Operator};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{Result, WriterError};
use crate::partition::partition_path;

pub const DEFAULT_PREFIX: &str = "events";

/// Staging directory for fs writes, relative to the fs root
pub const ATOMIC_WRITE_DIR: &str = ".tmp";

#[derive(Clone)]
pub struct JsonlSink {
    operator: Operator,
    prefix: String,
}

impl JsonlSink {
    pub fn from_operator(operator: Operator) -> Self {
        Self {
            operator,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    /// Store batches under `root` on the local filesystem
    pub fn new_fs(root: &str) -> Result<Self> {
        let staging = Path::new(root).join(ATOMIC_WRITE_DIR);
        let builder = services::Fs::default()
            .root(root)
            .atomic_write_dir(&staging.to_string_lossy());
        let operator = Operator::new(builder)
            .map_err(|source| WriterError::Init {
                backend: "fs",
                source,
            })?
            .finish();

        info!(root, "Tracking batches will be written to the filesystem");
        Ok(Self::from_operator(operator))
    }

    /// Store batches in process memory (tests and local runs)
    pub fn new_memory() -> Result<Self> {
        let operator = Operator::new(services::Memory::default())
            .map_err(|source| WriterError::Init {
                backend: "memory",
                source,
            })?
            .finish();
        Ok(Self::from_operator(operator))
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    /// Write one batch and return the object path
    pub async fn write_batch(&self, events: &[TrackingEvent]) -> Result<String> {
        let body = encode_jsonl(events)?;
        let file_id = uuid::Uuid::new_v4().simple().to_string();
        let path = partition_path(&self.prefix, Utc::now(), &file_id);

        let bytes = body.len();
        self.operator
            .write(&path, body)
            .await
            .map_err(|source| WriterError::Storage {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path, events = events.len(), bytes, "Wrote tracking batch");
        Ok(path)
    }
}

#[async_trait]
impl EventSink for JsonlSink {
    async fn write(&self, events: Vec<TrackingEvent>, deadline: Instant) -> anyhow::Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        debug!(
            events = events.len(),
            budget_ms = deadline.saturating_duration_since(Instant::now()).as_millis() as u64,
            "Writing tracking batch"
        );
        self.write_batch(&events).await?;
        Ok(())
    }
}

/// Serialize events as JSON Lines, each line terminated by `\n`
pub fn encode_jsonl(events: &[TrackingEvent]) -> Result<Vec<u8>> {
    let mut body = Vec::with_capacity(events.len() * 128);
    for event in events {
        serde_json::to_writer(&mut body, event)?;
        body.push(b'\n');
    }
    Ok(body)
}
