//! Tracking-event ingestion and batching.
//!
//! [`channel`] builds the two halves of the pipeline: an [`IngestQueue`] that
//! any number of request handlers feed without waiting, and the single
//! [`BatchWorker`] that drains it into batches and hands each batch to an
//! [`EventSink`] under a write deadline.
//!
//! ```ignore
//! let (queue, worker) = adserve_batch::channel(BatchConfig::default(), Arc::new(LogSink));
//! let cancel = CancellationToken::new();
//! let handle = tokio::spawn(worker.run(cancel.clone()));
//!
//! if !queue.accept(event) {
//!     // overloaded: drop the event or report it upstream
//! }
//!
//! cancel.cancel();
//! handle.await??;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

mod error;
mod queue;
mod sink;
mod worker;

pub use error::TrackingError;
pub use queue::{IngestQueue, RejectReason, Rejected};
pub use sink::{DiscardSink, EventSink, FnSink, LogSink};
pub use worker::BatchWorker;

/// Pipeline settings, fixed for the lifetime of the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Max events waiting in the ingest queue
    pub queue_capacity: usize,
    /// Events per batch that trigger an immediate flush
    pub max_chunk_size: usize,
    /// Max age of a partial batch, measured from its first event
    pub flush_every: Duration,
    /// Deadline for one sink write
    pub write_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1000,
            max_chunk_size: 100,
            flush_every: Duration::from_secs(3),
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// Create the ingest queue and its worker.
///
/// Zero capacity or chunk size is raised to 1.
pub fn channel(config: BatchConfig, sink: Arc<dyn EventSink>) -> (IngestQueue, BatchWorker) {
    let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
    let worker = BatchWorker::new(
        rx,
        sink,
        config.max_chunk_size.max(1),
        config.flush_every,
        config.write_timeout,
    );
    (IngestQueue::new(tx), worker)
}
