//! Terminal errors of the batch worker

use std::time::Duration;

use thiserror::Error;

/// Why the batch worker stopped with a failure.
///
/// Both variants are fatal: the batch is not retried and the worker has
/// already stopped consuming the ingest queue.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("flush of {events} tracking events failed: {source}")]
    FlushFailed {
        events: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("flush of {events} tracking events exceeded write timeout of {timeout:?}")]
    FlushTimedOut { events: usize, timeout: Duration },
}

impl TrackingError {
    /// Number of events in the batch that could not be written
    pub fn events(&self) -> usize {
        match self {
            Self::FlushFailed { events, .. } | Self::FlushTimedOut { events, .. } => *events,
        }
    }
}
