use std::fmt;

use adserve_core::TrackingEvent;
use metrics::counter;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Producer handle of the bounded ingest queue.
///
/// Cheap to clone; every clone feeds the same queue. Accepting never waits:
/// a full queue rejects the event immediately.
#[derive(Debug, Clone)]
pub struct IngestQueue {
    tx: mpsc::Sender<TrackingEvent>,
}

/// Why an event was not queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Queue at capacity
    Full,
    /// Worker has stopped and dropped the receiving end
    Closed,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Full => write!(f, "queue full"),
            RejectReason::Closed => write!(f, "queue closed"),
        }
    }
}

/// An event handed back to the caller together with the rejection reason
#[derive(Debug)]
pub struct Rejected {
    pub reason: RejectReason,
    pub event: TrackingEvent,
}

impl IngestQueue {
    pub(crate) fn new(tx: mpsc::Sender<TrackingEvent>) -> Self {
        Self { tx }
    }

    /// Queue `event` without waiting. Returns `false` when it was rejected.
    pub fn accept(&self, event: TrackingEvent) -> bool {
        self.try_accept(event).is_ok()
    }

    /// Like [`accept`](Self::accept), but returns the rejected event to the caller.
    pub fn try_accept(&self, event: TrackingEvent) -> Result<(), Rejected> {
        match self.tx.try_send(event) {
            Ok(()) => {
                counter!("tracking.events.accepted").increment(1);
                Ok(())
            }
            Err(TrySendError::Full(event)) => {
                counter!("tracking.events.rejected", "reason" => "full").increment(1);
                debug!(line_item_id = %event.line_item_id, "Ingest queue full, rejecting event");
                Err(Rejected {
                    reason: RejectReason::Full,
                    event,
                })
            }
            Err(TrySendError::Closed(event)) => {
                counter!("tracking.events.rejected", "reason" => "closed").increment(1);
                warn!(line_item_id = %event.line_item_id, "Batch worker stopped, rejecting event");
                Err(Rejected {
                    reason: RejectReason::Closed,
                    event,
                })
            }
        }
    }

    /// Configured queue capacity
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Events queued but not yet taken by the worker
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
