use std::mem;
use std::sync::Arc;
use std::time::Duration;

use adserve_core::TrackingEvent;
use metrics::{counter, histogram};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{EventSink, TrackingError};

/// Stand-in offset for deadlines that would overflow `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `start + after`, saturating to a far-future instant
fn deadline_after(start: Instant, after: Duration) -> Instant {
    start
        .checked_add(after)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

#[derive(Clone, Copy)]
enum State {
    /// Buffer empty, no deadline armed
    Idle,
    /// Buffer non-empty, partial batch flushes at `flush_at`
    Accumulating { flush_at: Instant },
}

/// Sole consumer of the ingest queue.
///
/// Owns the batch buffer and flush deadline. Drive it with [`BatchWorker::run`]
/// on a dedicated task.
pub struct BatchWorker {
    rx: mpsc::Receiver<TrackingEvent>,
    sink: Arc<dyn EventSink>,
    max_chunk_size: usize,
    flush_every: Duration,
    write_timeout: Duration,
}

impl BatchWorker {
    pub(crate) fn new(
        rx: mpsc::Receiver<TrackingEvent>,
        sink: Arc<dyn EventSink>,
        max_chunk_size: usize,
        flush_every: Duration,
        write_timeout: Duration,
    ) -> Self {
        Self {
            rx,
            sink,
            max_chunk_size,
            flush_every,
            write_timeout,
        }
    }

    /// Consume the queue until `cancel` fires or every producer is dropped.
    ///
    /// Intervals too large to add to the clock, such as `Duration::MAX`, act
    /// as "never".
    ///
    /// A batch is flushed when it reaches `max_chunk_size` events, when
    /// `flush_every` has passed since its first event, or when cancellation is
    /// observed while it is non-empty. Cancellation seen with an empty buffer
    /// and an empty queue ends the loop with `Ok(())`.
    ///
    /// The first failed or timed-out flush ends the loop with an error. The
    /// receiving end of the queue is dropped on return, so producers see every
    /// later `accept` rejected.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), TrackingError> {
        info!(
            max_chunk_size = self.max_chunk_size,
            flush_every_ms = self.flush_every.as_millis() as u64,
            write_timeout_ms = self.write_timeout.as_millis() as u64,
            "Batch worker started"
        );

        let mut batch = Vec::with_capacity(self.max_chunk_size);
        let mut state = State::Idle;

        loop {
            let flush_due = match state {
                State::Idle => match self.next_when_idle(&cancel).await {
                    Some(event) => {
                        batch.push(event);
                        state = State::Accumulating {
                            flush_at: deadline_after(Instant::now(), self.flush_every),
                        };
                        false
                    }
                    None => break,
                },
                // Unbiased: with events queued and cancellation fired,
                // either branch may win.
                State::Accumulating { flush_at } => tokio::select! {
                    received = self.rx.recv() => match received {
                        Some(event) => {
                            batch.push(event);
                            false
                        }
                        None => true,
                    },
                    _ = time::sleep_until(flush_at) => true,
                    _ = cancel.cancelled() => true,
                },
            };

            if flush_due || batch.len() >= self.max_chunk_size {
                let events = mem::replace(&mut batch, Vec::with_capacity(self.max_chunk_size));
                self.flush(events).await?;
                state = State::Idle;
            }
        }

        info!(cancelled = cancel.is_cancelled(), "Batch worker stopped");
        Ok(())
    }

    /// Next event for an empty buffer, or `None` when the worker should stop.
    ///
    /// Queued events win over cancellation.
    async fn next_when_idle(&mut self, cancel: &CancellationToken) -> Option<TrackingEvent> {
        match self.rx.try_recv() {
            Ok(event) => return Some(event),
            Err(TryRecvError::Disconnected) => {
                debug!("Ingest queue closed");
                return None;
            }
            Err(TryRecvError::Empty) => {}
        }

        tokio::select! {
            received = self.rx.recv() => received,
            _ = cancel.cancelled() => None,
        }
    }

    async fn flush(&self, events: Vec<TrackingEvent>) -> Result<(), TrackingError> {
        let count = events.len();
        let started = Instant::now();
        let deadline = deadline_after(started, self.write_timeout);
        debug!(events = count, "Flushing tracking batch");

        match time::timeout_at(deadline, self.sink.write(events, deadline)).await {
            Ok(Ok(())) => {
                counter!("tracking.batch.flushes").increment(1);
                histogram!("tracking.batch.size").record(count as f64);
                histogram!("tracking.flush.latency_ms")
                    .record(started.elapsed().as_secs_f64() * 1000.0);
                Ok(())
            }
            Ok(Err(source)) => {
                counter!("tracking.batch.flush_errors", "kind" => "sink").increment(1);
                error!(events = count, error = %source, "Cannot flush tracking batch");
                Err(TrackingError::FlushFailed {
                    events: count,
                    source,
                })
            }
            Err(_) => {
                counter!("tracking.batch.flush_errors", "kind" => "timeout").increment(1);
                error!(
                    events = count,
                    timeout_ms = self.write_timeout.as_millis() as u64,
                    "Tracking batch write timed out"
                );
                Err(TrackingError::FlushTimedOut {
                    events: count,
                    timeout: self.write_timeout,
                })
            }
        }
    }
}
