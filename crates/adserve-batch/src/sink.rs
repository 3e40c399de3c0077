// Sink trait for persisting flushed batches
//
// Implementations:
// - DiscardSink (drops every batch)
// - LogSink (emits every batch through tracing)
// - FnSink (wraps a closure; handy for tests and glue code)
// - JsonlSink in adserve-writer (object storage via OpenDAL)

use std::future::Future;

use adserve_core::TrackingEvent;
use anyhow::Result;
use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info};

/// Destination for flushed tracking batches.
///
/// `write` receives the batch in arrival order together with the deadline the
/// worker enforces on the call. Writes are expected to be all-or-nothing: an
/// `Err` means none of the batch was persisted.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn write(&self, events: Vec<TrackingEvent>, deadline: Instant) -> Result<()>;
}

/// Sink that accepts and drops every batch
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

#[async_trait]
impl EventSink for DiscardSink {
    async fn write(&self, events: Vec<TrackingEvent>, _deadline: Instant) -> Result<()> {
        debug!(events = events.len(), "Discarding tracking batch");
        Ok(())
    }
}

/// Sink that logs every event at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn write(&self, events: Vec<TrackingEvent>, _deadline: Instant) -> Result<()> {
        for event in &events {
            info!(
                event_type = %event.event_type,
                line_item_id = %event.line_item_id,
                placement = event.placement.as_deref().unwrap_or(""),
                user_id = event.user_id.as_deref().unwrap_or(""),
                "Tracking event"
            );
        }
        Ok(())
    }
}

/// Adapts an async closure into an [`EventSink`]
pub struct FnSink<F>(F);

impl<F, Fut> FnSink<F>
where
    F: Fn(Vec<TrackingEvent>, Instant) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> EventSink for FnSink<F>
where
    F: Fn(Vec<TrackingEvent>, Instant) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn write(&self, events: Vec<TrackingEvent>, deadline: Instant) -> Result<()> {
        (self.0)(events, deadline).await
    }
}
