// End-to-end tests for adserve
//
// These tests drive the HTTP router and a running batch worker together,
// from tracking requests through to the configured sink.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use adserve_batch::{BatchConfig, EventSink, TrackingError};
use adserve_config::RuntimeConfig;
use adserve_core::TrackingEvent;
use adserve_server::{router, AppState};
use adserve_writer::JsonlSink;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

#[derive(Default)]
struct CountingSink {
    batches: AtomicUsize,
    events: AtomicUsize,
}

#[async_trait]
impl EventSink for CountingSink {
    async fn write(&self, events: Vec<TrackingEvent>, _deadline: Instant) -> anyhow::Result<()> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.events.fetch_add(events.len(), Ordering::SeqCst);
        Ok(())
    }
}

struct FailingSink;

#[async_trait]
impl EventSink for FailingSink {
    async fn write(&self, _events: Vec<TrackingEvent>, _deadline: Instant) -> anyhow::Result<()> {
        anyhow::bail!("disk full")
    }
}

fn batch_config(max_chunk_size: usize) -> BatchConfig {
    BatchConfig {
        queue_capacity: 100,
        max_chunk_size,
        flush_every: Duration::from_secs(60),
        write_timeout: Duration::from_secs(5),
    }
}

async fn track(app: &Router, line_item_id: &str) -> bool {
    let body = format!(r#"{{"event_type":"click","line_item_id":"{line_item_id}"}}"#);
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/tracking")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    body["success"].as_bool().unwrap()
}

#[tokio::test]
async fn tracked_events_reach_the_sink_by_shutdown() {
    let sink = Arc::new(CountingSink::default());
    let (queue, worker) = adserve_batch::channel(batch_config(4), sink.clone());
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.run(cancel.clone()));

    let app = router(
        AppState::new(&RuntimeConfig::default(), queue),
        Duration::from_secs(5),
    );
    for n in 0..10 {
        assert!(track(&app, &format!("li_{n}")).await);
    }

    cancel.cancel();
    handle.await.unwrap().unwrap();

    assert_eq!(sink.events.load(Ordering::SeqCst), 10);
    assert!(sink.batches.load(Ordering::SeqCst) >= 3);
}

#[tokio::test]
async fn failed_flush_stops_accepting_events() {
    let (queue, worker) = adserve_batch::channel(batch_config(1), Arc::new(FailingSink));
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.run(cancel.clone()));

    let app = router(
        AppState::new(&RuntimeConfig::default(), queue),
        Duration::from_secs(5),
    );
    assert!(track(&app, "li_1").await);

    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, TrackingError::FlushFailed { events: 1, .. }));
    assert!(!track(&app, "li_2").await);
}

#[tokio::test]
async fn jsonl_sink_stores_tracked_events() {
    let sink = JsonlSink::new_memory().unwrap();
    let operator = sink.operator().clone();
    let (queue, worker) = adserve_batch::channel(batch_config(2), Arc::new(sink));
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.run(cancel.clone()));

    let app = router(
        AppState::new(&RuntimeConfig::default(), queue),
        Duration::from_secs(5),
    );
    for n in 0..3 {
        assert!(track(&app, &format!("li_{n}")).await);
    }

    cancel.cancel();
    handle.await.unwrap().unwrap();

    let entries = operator.list_with("/").recursive(true).await.unwrap();
    let mut stored = Vec::new();
    for entry in entries {
        if !entry.metadata().mode().is_file() {
            continue;
        }
        let body = operator.read(entry.path()).await.unwrap().to_vec();
        for line in String::from_utf8(body).unwrap().lines() {
            let event: TrackingEvent = serde_json::from_str(line).unwrap();
            stored.push(event.line_item_id);
        }
    }
    stored.sort();
    assert_eq!(stored, ["li_0", "li_1", "li_2"]);
}
