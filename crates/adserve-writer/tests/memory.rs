use std::time::Duration;

use adserve_batch::EventSink;
use adserve_core::{EventType, TrackingEvent};
use adserve_writer::{JsonlSink, ATOMIC_WRITE_DIR};
use tokio::time::Instant;

async fn object_paths(sink: &JsonlSink) -> Vec<String> {
    let mut paths: Vec<String> = sink
        .operator()
        .list_with("/")
        .recursive(true)
        .await
        .unwrap()
        .into_iter()
        .filter(|entry| entry.metadata().mode().is_file())
        .map(|entry| entry.path().to_string())
        .collect();
    paths.sort();
    paths
}

#[tokio::test]
async fn each_batch_becomes_one_object() {
    let sink = JsonlSink::new_memory().unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);

    let first = vec![
        TrackingEvent::new(EventType::Impression, "li_1"),
        TrackingEvent::new(EventType::Click, "li_1"),
    ];
    let second = vec![TrackingEvent::new(EventType::Conversion, "li_2")];

    sink.write(first, deadline).await.unwrap();
    sink.write(second, deadline).await.unwrap();

    let paths = object_paths(&sink).await;
    assert_eq!(paths.len(), 2);
    for path in &paths {
        assert!(path.starts_with("events/year="), "unexpected path {path}");
        assert!(path.contains("/hour="));
        assert!(path.ends_with(".jsonl"));
    }

    let mut line_counts = Vec::new();
    for path in &paths {
        let body = sink.operator().read(path).await.unwrap().to_vec();
        let body = String::from_utf8(body).unwrap();
        for line in body.lines() {
            let event: TrackingEvent = serde_json::from_str(line).unwrap();
            assert!(event.line_item_id.starts_with("li_"));
        }
        line_counts.push(body.lines().count());
    }
    line_counts.sort();
    assert_eq!(line_counts, [1, 2]);
}

#[tokio::test]
async fn batch_round_trips_in_order() {
    let sink = JsonlSink::new_memory().unwrap().with_prefix("tracking");
    let events: Vec<TrackingEvent> = (0..5)
        .map(|n| TrackingEvent::new(EventType::Impression, format!("li_{n}")))
        .collect();

    let path = sink.write_batch(&events).await.unwrap();
    assert!(path.starts_with("tracking/year="));

    let body = sink.operator().read(&path).await.unwrap().to_vec();
    let stored: Vec<TrackingEvent> = String::from_utf8(body)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(stored, events);
}

#[tokio::test]
async fn empty_batch_writes_nothing() {
    let sink = JsonlSink::new_memory().unwrap();
    sink.write(Vec::new(), Instant::now()).await.unwrap();
    assert!(object_paths(&sink).await.is_empty());
}

#[tokio::test]
async fn filesystem_backend_writes_under_root() {
    let root = std::env::temp_dir().join(format!("adserve-writer-{}", uuid::Uuid::new_v4()));
    let sink = JsonlSink::new_fs(root.to_str().unwrap()).unwrap();

    let path = sink
        .write_batch(&[TrackingEvent::new(EventType::Click, "li_7")])
        .await
        .unwrap();

    let on_disk = std::fs::read_to_string(root.join(&path)).unwrap();
    assert!(on_disk.contains(r#""line_item_id":"li_7""#));

    std::fs::remove_dir_all(&root).unwrap();
}

#[tokio::test]
async fn filesystem_writes_are_staged_then_renamed() {
    let root = std::env::temp_dir().join(format!("adserve-writer-{}", uuid::Uuid::new_v4()));
    let sink = JsonlSink::new_fs(root.to_str().unwrap()).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);

    for n in 0..3 {
        let events = vec![TrackingEvent::new(EventType::Impression, format!("li_{n}"))];
        sink.write(events, deadline).await.unwrap();
    }

    // completed writes leave nothing behind in the staging directory
    let staging = root.join(ATOMIC_WRITE_DIR);
    if staging.exists() {
        assert_eq!(std::fs::read_dir(&staging).unwrap().count(), 0);
    }

    let stored: Vec<String> = object_paths(&sink)
        .await
        .into_iter()
        .filter(|path| path.starts_with("events/"))
        .collect();
    assert_eq!(stored.len(), 3);
    for path in &stored {
        let body = std::fs::read_to_string(root.join(path)).unwrap();
        assert_eq!(body.lines().count(), 1);
    }

    std::fs::remove_dir_all(&root).unwrap();
}
