//! `DisplaySession` wired to an in-process backend.

mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use snapwall_core::{FontSpec, Prefetch, TextMeasure};
use snapwall_live::{ConnectionConfig, ConnectionState, DisplayConfig, DisplaySession, PlaybackAuthority};
use support::{wait_for_state, TestServer};

/// Every glyph is 10px wide.
struct FixedMeasure;

impl TextMeasure for FixedMeasure {
    fn measure_text(&mut self, text: &str, _font: &FontSpec) -> f32 {
        text.chars().count() as f32 * 10.0
    }
}

#[derive(Default)]
struct RecordingPrefetch {
    urls: Mutex<Vec<String>>,
}

impl Prefetch for RecordingPrefetch {
    fn prefetch(&self, url: &str) {
        self.urls.lock().unwrap().push(url.to_string());
    }
}

fn photo(id: &str) -> Value {
    json!({
        "id": id,
        "activityId": "abc123",
        "sessionId": "p1",
        "driveFileId": format!("d-{id}"),
        "thumbnailUrl": format!("https://t/{id}"),
        "fullUrl": format!("https://f/{id}"),
        "uploadedAt": 1
    })
}

fn start(server: &TestServer, prefetch: Arc<RecordingPrefetch>) -> DisplaySession {
    let config = DisplayConfig {
        ws_base: format!("ws://127.0.0.1:{}", server.port),
        activity_id: "abc123".into(),
        connection: ConnectionConfig {
            base_reconnect_delay: Duration::from_millis(20),
            ..ConnectionConfig::default()
        },
        ..DisplayConfig::default()
    };
    DisplaySession::start(config, "wall-1", Box::new(FixedMeasure), prefetch)
}

async fn eventually(mut done: impl FnMut() -> bool) {
    for _ in 0..100 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_joins_as_display() {
    let mut server = TestServer::start().await;
    let session = start(&server, Arc::default());

    let (_, frame) = server.next_frame().await;
    assert_eq!(frame, json!({"type": "join", "sessionId": "wall-1", "role": "display"}));
    assert_eq!(session.connection().session_id(), "wall-1");
}

#[tokio::test]
async fn test_joined_snapshot_fills_wall() {
    let mut server = TestServer::start().await;
    let prefetch = Arc::new(RecordingPrefetch::default());
    let session = start(&server, Arc::clone(&prefetch));
    server.next_frame().await;

    server.push_json(json!({
        "type": "joined",
        "activityId": "abc123",
        "photos": [photo("a"), photo("b"), photo("c"), photo("d")],
        "timestamp": 1
    }));

    eventually(|| session.current_photo().is_some()).await;
    assert_eq!(session.authority(), PlaybackAuthority::Client);
    assert_eq!(session.queue_lengths().0, 4);
    assert!(!prefetch.urls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_new_photo_goes_to_priority_queue() {
    let mut server = TestServer::start().await;
    let session = start(&server, Arc::default());
    server.next_frame().await;

    server.push_json(json!({
        "type": "joined",
        "activityId": "abc123",
        "photos": [photo("a"), photo("b")],
        "timestamp": 1
    }));
    server.push_json(json!({"type": "photo_added", "photo": photo("fresh")}));

    eventually(|| session.queue_lengths() == (3, 1, 2)).await;
}

#[tokio::test]
async fn test_danmaku_reaches_overlay() {
    let mut server = TestServer::start().await;
    let session = start(&server, Arc::default());
    server.next_frame().await;

    server.push_json(json!({
        "type": "danmaku",
        "id": "m1",
        "content": "hello",
        "sessionId": "p1",
        "timestamp": 1
    }));

    eventually(|| !session.overlay_snapshot().is_empty()).await;
    let items = session.overlay_snapshot();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].content, "hello");
    assert!(items[0].x < 1920.0);
}

#[tokio::test]
async fn test_send_danmaku_from_display() {
    let mut server = TestServer::start().await;
    let session = start(&server, Arc::default());
    let mut states = session.connection().subscribe_state();
    wait_for_state(&mut states, ConnectionState::Open).await;
    server.next_frame().await;

    assert_eq!(session.send_danmaku("  cheers  "), Ok(true));
    let (_, frame) = server.next_non_ping().await;
    assert_eq!(
        frame,
        json!({"type": "danmaku", "content": "cheers", "sessionId": "wall-1"})
    );

    // Second send inside the cooldown is rejected locally.
    assert!(session.send_danmaku("again").is_err());
}

#[tokio::test]
async fn test_activity_end_stops_reconnecting() {
    let mut server = TestServer::start().await;
    let session = start(&server, Arc::default());
    let mut states = session.connection().subscribe_state();
    wait_for_state(&mut states, ConnectionState::Open).await;
    server.next_frame().await;

    server.push_json(json!({
        "type": "activity_ended",
        "activityId": "abc123",
        "reason": "expired",
        "timestamp": 1
    }));

    eventually(|| session.ended_reason().is_some()).await;
    assert_eq!(session.ended_reason().as_deref(), Some("expired"));
    wait_for_state(&mut states, ConnectionState::ClosedFinal).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.accepted(), 1);
    assert_eq!(session.connection_state(), ConnectionState::ClosedFinal);
}

#[tokio::test]
async fn test_shutdown_stops_everything() {
    let mut server = TestServer::start().await;
    let session = start(&server, Arc::default());
    let mut states = session.connection().subscribe_state();
    wait_for_state(&mut states, ConnectionState::Open).await;
    server.next_frame().await;

    session.shutdown();
    session.shutdown();
    assert!(session.is_shut_down());
    assert_eq!(session.connection_state(), ConnectionState::ClosedFinal);

    // Stays down; nothing reconnects or animates.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(session.send_danmaku("late"), Ok(false));
    assert!(session.overlay_snapshot().is_empty());
}
