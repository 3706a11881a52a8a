use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cncflow_core::event_bus::OutlineEvent;
use cncflow_core::{AppEvent, EventBus, OutlineError};
use cncflow_workflow::{OutlineBackend, OutlineChannel, OutlineRequest};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Default)]
struct RecordingOutline {
    requests: Mutex<Vec<OutlineRequest>>,
}

#[async_trait]
impl OutlineBackend for RecordingOutline {
    async fn compute(&self, request: OutlineRequest) -> Result<Arc<str>, OutlineError> {
        let lines = request.program_text.lines().count();
        self.requests.lock().push(request);
        Ok(Arc::from(format!("G0 X0 Y0\n; {} source lines", lines)))
    }
}

struct FailingOutline;

#[async_trait]
impl OutlineBackend for FailingOutline {
    async fn compute(&self, _request: OutlineRequest) -> Result<Arc<str>, OutlineError> {
        Err(OutlineError::Backend {
            reason: "no motion in program".to_string(),
        })
    }
}

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Never finishes; counts how often its future is dropped
struct StuckOutline {
    dropped: Arc<AtomicUsize>,
}

#[async_trait]
impl OutlineBackend for StuckOutline {
    async fn compute(&self, _request: OutlineRequest) -> Result<Arc<str>, OutlineError> {
        let _guard = DropCounter(self.dropped.clone());
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Arc::from(""))
    }
}

async fn next_result(rx: &mut broadcast::Receiver<AppEvent>) -> OutlineEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event within timeout")
            .expect("bus open");
        match event {
            AppEvent::Outline(OutlineEvent::Requested { .. }) => continue,
            AppEvent::Outline(result) => return result,
            _ => continue,
        }
    }
}

#[tokio::test]
async fn completion_then_single_teardown() {
    let bus = EventBus::new();
    let mut rx = bus.receiver();
    let backend = Arc::new(RecordingOutline::default());
    let mut channel = OutlineChannel::new(backend.clone(), bus.clone(), None);

    let id = channel.request(Arc::from("G0 X0\nG1 X10\nG1 Y10\n"), true);
    assert!(channel.is_pending(id));

    match next_result(&mut rx).await {
        OutlineEvent::Completed {
            request_id,
            outline,
        } => {
            assert_eq!(request_id, id);
            assert!(outline.contains("3 source lines"));
        }
        other => panic!("unexpected {:?}", other),
    }

    assert!(channel.teardown(id));
    assert!(!channel.teardown(id));
    assert_eq!(channel.pending_count(), 0);

    let requests = backend.requests.lock();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].laser_mode);
}

#[tokio::test]
async fn two_requests_two_completions() {
    let bus = EventBus::new();
    let mut rx = bus.receiver();
    let mut channel = OutlineChannel::new(Arc::new(RecordingOutline::default()), bus.clone(), None);

    let first = channel.request(Arc::from("G0 X0"), false);
    let second = channel.request(Arc::from("G0 X0"), false);
    assert_ne!(first, second);
    assert_eq!(channel.pending_count(), 2);

    let mut seen = vec![
        next_result(&mut rx).await.request_id(),
        next_result(&mut rx).await.request_id(),
    ];
    seen.sort();
    let mut expected = vec![first, second];
    expected.sort();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn backend_error_is_published() {
    let bus = EventBus::new();
    let mut rx = bus.receiver();
    let mut channel = OutlineChannel::new(Arc::new(FailingOutline), bus.clone(), None);

    let id = channel.request(Arc::from("M3 S1000"), false);
    match next_result(&mut rx).await {
        OutlineEvent::Failed { request_id, reason } => {
            assert_eq!(request_id, id);
            assert!(reason.contains("no motion in program"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn timeout_fails_and_stops_worker() {
    let bus = EventBus::new();
    let mut rx = bus.receiver();
    let dropped = Arc::new(AtomicUsize::new(0));
    let backend = Arc::new(StuckOutline {
        dropped: dropped.clone(),
    });
    let mut channel = OutlineChannel::new(backend, bus.clone(), Some(Duration::from_millis(50)));

    let id = channel.request(Arc::from("G0 X0"), false);
    match next_result(&mut rx).await {
        OutlineEvent::Failed { request_id, reason } => {
            assert_eq!(request_id, id);
            assert!(reason.contains("timed out after 50ms"));
        }
        other => panic!("unexpected {:?}", other),
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(dropped.load(Ordering::SeqCst), 1);
    assert!(channel.teardown(id));
}

#[tokio::test]
async fn dropping_channel_aborts_pending_work() {
    let bus = EventBus::new();
    let dropped = Arc::new(AtomicUsize::new(0));
    let backend = Arc::new(StuckOutline {
        dropped: dropped.clone(),
    });
    let mut channel = OutlineChannel::new(backend, bus.clone(), None);
    channel.request(Arc::from("G0 X0"), false);

    // Let the worker reach its await point
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(dropped.load(Ordering::SeqCst), 0);

    drop(channel);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(dropped.load(Ordering::SeqCst), 1);
}

#[test]
fn teardown_of_unknown_id_is_false() {
    let mut channel = OutlineChannel::new(
        Arc::new(RecordingOutline::default()),
        EventBus::new(),
        None,
    );
    assert!(!channel.teardown(Uuid::new_v4()));
    assert_eq!(channel.abort_all(), 0);
}
