mod common;

use common::{FakeTransport, Reply};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tollgate::telemetry::{AuthEvent, MemorySink, PipelineEvent};
use tollgate::{ClientBuilder, ManualClock, RequestConfig};

fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
    let fired = Arc::new(AtomicUsize::new(0));
    let handle = fired.clone();
    (fired, move || {
        handle.fetch_add(1, Ordering::SeqCst);
    })
}

#[tokio::test]
async fn burst_of_401s_triggers_reauth_once_per_window() {
    let clock = ManualClock::new();
    let (fired, on_reauth) = counter();
    let client = ClientBuilder::new()
        .clock(clock.clone())
        .on_reauth(on_reauth)
        .build(FakeTransport::always(Reply::Status(401)))
        .unwrap();

    for _ in 0..2 {
        let err = client.request(RequestConfig::get("/api401").retry(false)).await.unwrap_err();
        assert!(err.is_unauthorized());
    }
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    clock.advance(Duration::from_secs(3));
    client.request(RequestConfig::get("/api401").retry(false)).await.unwrap_err();
    assert_eq!(fired.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn retried_401s_count_against_the_same_window() {
    let clock = ManualClock::new();
    let (fired, on_reauth) = counter();
    let sink = MemorySink::new();
    let transport = FakeTransport::always(Reply::Status(401));
    let client = ClientBuilder::new()
        .clock(clock)
        .on_reauth(on_reauth)
        .sink(sink.clone())
        .build(transport.clone())
        .unwrap();

    client.request(RequestConfig::get("/api401")).await.unwrap_err();

    assert_eq!(transport.calls(), 4);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    let suppressed = sink
        .events()
        .into_iter()
        .filter(|e| *e == PipelineEvent::Auth(AuthEvent::Suppressed))
        .count();
    assert_eq!(suppressed, 3);
}

#[tokio::test]
async fn other_statuses_leave_the_window_idle() {
    let (fired, on_reauth) = counter();
    let client = ClientBuilder::new()
        .clock(ManualClock::new())
        .on_reauth(on_reauth)
        .build(FakeTransport::always(Reply::Status(403)))
        .unwrap();

    client.request(RequestConfig::get("/forbidden").retry(false)).await.unwrap_err();

    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert!(!client.debouncer().is_active());
}
