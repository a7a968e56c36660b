mod common;

use common::{FakeTransport, Reply};
use std::time::Duration;
use tollgate::telemetry::{MemorySink, PipelineEvent, RequestOutcome, RetryEvent};
use tollgate::{
    Client, ClientBuilder, ClientConfig, FailureKind, PropagateReason, RequestConfig,
};

#[tokio::test]
async fn retry_disabled_sends_once() {
    let transport = FakeTransport::always(Reply::Status(503));
    let client = Client::new(transport.clone());

    let err = client.request(RequestConfig::get("/once").retry(false)).await.unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn always_failing_request_is_sent_four_times() {
    let transport = FakeTransport::always(Reply::Fail("connection reset"));
    let client = Client::new(transport.clone());

    let err = client.request(RequestConfig::get("/down")).await.unwrap_err();

    assert_eq!(transport.calls(), 4);
    assert_eq!(err.attempt_count(), 3);
    assert!(matches!(err.kind(), FailureKind::Transport(_)));
    assert!(err.to_string().contains("connection reset"));
}

#[tokio::test]
async fn final_failure_is_the_last_attempts() {
    let transport = FakeTransport::script(
        vec![Reply::Fail("reset"), Reply::Status(502), Reply::Status(503)],
        Reply::Status(504),
    );
    let client = Client::new(transport.clone());

    let err = client.request(RequestConfig::get("/gateway")).await.unwrap_err();

    assert_eq!(err.status(), Some(504));
    assert_eq!(transport.calls(), 4);
}

#[tokio::test]
async fn recovers_within_budget() {
    let transport =
        FakeTransport::script(vec![Reply::Status(500), Reply::Status(500)], Reply::Status(200));
    let client = Client::new(transport.clone());

    let response = client.request(RequestConfig::get("/eventually")).await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.attempt_count(), 2);
    let counts: Vec<u32> = transport.requests().iter().map(|r| r.attempt_count()).collect();
    assert_eq!(counts, vec![0, 1, 2]);
}

#[tokio::test(start_paused = true)]
async fn attempt_timeout_is_retried() {
    let transport = FakeTransport::always(Reply::Hang);
    let config = ClientConfig::default().timeout(Some(Duration::from_millis(250)));
    let client = ClientBuilder::new().config(config).build(transport.clone()).unwrap();

    let err = client.request(RequestConfig::get("/slow")).await.unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(transport.calls(), 4);
}

#[tokio::test]
async fn zero_max_retries_disables_retry() {
    let transport = FakeTransport::always(Reply::Status(500));
    let client = ClientBuilder::new()
        .config(ClientConfig::default().max_retries(0))
        .build(transport.clone())
        .unwrap();

    client.request(RequestConfig::get("/a")).await.unwrap_err();
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn telemetry_reports_each_retry_and_the_outcome() {
    let sink = MemorySink::new();
    let transport = FakeTransport::always(Reply::Status(500));
    let client = ClientBuilder::new().sink(sink.clone()).build(transport).unwrap();

    client.request(RequestConfig::get("/a")).await.unwrap_err();

    let events = sink.events();
    let attempts: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Retry(RetryEvent::Attempt { attempt }) => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(attempts, vec![1, 2, 3]);
    assert!(events.contains(&PipelineEvent::Retry(RetryEvent::GaveUp {
        attempts: 4,
        reason: PropagateReason::Exhausted,
    })));
    assert!(matches!(
        events.last(),
        Some(PipelineEvent::Request(RequestOutcome::Failure { attempts: 4, .. }))
    ));
}
