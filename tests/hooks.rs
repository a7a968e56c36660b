mod common;

use async_trait::async_trait;
use common::{FakeTransport, Reply};
use std::sync::{Arc, Mutex};
use tollgate::{
    ClientBuilder, ClientConfig, HookError, RequestConfig, RequestHook, Response, ResponseHook,
};

#[derive(Debug, Clone, Default)]
struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait]
impl RequestHook for Journal {
    fn name(&self) -> &'static str {
        "journal"
    }

    async fn on_request(&self, config: RequestConfig) -> Result<RequestConfig, HookError> {
        let signal = if config.signal().is_some() { "signal" } else { "none" };
        self.0.lock().unwrap().push(format!("request {} {}", config.url, signal));
        Ok(config)
    }
}

#[async_trait]
impl ResponseHook for Journal {
    fn name(&self) -> &'static str {
        "journal"
    }

    async fn on_response(&self, response: Response) -> Result<Response, HookError> {
        self.0.lock().unwrap().push(format!("response {}", response.status()));
        Ok(response)
    }
}

#[derive(Debug)]
struct DenyWrites;

#[async_trait]
impl RequestHook for DenyWrites {
    fn name(&self) -> &'static str {
        "deny_writes"
    }

    async fn on_request(&self, config: RequestConfig) -> Result<RequestConfig, HookError> {
        if config.method == tollgate::Method::Get {
            Ok(config)
        } else {
            Err(HookError::new("deny_writes", "read-only client"))
        }
    }
}

#[tokio::test]
async fn defaults_are_applied_before_dispatch() {
    let transport = FakeTransport::always(Reply::Status(200));
    let config = ClientConfig::default()
        .base_url("http://localhost:3000")
        .default_header("X-Custom-Header", "foobar");
    let client = ClientBuilder::new().config(config).build(transport.clone()).unwrap();

    client.request(RequestConfig::get("/users")).await.unwrap();
    client
        .request(RequestConfig::get("users").header("x-custom-header", "override"))
        .await
        .unwrap();

    let seen = transport.requests();
    assert_eq!(seen[0].url, "http://localhost:3000/users");
    assert_eq!(seen[0].header_value("X-Custom-Header"), Some("foobar"));
    assert_eq!(seen[1].url, "http://localhost:3000/users");
    assert_eq!(seen[1].header_value("X-Custom-Header"), Some("override"));
    assert_eq!(seen[1].headers.len(), 1);
}

#[tokio::test]
async fn user_hooks_run_after_built_ins() {
    let journal = Journal::default();
    let transport = FakeTransport::always(Reply::Status(204));
    let client = ClientBuilder::new()
        .request_hook(journal.clone())
        .response_hook(journal.clone())
        .build(transport)
        .unwrap();

    client.request(RequestConfig::get("/a").cancellation_key("a-1")).await.unwrap();

    // The cancellation hook has already bound the signal and the release hook has already
    // removed the entry by the time user hooks see the request.
    assert_eq!(journal.entries(), vec!["request /a signal", "response 204"]);
    assert!(!client.registry().contains("a-1"));
}

#[tokio::test]
async fn hook_failure_is_returned_without_dispatch_or_retry() {
    let transport = FakeTransport::always(Reply::Status(200));
    let client = ClientBuilder::new().request_hook(DenyWrites).build(transport.clone()).unwrap();

    let err = client.request(RequestConfig::post("/orders")).await.unwrap_err();

    assert!(err.is_hook());
    assert_eq!(err.attempt_count(), 0);
    assert_eq!(transport.calls(), 0);
    assert!(err.to_string().contains("read-only client"));
}
