#![allow(dead_code)]

use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tollgate::{HttpResponse, RequestConfig, TransportError};
use tower::Service;

/// What the fake transport does with one call.
#[derive(Clone, Debug)]
pub enum Reply {
    Status(u16),
    Fail(&'static str),
    /// Never resolves; only cancellation or a timeout ends the attempt.
    Hang,
}

#[derive(Debug, Default)]
struct Inner {
    script: Mutex<VecDeque<Reply>>,
    fallback: Mutex<Option<Reply>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<RequestConfig>>,
}

/// In-process transport answering from a script, recording every request it sees.
#[derive(Clone, Debug, Default)]
pub struct FakeTransport {
    inner: Arc<Inner>,
}

impl FakeTransport {
    pub fn always(reply: Reply) -> Self {
        Self::script(Vec::new(), reply)
    }

    /// Answer with `replies` in order, then with `then` forever.
    pub fn script(replies: Vec<Reply>, then: Reply) -> Self {
        let transport = Self::default();
        *transport.inner.script.lock().unwrap() = replies.into();
        *transport.inner.fallback.lock().unwrap() = Some(then);
        transport
    }

    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RequestConfig> {
        self.inner.seen.lock().unwrap().clone()
    }

    /// Yield until at least `n` calls have reached the transport.
    pub async fn wait_for_calls(&self, n: usize) {
        while self.calls() < n {
            tokio::task::yield_now().await;
        }
    }
}

impl Service<RequestConfig> for FakeTransport {
    type Response = HttpResponse;
    type Error = TransportError;
    type Future = BoxFuture<'static, Result<HttpResponse, TransportError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RequestConfig) -> Self::Future {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.seen.lock().unwrap().push(req);
        let reply = self
            .inner
            .script
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.inner.fallback.lock().unwrap().clone())
            .unwrap_or(Reply::Status(200));

        Box::pin(async move {
            match reply {
                Reply::Status(status) => Ok(HttpResponse::new(status)),
                Reply::Fail(msg) => Err(TransportError::new(msg)),
                Reply::Hang => futures::future::pending().await,
            }
        })
    }
}
