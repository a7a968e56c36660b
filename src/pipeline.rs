//! Tower layer composing hooks, cancellation, auth-expiry debouncing and retry.
//!
//! Per logical request the service runs, strictly in order:
//!
//! 1. the request hook chain (attempt state, defaults, cancellation token);
//! 2. the transport call, raced against the request's cancellation token and the per-attempt
//!    timeout;
//! 3. on a 2xx response, the response hook chain (token release), then returns;
//! 4. on failure, the auth-expiry debouncer observes the error, then the retry coordinator
//!    decides. A retry increments the attempt count and goes back to step 1 with the same
//!    request; otherwise the failure is returned unchanged.
//!
//! The loop is iterative, so the number of retries never grows the call stack.
//!
//! Invariants:
//! - A canceled attempt is never retried.
//! - The caller sees exactly one `Ok` or one `Err` per logical request.
//! - Cancellation tokens are released only on success; failures leave the entry for the caller
//!   (or a route-wide cancel) to clean up.

use crate::auth::{AuthExpiryDebouncer, AuthObservation};
use crate::error::{BoxError, FailureKind, RequestError, TransportError};
use crate::hooks::HookChain;
use crate::request::{HttpResponse, RequestConfig, Response};
use crate::retry::{RetryCoordinator, RetryDecision};
use crate::telemetry::{
    emit_best_effort, AuthEvent, CancellationEvent, NullSink, PipelineEvent, RequestOutcome,
    RetryEvent, TelemetrySink,
};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tower::ServiceExt;
use tower_layer::Layer;
use tower_service::Service;
use tracing::{debug, warn};

struct Shared {
    hooks: HookChain,
    debouncer: AuthExpiryDebouncer,
    coordinator: RetryCoordinator,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("hooks", &self.hooks.request_hook_names())
            .field("debouncer", &self.debouncer)
            .field("coordinator", &self.coordinator)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Layer wrapping a transport service with the request pipeline.
#[derive(Clone, Debug)]
pub struct InterceptLayer<Sink = NullSink> {
    shared: Arc<Shared>,
    sink: Sink,
}

impl InterceptLayer<NullSink> {
    pub fn new(
        hooks: HookChain,
        debouncer: AuthExpiryDebouncer,
        coordinator: RetryCoordinator,
    ) -> Self {
        Self { shared: Arc::new(Shared { hooks, debouncer, coordinator, timeout: None }), sink: NullSink }
    }
}

impl<Sink> InterceptLayer<Sink> {
    /// Bound each transport attempt by `timeout`; `None` lets attempts run unbounded.
    pub fn with_timeout(self, timeout: Option<Duration>) -> Self {
        let shared = Shared {
            hooks: self.shared.hooks.clone(),
            debouncer: self.shared.debouncer.clone(),
            coordinator: self.shared.coordinator,
            timeout,
        };
        Self { shared: Arc::new(shared), sink: self.sink }
    }

    /// Send pipeline events to `sink`.
    pub fn with_sink<NewSink: TelemetrySink>(self, sink: NewSink) -> InterceptLayer<NewSink> {
        InterceptLayer { shared: self.shared, sink }
    }

    pub fn debouncer(&self) -> &AuthExpiryDebouncer {
        &self.shared.debouncer
    }

    pub fn coordinator(&self) -> RetryCoordinator {
        self.shared.coordinator
    }
}

impl<S, Sink> Layer<S> for InterceptLayer<Sink>
where
    Sink: Clone,
{
    type Service = InterceptService<S, Sink>;

    fn layer(&self, inner: S) -> Self::Service {
        InterceptService { inner, shared: self.shared.clone(), sink: self.sink.clone() }
    }
}

/// Service produced by [`InterceptLayer`].
#[derive(Clone, Debug)]
pub struct InterceptService<S, Sink = NullSink> {
    inner: S,
    shared: Arc<Shared>,
    sink: Sink,
}

impl<S, Sink> Service<RequestConfig> for InterceptService<S, Sink>
where
    S: Service<RequestConfig, Response = HttpResponse> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
    Sink: TelemetrySink,
    Sink::Future: Send + 'static,
{
    type Response = Response;
    type Error = RequestError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Transport readiness is awaited per attempt inside the call future.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, config: RequestConfig) -> Self::Future {
        let shared = self.shared.clone();
        let inner = self.inner.clone();
        let sink = self.sink.clone();
        Box::pin(run(shared, inner, sink, config))
    }
}

async fn run<S, Sink>(
    shared: Arc<Shared>,
    mut inner: S,
    sink: Sink,
    mut config: RequestConfig,
) -> Result<Response, RequestError>
where
    S: Service<RequestConfig, Response = HttpResponse> + Send,
    S::Error: Into<BoxError>,
    S::Future: Send,
    Sink: TelemetrySink,
    Sink::Future: Send + 'static,
{
    let started = Instant::now();

    loop {
        let key = config.cancel_key().map(str::to_owned);
        if let Some(key) = &key {
            emit_best_effort(
                sink.clone(),
                PipelineEvent::Cancellation(CancellationEvent::Attached { key: key.clone() }),
            )
            .await;
        }

        let failure = match attempt(&shared, &mut inner, config).await {
            Ok(response) => {
                if let Some(key) = key {
                    emit_best_effort(
                        sink.clone(),
                        PipelineEvent::Cancellation(CancellationEvent::Released { key }),
                    )
                    .await;
                }
                let attempts = response.config().attempt().sends();
                debug!(target: "tollgate::pipeline", attempts, status = response.status(), "request succeeded");
                emit_best_effort(
                    sink.clone(),
                    PipelineEvent::Request(RequestOutcome::Success {
                        attempts,
                        duration: started.elapsed(),
                    }),
                )
                .await;
                return Ok(response);
            }
            Err(failure) => failure,
        };

        if failure.is_canceled() {
            emit_best_effort(
                sink.clone(),
                PipelineEvent::Cancellation(CancellationEvent::Aborted { key }),
            )
            .await;
        }

        match shared.debouncer.observe(&failure) {
            AuthObservation::Triggered => {
                emit_best_effort(sink.clone(), PipelineEvent::Auth(AuthEvent::ReauthTriggered))
                    .await
            }
            AuthObservation::Suppressed => {
                emit_best_effort(sink.clone(), PipelineEvent::Auth(AuthEvent::Suppressed)).await
            }
            AuthObservation::Ignored => {}
        }

        match shared.coordinator.decide(&failure) {
            RetryDecision::Retry { next_attempt } => {
                warn!(
                    target: "tollgate::pipeline",
                    attempt = next_attempt,
                    max_retries = shared.coordinator.max_retries(),
                    error = %failure,
                    "attempt failed; retrying"
                );
                emit_best_effort(
                    sink.clone(),
                    PipelineEvent::Retry(RetryEvent::Attempt { attempt: next_attempt }),
                )
                .await;
                config = failure.into_config();
                config.attempt_mut().record_retry();
            }
            RetryDecision::Propagate(reason) => {
                let attempts = failure.config().attempt().sends();
                debug!(
                    target: "tollgate::pipeline",
                    attempts,
                    %reason,
                    error = %failure,
                    "request failed"
                );
                emit_best_effort(
                    sink.clone(),
                    PipelineEvent::Retry(RetryEvent::GaveUp { attempts, reason }),
                )
                .await;
                emit_best_effort(
                    sink.clone(),
                    PipelineEvent::Request(RequestOutcome::Failure {
                        attempts,
                        duration: started.elapsed(),
                    }),
                )
                .await;
                return Err(failure);
            }
        }
    }
}

/// One pass through hooks and transport.
async fn attempt<S>(
    shared: &Shared,
    inner: &mut S,
    config: RequestConfig,
) -> Result<Response, RequestError>
where
    S: Service<RequestConfig, Response = HttpResponse> + Send,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    let fallback = config.clone();
    let prepared = match shared.hooks.run_request(config).await {
        Ok(prepared) => prepared,
        Err(err) => return Err(RequestError::new(FailureKind::Hook(err), fallback)),
    };

    let outcome = dispatch(shared.timeout, inner, &prepared).await;

    match outcome {
        Ok(http) if http.is_success() => {
            let fallback = prepared.clone();
            shared
                .hooks
                .run_response(Response::new(http, prepared))
                .await
                .map_err(|err| RequestError::new(FailureKind::Hook(err), fallback))
        }
        Ok(http) => Err(RequestError::new(
            FailureKind::Status { status: http.status, body: http.body },
            prepared,
        )),
        Err(kind) => Err(RequestError::new(kind, prepared)),
    }
}

async fn dispatch<S>(
    timeout: Option<Duration>,
    inner: &mut S,
    request: &RequestConfig,
) -> Result<HttpResponse, FailureKind>
where
    S: Service<RequestConfig, Response = HttpResponse> + Send,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    let signal = request.signal().cloned();

    let send = async {
        let ready = match inner.ready().await {
            Ok(ready) => ready,
            Err(e) => return Err(FailureKind::from(TransportError::new(e))),
        };
        ready.call(request.clone()).await.map_err(|e| FailureKind::from(TransportError::new(e)))
    };

    let bounded = async {
        match timeout {
            Some(limit) => {
                let start = Instant::now();
                match tokio::time::timeout(limit, send).await {
                    Ok(result) => result,
                    Err(_) => Err(FailureKind::Timeout { elapsed: start.elapsed(), timeout: limit }),
                }
            }
            None => send.await,
        }
    };

    let outcome = match &signal {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(FailureKind::Canceled),
                result = bounded => result,
            }
        }
        None => bounded.await,
    };

    // Once the signal has fired, a failed outcome is a cancellation whatever the transport
    // reported (its own abort error, or a status that raced the cancel).
    let aborted = signal.as_ref().is_some_and(|t| t.is_cancelled());
    match outcome {
        Ok(http) if aborted && !http.is_success() => Err(FailureKind::Canceled),
        Err(_) if aborted => Err(FailureKind::Canceled),
        other => other,
    }
}
