//! Ready-to-use client assembled from the pipeline pieces.
//!
//! [`Client`] owns a cancellation registry, an auth-expiry debouncer and an
//! [`InterceptService`] wrapping the caller's transport. Callers create cancellation tokens
//! through the client, attach their keys to requests, and cancel single requests or whole
//! routes while they are in flight.

use crate::auth::{AuthExpiryDebouncer, AuthExpiryDebouncerBuilder};
use crate::cancel::{CancellationHandle, CancellationRegistry, InMemoryCancellationRegistry};
use crate::clock::Clock;
use crate::config::ClientConfig;
use crate::error::{BoxError, ConfigError, RequestError};
use crate::hooks::{HookChain, RequestHook, ResponseHook};
use crate::pipeline::{InterceptLayer, InterceptService};
use crate::request::{HttpResponse, RequestConfig, Response};
use crate::retry::RetryCoordinator;
use crate::telemetry::{NullSink, TelemetrySink};
use std::sync::Arc;
use tower::ServiceExt;
use tower_layer::Layer;
use tower_service::Service;

/// HTTP client with route-keyed cancellation, retry and auth-expiry debouncing.
#[derive(Clone, Debug)]
pub struct Client<T, Sink = NullSink> {
    service: InterceptService<T, Sink>,
    registry: Arc<dyn CancellationRegistry>,
    debouncer: AuthExpiryDebouncer,
    config: ClientConfig,
}

impl<T> Client<T, NullSink> {
    /// Client with default configuration over `transport`.
    pub fn new(transport: T) -> Self {
        ClientBuilder::new().assemble(transport)
    }
}

impl<T, Sink> Client<T, Sink>
where
    T: Service<RequestConfig, Response = HttpResponse> + Clone + Send + 'static,
    T::Error: Into<BoxError>,
    T::Future: Send + 'static,
    Sink: TelemetrySink,
    Sink::Future: Send + 'static,
{
    /// Send `config` through the pipeline.
    pub async fn request(&self, config: RequestConfig) -> Result<Response, RequestError> {
        self.service.clone().oneshot(config).await
    }
}

impl<T, Sink> Client<T, Sink> {
    /// Token for `key`, reusing the existing entry if one is registered.
    pub fn create_cancellation_token(&self, key: Option<&str>) -> CancellationHandle {
        self.registry.add(key)
    }

    /// Fresh token under `{route}-{uuid}`.
    pub fn create_route_token(&self, route: &str) -> CancellationHandle {
        self.registry.add_for_route(route)
    }

    /// Abort the request bound to `key`. The entry stays registered.
    pub fn cancel(&self, key: &str) -> bool {
        self.registry.cancel(key)
    }

    /// Abort and forget every request registered under `route`.
    pub fn cancel_by_route(&self, route: &str) -> Vec<String> {
        self.registry.cancel_by_route(route)
    }

    /// Forget `key` without aborting it.
    pub fn release(&self, key: &str) -> bool {
        self.registry.delete(key)
    }

    pub fn registry(&self) -> &Arc<dyn CancellationRegistry> {
        &self.registry
    }

    pub fn debouncer(&self) -> &AuthExpiryDebouncer {
        &self.debouncer
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The underlying tower service, for composing with other layers.
    pub fn service(&self) -> &InterceptService<T, Sink> {
        &self.service
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder<Sink = NullSink> {
    config: ClientConfig,
    registry: Arc<dyn CancellationRegistry>,
    auth: AuthExpiryDebouncerBuilder,
    debouncer: Option<AuthExpiryDebouncer>,
    hooks: HookChain,
    sink: Sink,
}

impl ClientBuilder<NullSink> {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            registry: Arc::new(InMemoryCancellationRegistry::new()),
            auth: AuthExpiryDebouncerBuilder::new(),
            debouncer: None,
            hooks: HookChain::new(),
            sink: NullSink,
        }
    }
}

impl Default for ClientBuilder<NullSink> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Sink> ClientBuilder<Sink> {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a registry, e.g. between several clients.
    pub fn registry<R: CancellationRegistry + 'static>(mut self, registry: R) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Clock driving the auth-expiry window.
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.auth = self.auth.clock(clock);
        self
    }

    /// Re-authentication action, run at most once per window.
    pub fn on_reauth<F>(mut self, trigger: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.auth = self.auth.on_reauth(trigger);
        self
    }

    /// Use an existing debouncer; `clock`, `on_reauth` and the configured window are then
    /// ignored.
    pub fn debouncer(mut self, debouncer: AuthExpiryDebouncer) -> Self {
        self.debouncer = Some(debouncer);
        self
    }

    /// User request hook, run after the built-in ones.
    pub fn request_hook<H: RequestHook + 'static>(mut self, hook: H) -> Self {
        self.hooks = self.hooks.request_hook(hook);
        self
    }

    /// User response hook, run after the built-in ones.
    pub fn response_hook<H: ResponseHook + 'static>(mut self, hook: H) -> Self {
        self.hooks = self.hooks.response_hook(hook);
        self
    }

    pub fn sink<NewSink: TelemetrySink>(self, sink: NewSink) -> ClientBuilder<NewSink> {
        ClientBuilder {
            config: self.config,
            registry: self.registry,
            auth: self.auth,
            debouncer: self.debouncer,
            hooks: self.hooks,
            sink,
        }
    }

    /// Validate the configuration and wrap `transport`.
    pub fn build<T>(self, transport: T) -> Result<Client<T, Sink>, ConfigError>
    where
        Sink: TelemetrySink + Clone,
    {
        self.config.validate()?;
        Ok(self.assemble(transport))
    }

    fn assemble<T>(self, transport: T) -> Client<T, Sink>
    where
        Sink: TelemetrySink + Clone,
    {
        let config = self.config;
        let debouncer = match self.debouncer {
            Some(debouncer) => debouncer,
            None => self.auth.window(config.auth_window_duration()).build(),
        };
        let hooks = HookChain::standard(
            self.registry.clone(),
            config.base_url.clone(),
            config.default_headers.clone(),
        )
        .extend(self.hooks);

        let service = InterceptLayer::new(
            hooks,
            debouncer.clone(),
            RetryCoordinator::new(config.max_retries),
        )
        .with_timeout(config.timeout_duration())
        .with_sink(self.sink)
        .layer(transport);

        Client { service, registry: self.registry, debouncer, config }
    }
}
