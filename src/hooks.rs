//! Ordered hook chains run around every transport attempt.
//!
//! Outbound, each attempt passes through `InitAttemptState → ApplyDefaults →
//! AttachCancellation` followed by any user hooks. Inbound, a successful response passes
//! through `ReleaseCancellation` followed by any user hooks. Each hook receives the previous
//! hook's output; the first error stops the chain and is returned to the caller unretried.

use crate::attempt::AttemptState;
use crate::cancel::CancellationRegistry;
use crate::error::HookError;
use crate::request::{RequestConfig, Response};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Stage run before an attempt is dispatched.
#[async_trait]
pub trait RequestHook: Send + Sync + std::fmt::Debug {
    /// Short name used in logs and [`HookError`]s.
    fn name(&self) -> &'static str;
    async fn on_request(&self, config: RequestConfig) -> Result<RequestConfig, HookError>;
}

/// Stage run after a successful response arrives.
#[async_trait]
pub trait ResponseHook: Send + Sync + std::fmt::Debug {
    /// Short name used in logs and [`HookError`]s.
    fn name(&self) -> &'static str;
    async fn on_response(&self, response: Response) -> Result<Response, HookError>;
}

/// Ordered request and response hooks.
#[derive(Clone, Debug, Default)]
pub struct HookChain {
    request: Vec<Arc<dyn RequestHook>>,
    response: Vec<Arc<dyn ResponseHook>>,
}

impl HookChain {
    /// Empty chain. See [`HookChain::standard`] for the built-in stages.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in stages wired to `registry`.
    pub fn standard<R>(
        registry: Arc<R>,
        base_url: Option<String>,
        headers: Vec<(String, String)>,
    ) -> Self
    where
        R: CancellationRegistry + ?Sized + 'static,
    {
        Self::new()
            .request_hook(InitAttemptState)
            .request_hook(ApplyDefaults::new(base_url, headers))
            .request_hook(AttachCancellation::new(registry.clone()))
            .response_hook(ReleaseCancellation::new(registry))
    }

    /// Append a request hook; it runs after those already present.
    pub fn request_hook<H: RequestHook + 'static>(mut self, hook: H) -> Self {
        self.request.push(Arc::new(hook));
        self
    }

    /// Append a response hook; it runs after those already present.
    pub fn response_hook<H: ResponseHook + 'static>(mut self, hook: H) -> Self {
        self.response.push(Arc::new(hook));
        self
    }

    /// Append every hook of `other` after the hooks already present.
    pub fn extend(mut self, other: HookChain) -> Self {
        self.request.extend(other.request);
        self.response.extend(other.response);
        self
    }

    pub fn request_hook_names(&self) -> Vec<&'static str> {
        self.request.iter().map(|h| h.name()).collect()
    }

    pub fn response_hook_names(&self) -> Vec<&'static str> {
        self.response.iter().map(|h| h.name()).collect()
    }

    pub async fn run_request(&self, mut config: RequestConfig) -> Result<RequestConfig, HookError> {
        for hook in &self.request {
            debug!(target: "tollgate::hooks", hook = hook.name(), url = %config.url, "request hook");
            config = hook.on_request(config).await?;
        }
        Ok(config)
    }

    pub async fn run_response(&self, mut response: Response) -> Result<Response, HookError> {
        for hook in &self.response {
            debug!(target: "tollgate::hooks", hook = hook.name(), status = response.status(), "response hook");
            response = hook.on_response(response).await?;
        }
        Ok(response)
    }
}

/// Attaches a default [`AttemptState`] when the request carries none.
#[derive(Debug, Clone, Copy, Default)]
pub struct InitAttemptState;

#[async_trait]
impl RequestHook for InitAttemptState {
    fn name(&self) -> &'static str {
        "init_attempt_state"
    }

    async fn on_request(&self, mut config: RequestConfig) -> Result<RequestConfig, HookError> {
        if config.options.is_none() {
            config.options = Some(AttemptState::default());
        }
        Ok(config)
    }
}

/// Resolves relative URLs against a base URL and fills in default headers.
#[derive(Debug, Clone, Default)]
pub struct ApplyDefaults {
    base_url: Option<String>,
    headers: Vec<(String, String)>,
}

impl ApplyDefaults {
    pub fn new(base_url: Option<String>, headers: Vec<(String, String)>) -> Self {
        Self { base_url, headers }
    }

    fn resolve(&self, url: &str) -> String {
        match &self.base_url {
            Some(base) if !is_absolute(url) => {
                let base = base.trim_end_matches('/');
                let path = url.trim_start_matches('/');
                if path.is_empty() {
                    base.to_string()
                } else {
                    format!("{base}/{path}")
                }
            }
            _ => url.to_string(),
        }
    }
}

fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[async_trait]
impl RequestHook for ApplyDefaults {
    fn name(&self) -> &'static str {
        "apply_defaults"
    }

    async fn on_request(&self, mut config: RequestConfig) -> Result<RequestConfig, HookError> {
        config.url = self.resolve(&config.url);
        for (name, value) in &self.headers {
            if config.header_value(name).is_none() {
                config.headers.push((name.clone(), value.clone()));
            }
        }
        Ok(config)
    }
}

/// Binds requests that carry a cancellation key to a registry token.
#[derive(Debug)]
pub struct AttachCancellation<R: ?Sized> {
    registry: Arc<R>,
}

impl<R: ?Sized> AttachCancellation<R> {
    pub fn new(registry: Arc<R>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl<R> RequestHook for AttachCancellation<R>
where
    R: CancellationRegistry + ?Sized + 'static,
{
    fn name(&self) -> &'static str {
        "attach_cancellation"
    }

    async fn on_request(&self, mut config: RequestConfig) -> Result<RequestConfig, HookError> {
        // A fired signal stays bound even if its entry was evicted, so a route-wide cancel
        // cannot be undone by re-registering the key.
        if config.signal().is_some_and(|t| t.is_cancelled()) {
            return Ok(config);
        }
        let handle = config.cancel_key().map(|key| self.registry.add(Some(key)));
        if let Some(handle) = handle {
            config.set_signal(handle.token().clone());
        }
        Ok(config)
    }
}

/// Removes the registry entry of a request that completed successfully.
#[derive(Debug)]
pub struct ReleaseCancellation<R: ?Sized> {
    registry: Arc<R>,
}

impl<R: ?Sized> ReleaseCancellation<R> {
    pub fn new(registry: Arc<R>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl<R> ResponseHook for ReleaseCancellation<R>
where
    R: CancellationRegistry + ?Sized + 'static,
{
    fn name(&self) -> &'static str {
        "release_cancellation"
    }

    async fn on_response(&self, response: Response) -> Result<Response, HookError> {
        if let Some(key) = response.config().cancel_key() {
            self.registry.delete(key);
        }
        Ok(response)
    }
}
