//! Request and response types exchanged with the transport.

use crate::attempt::AttemptState;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use tokio_util::sync::CancellationToken;

static DEFAULT_ATTEMPT: AttemptState =
    AttemptState { retry_enabled: true, attempt_count: 0, cancellation_key: None };

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request as seen by hooks and the transport.
///
/// The same value is threaded through every attempt of a logical request. `options` holds the
/// caller's private options and the retry bookkeeping; `signal` is attached by the pipeline when
/// the request is bound to a cancellation key.
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub options: Option<AttemptState>,
    signal: Option<CancellationToken>,
}

impl RequestConfig {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self { method, url: url.into(), ..Self::default() }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::Put, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::Patch, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(Method::Head, url)
    }

    /// Append a header. Existing headers with the same name are kept.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body and set `content-type` if absent.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_vec(value)?);
        if self.header_value("content-type").is_none() {
            self.headers.push(("content-type".into(), "application/json".into()));
        }
        Ok(self)
    }

    /// Enable or disable retry for this logical request (enabled by default).
    pub fn retry(mut self, enabled: bool) -> Self {
        self.attempt_mut().retry_enabled = enabled;
        self
    }

    /// Bind this request to a cancellation token registered under `key`.
    pub fn cancellation_key(mut self, key: impl Into<String>) -> Self {
        self.attempt_mut().cancellation_key = Some(key.into());
        self
    }

    /// Replace the private options wholesale.
    pub fn options(mut self, options: AttemptState) -> Self {
        self.options = Some(options);
        self
    }

    /// Attempt state, or the defaults when none has been attached yet.
    pub fn attempt(&self) -> &AttemptState {
        self.options.as_ref().unwrap_or(&DEFAULT_ATTEMPT)
    }

    /// Attempt state, attaching a default one first if missing.
    pub fn attempt_mut(&mut self) -> &mut AttemptState {
        self.options.get_or_insert_with(AttemptState::default)
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt().attempt_count
    }

    pub fn cancel_key(&self) -> Option<&str> {
        self.attempt().cancellation_key.as_deref()
    }

    /// Cancellation signal bound by the pipeline, if any. Transports may consult it to abort
    /// work early; the pipeline enforces cancellation regardless.
    pub fn signal(&self) -> Option<&CancellationToken> {
        self.signal.as_ref()
    }

    pub(crate) fn set_signal(&mut self, token: CancellationToken) {
        self.signal = Some(token);
    }

    /// First header value matching `name`, compared case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response produced by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self { status, ..Self::default() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Successful pipeline output: the transport response plus the request that produced it.
#[derive(Debug, Clone)]
pub struct Response {
    inner: HttpResponse,
    config: RequestConfig,
}

impl Response {
    pub fn new(inner: HttpResponse, config: RequestConfig) -> Self {
        Self { inner, config }
    }

    pub fn status(&self) -> u16 {
        self.inner.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.inner.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &[u8] {
        &self.inner.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.inner.body)
    }

    /// The request as it was on the attempt that succeeded.
    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Retries performed before this response arrived.
    pub fn attempt_count(&self) -> u32 {
        self.config.attempt_count()
    }

    pub fn into_parts(self) -> (HttpResponse, RequestConfig) {
        (self.inner, self.config)
    }
}
