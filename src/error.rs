//! Error types for the request pipeline.
use crate::request::RequestConfig;
use std::time::Duration;

/// Boxed error produced by a transport.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Status code that marks an expired session.
pub const UNAUTHORIZED: u16 = 401;

/// Failure reported by a transport before any response arrived.
#[derive(thiserror::Error, Debug)]
#[error("transport error: {source}")]
pub struct TransportError {
    #[source]
    source: BoxError,
}

impl TransportError {
    pub fn new<E>(source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self { source: source.into() }
    }

    /// Borrow the underlying transport failure.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.source
    }
}

/// A hook refused to let the request continue.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("hook `{hook}` failed: {reason}")]
pub struct HookError {
    /// Name of the hook that failed.
    pub hook: &'static str,
    /// Human-readable reason.
    pub reason: String,
}

impl HookError {
    pub fn new(hook: &'static str, reason: impl Into<String>) -> Self {
        Self { hook, reason: reason.into() }
    }
}

/// Why a single attempt failed.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum FailureKind {
    /// The request's cancellation token was aborted. Never retried.
    #[error("request was canceled")]
    Canceled,
    /// The transport answered with a non-2xx status.
    #[error("request failed with status {status}")]
    Status {
        /// Response status code.
        status: u16,
        /// Response body, kept for diagnostics.
        body: Vec<u8>,
    },
    /// The attempt exceeded the per-attempt timeout.
    #[error("request timed out after {elapsed:?} (limit: {timeout:?})")]
    Timeout {
        /// Time spent before giving up.
        elapsed: Duration,
        /// Configured limit.
        timeout: Duration,
    },
    /// The transport failed without producing a response.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A request or response hook failed. Not retried.
    #[error(transparent)]
    Hook(#[from] HookError),
}

/// Final (or intermediate) failure of a logical request.
///
/// Carries the request configuration so the pipeline can rebuild the next attempt from it, and
/// so callers can inspect how many retries were spent.
#[derive(thiserror::Error, Debug)]
#[error("{method} {url}: {kind}", method = .config.method, url = .config.url)]
pub struct RequestError {
    #[source]
    kind: FailureKind,
    config: RequestConfig,
}

impl RequestError {
    pub fn new(kind: FailureKind, config: RequestConfig) -> Self {
        Self { kind, config }
    }

    pub fn kind(&self) -> &FailureKind {
        &self.kind
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Take the request configuration back, e.g. to re-dispatch it.
    pub fn into_config(self) -> RequestConfig {
        self.config
    }

    pub fn into_parts(self) -> (FailureKind, RequestConfig) {
        (self.kind, self.config)
    }

    /// Response status, when the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match &self.kind {
            FailureKind::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Response body, when the failure came from a response.
    pub fn response_body(&self) -> Option<&[u8]> {
        match &self.kind {
            FailureKind::Status { body, .. } => Some(body.as_slice()),
            _ => None,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self.kind, FailureKind::Canceled)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(UNAUTHORIZED)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, FailureKind::Timeout { .. })
    }

    pub fn is_hook(&self) -> bool {
        matches!(self.kind, FailureKind::Hook(_))
    }

    /// Retries spent before this failure was produced.
    pub fn attempt_count(&self) -> u32 {
        self.config.attempt_count()
    }
}

/// Errors produced while loading or validating client configuration.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// The configuration document could not be parsed.
    #[error("invalid client config: {0}")]
    Parse(#[from] serde_json::Error),
    /// The auth debounce window must be > 0.
    #[error("auth_window_ms must be > 0 (got {0})")]
    InvalidAuthWindow(u64),
    /// `base_url` must be an absolute http(s) URL.
    #[error("base_url must start with http:// or https:// (got {0:?})")]
    InvalidBaseUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io;

    fn failure(kind: FailureKind) -> RequestError {
        RequestError::new(kind, RequestConfig::get("/api401"))
    }

    #[test]
    fn status_accessors() {
        let err = failure(FailureKind::Status { status: 401, body: b"expired".to_vec() });
        assert_eq!(err.status(), Some(401));
        assert!(err.is_unauthorized());
        assert!(!err.is_canceled());
        assert_eq!(err.response_body(), Some(b"expired".as_slice()));
    }

    #[test]
    fn canceled_is_distinguishable() {
        let err = failure(FailureKind::Canceled);
        assert!(err.is_canceled());
        assert!(err.status().is_none());
        assert!(!err.is_timeout());
    }

    #[test]
    fn display_includes_method_url_and_kind() {
        let err = failure(FailureKind::Timeout {
            elapsed: Duration::from_millis(5100),
            timeout: Duration::from_secs(5),
        });
        let msg = err.to_string();
        assert!(msg.starts_with("GET /api401"), "{msg}");
        assert!(msg.contains("timed out"));
        assert!(err.is_timeout());
    }

    #[test]
    fn transport_error_chains_source() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer");
        let err = failure(FailureKind::Transport(TransportError::new(io_err)));
        let kind = err.source().expect("kind is the source");
        assert!(kind.to_string().contains("reset by peer"));
        assert!(kind.source().is_some());
    }

    #[test]
    fn hook_error_display() {
        let err = HookError::new("sign_request", "missing credentials");
        assert_eq!(err.to_string(), "hook `sign_request` failed: missing credentials");
        assert!(failure(err.into()).is_hook());
    }

    #[test]
    fn into_config_returns_attempt_state() {
        let mut config = RequestConfig::get("/x");
        config.attempt_mut().attempt_count = 3;
        let err = RequestError::new(FailureKind::Canceled, config);
        assert_eq!(err.attempt_count(), 3);
        assert_eq!(err.into_config().attempt_count(), 3);
    }

    #[test]
    fn into_parts_splits_kind_and_config() {
        let err = failure(FailureKind::Status { status: 503, body: Vec::new() });
        let (kind, config) = err.into_parts();
        assert!(matches!(kind, FailureKind::Status { status: 503, .. }));
        assert_eq!(config.url, "/api401");
    }
}
