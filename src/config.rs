//! Client configuration.
//!
//! Everything here has a default, so an empty JSON object is a valid configuration:
//!
//! ```rust
//! use tollgate::ClientConfig;
//!
//! let config = ClientConfig::from_json(r#"{
//!     "base_url": "http://localhost:3000",
//!     "default_headers": [["X-Custom-Header", "foobar"]],
//!     "timeout_ms": 30000
//! }"#).unwrap();
//! assert_eq!(config.max_retries, 3);
//! assert_eq!(config.auth_window_ms, 3000);
//! ```

use crate::auth::DEFAULT_AUTH_WINDOW;
use crate::error::ConfigError;
use crate::retry::DEFAULT_MAX_RETRIES;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings shared by every request a client sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Prefix for relative request URLs.
    pub base_url: Option<String>,
    /// Headers added to every request that does not already set them.
    pub default_headers: Vec<(String, String)>,
    /// Per-attempt timeout in milliseconds; `0` disables it.
    pub timeout_ms: u64,
    /// Re-dispatches allowed per logical request.
    pub max_retries: u32,
    /// Auth-expiry suppression window in milliseconds.
    pub auth_window_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            default_headers: Vec::new(),
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            max_retries: DEFAULT_MAX_RETRIES,
            auth_window_ms: DEFAULT_AUTH_WINDOW.as_millis() as u64,
        }
    }
}

impl ClientConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth_window_ms == 0 {
            return Err(ConfigError::InvalidAuthWindow(0));
        }
        if let Some(base) = &self.base_url {
            if !(base.starts_with("http://") || base.starts_with("https://")) {
                return Err(ConfigError::InvalidBaseUrl(base.clone()));
            }
        }
        Ok(())
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_ms = timeout.map_or(0, |t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn auth_window(mut self, window: Duration) -> Self {
        self.auth_window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Per-attempt timeout, if enabled.
    pub fn timeout_duration(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    pub fn auth_window_duration(&self) -> Duration {
        Duration::from_millis(self.auth_window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = ClientConfig::from_json("{}").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.timeout_duration(), Some(DEFAULT_TIMEOUT));
        assert_eq!(config.auth_window_duration(), Duration::from_secs(3));
    }

    #[test]
    fn zero_timeout_disables_it() {
        let config = ClientConfig::default().timeout(None);
        assert_eq!(config.timeout_ms, 0);
        assert!(config.timeout_duration().is_none());
    }

    #[test]
    fn rejects_zero_auth_window() {
        let err = ClientConfig::from_json(r#"{"auth_window_ms": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAuthWindow(0)));
    }

    #[test]
    fn rejects_relative_base_url() {
        let err = ClientConfig::from_json(r#"{"base_url": "localhost:3000"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl(_)));
        assert!(err.to_string().contains("localhost:3000"));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = ClientConfig::from_json("{").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn builder_methods_chain() {
        let config = ClientConfig::default()
            .base_url("https://api.example.com")
            .default_header("X-Custom-Header", "foobar")
            .max_retries(1)
            .auth_window(Duration::from_millis(500));
        config.validate().unwrap();
        assert_eq!(config.default_headers.len(), 1);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.auth_window_ms, 500);
    }
}
