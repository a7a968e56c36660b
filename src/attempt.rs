//! Per logical request state carried across transport attempts.
//!
//! An [`AttemptState`] is attached once, when a request first enters the pipeline, and then
//! travels unchanged (apart from `attempt_count`) through every retry of that request. It doubles
//! as the request's private options: callers opt out of retry or bind a cancellation key here.

use serde::{Deserialize, Serialize};

/// Private options and retry bookkeeping for one logical request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttemptState {
    /// When `false` the request is sent exactly once.
    pub retry_enabled: bool,
    /// Re-dispatches already performed; `0` on the first send.
    pub attempt_count: u32,
    /// Registry key binding this request to a cancellation token.
    pub cancellation_key: Option<String>,
}

impl Default for AttemptState {
    fn default() -> Self {
        Self { retry_enabled: true, attempt_count: 0, cancellation_key: None }
    }
}

impl AttemptState {
    /// Fresh state with retry enabled and no cancellation key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style toggle for retry eligibility.
    pub fn with_retry(mut self, enabled: bool) -> Self {
        self.retry_enabled = enabled;
        self
    }

    /// Builder-style cancellation key binding.
    pub fn with_cancellation_key(mut self, key: impl Into<String>) -> Self {
        self.cancellation_key = Some(key.into());
        self
    }

    /// Total sends so far, counting the first one.
    pub fn sends(&self) -> u32 {
        self.attempt_count.saturating_add(1)
    }

    pub(crate) fn record_retry(&mut self) -> u32 {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.attempt_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_retry_with_zero_attempts() {
        let state = AttemptState::default();
        assert!(state.retry_enabled);
        assert_eq!(state.attempt_count, 0);
        assert!(state.cancellation_key.is_none());
        assert_eq!(state.sends(), 1);
    }

    #[test]
    fn record_retry_increments_without_touching_options() {
        let mut state = AttemptState::new().with_retry(true).with_cancellation_key("orders-1");
        assert_eq!(state.record_retry(), 1);
        assert_eq!(state.record_retry(), 2);
        assert_eq!(state.cancellation_key.as_deref(), Some("orders-1"));
        assert!(state.retry_enabled);
        assert_eq!(state.sends(), 3);
    }

    #[test]
    fn deserializes_partial_options() {
        let state: AttemptState = serde_json::from_str(r#"{"retry_enabled": false}"#).unwrap();
        assert!(!state.retry_enabled);
        assert_eq!(state.attempt_count, 0);
        assert!(state.cancellation_key.is_none());
    }
}
