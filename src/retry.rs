//! Retry decisions for failed attempts.
//!
//! Semantics:
//! - `max_retries` counts re-dispatches, not total sends: the default of 3 allows 4 sends.
//! - Canceled attempts are never retried, whatever the request's options say. A request whose
//!   cancellation signal has fired counts as canceled whatever the failure kind.
//! - A request whose [`AttemptState`](crate::AttemptState) has `retry_enabled == false` is sent
//!   exactly once.
//! - Re-dispatch is immediate; there is no backoff between attempts.
//!
//! The coordinator only decides. The pipeline owns the loop that increments the attempt count
//! and re-runs the hooks for the next attempt.
//!
//! Example
//! ```rust
//! use tollgate::error::{FailureKind, RequestError};
//! use tollgate::retry::{PropagateReason, RetryCoordinator, RetryDecision};
//! use tollgate::RequestConfig;
//!
//! let coordinator = RetryCoordinator::default();
//! let failure = RequestError::new(
//!     FailureKind::Status { status: 503, body: Vec::new() },
//!     RequestConfig::get("/inventory"),
//! );
//! assert_eq!(coordinator.decide(&failure), RetryDecision::Retry { next_attempt: 1 });
//!
//! let canceled = RequestError::new(FailureKind::Canceled, RequestConfig::get("/inventory"));
//! assert_eq!(coordinator.decide(&canceled), RetryDecision::Propagate(PropagateReason::Canceled));
//! ```

use crate::error::{FailureKind, RequestError};
use std::fmt;

/// Default number of re-dispatches per logical request.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Why a failure is handed back to the caller instead of being retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagateReason {
    /// The request was canceled through its token.
    Canceled,
    /// The request opted out of retry.
    Disabled,
    /// The retry budget is spent.
    Exhausted,
    /// The failure did not come from the transport (a hook rejected the request).
    NotRetryable,
}

impl fmt::Display for PropagateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PropagateReason::Canceled => "canceled",
            PropagateReason::Disabled => "retry disabled",
            PropagateReason::Exhausted => "retries exhausted",
            PropagateReason::NotRetryable => "not retryable",
        };
        f.write_str(s)
    }
}

/// Outcome of [`RetryCoordinator::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-dispatch the request; `next_attempt` is the attempt count it will carry.
    Retry { next_attempt: u32 },
    /// Return the failure unchanged.
    Propagate(PropagateReason),
}

/// Decides whether a failed attempt is re-dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryCoordinator {
    max_retries: u32,
}

impl Default for RetryCoordinator {
    fn default() -> Self {
        Self { max_retries: DEFAULT_MAX_RETRIES }
    }
}

impl RetryCoordinator {
    /// Coordinator allowing `max_retries` re-dispatches. `0` disables retry globally.
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Apply the retry rules, in order: canceled, opted out, budget spent, otherwise retry.
    pub fn decide(&self, failure: &RequestError) -> RetryDecision {
        if failure.config().signal().is_some_and(|t| t.is_cancelled()) {
            return RetryDecision::Propagate(PropagateReason::Canceled);
        }
        match failure.kind() {
            FailureKind::Canceled => return RetryDecision::Propagate(PropagateReason::Canceled),
            FailureKind::Hook(_) => return RetryDecision::Propagate(PropagateReason::NotRetryable),
            _ => {}
        }

        let attempt = failure.config().attempt();
        if !attempt.retry_enabled {
            return RetryDecision::Propagate(PropagateReason::Disabled);
        }
        if attempt.attempt_count >= self.max_retries {
            return RetryDecision::Propagate(PropagateReason::Exhausted);
        }
        RetryDecision::Retry { next_attempt: attempt.attempt_count + 1 }
    }
}
