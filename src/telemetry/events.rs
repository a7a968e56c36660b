use crate::retry::PropagateReason;
use std::fmt;
use std::time::Duration;

/// Events emitted while a logical request moves through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Cancellation registry activity caused by the pipeline
    Cancellation(CancellationEvent),
    /// Retry coordinator decisions
    Retry(RetryEvent),
    /// Auth-expiry debouncer observations
    Auth(AuthEvent),
    /// Final outcome of a logical request
    Request(RequestOutcome),
}

/// Registry activity driven by request hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancellationEvent {
    /// A token was bound to an outgoing attempt.
    Attached {
        /// Registry key of the token
        key: String,
    },
    /// A successful request released its token.
    Released {
        /// Registry key of the token
        key: String,
    },
    /// An attempt was aborted through its token.
    Aborted {
        /// Registry key of the token, if the request carried one
        key: Option<String>,
    },
}

/// Events emitted by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryEvent {
    /// A failed attempt is being re-dispatched.
    Attempt {
        /// Attempt count carried by the re-dispatched request (1-indexed)
        attempt: u32,
    },
    /// A failure is being handed back to the caller.
    GaveUp {
        /// Sends performed for the logical request
        attempts: u32,
        /// Why no further attempt was made
        reason: PropagateReason,
    },
}

/// Events emitted by the auth-expiry debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// A 401 opened a window and fired the re-authentication trigger.
    ReauthTriggered,
    /// A 401 arrived while a window was open and was dropped.
    Suppressed,
}

/// Final outcome of a logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The request produced a 2xx response.
    Success {
        /// Sends performed, including the first one
        attempts: u32,
        /// Wall time across all attempts
        duration: Duration,
    },
    /// The request failed for good.
    Failure {
        /// Sends performed, including the first one
        attempts: u32,
        /// Wall time across all attempts
        duration: Duration,
    },
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineEvent::Cancellation(CancellationEvent::Attached { key }) => {
                write!(f, "Cancellation::Attached(key={})", key)
            }
            PipelineEvent::Cancellation(CancellationEvent::Released { key }) => {
                write!(f, "Cancellation::Released(key={})", key)
            }
            PipelineEvent::Cancellation(CancellationEvent::Aborted { key }) => {
                write!(f, "Cancellation::Aborted(key={})", key.as_deref().unwrap_or("<none>"))
            }
            PipelineEvent::Retry(RetryEvent::Attempt { attempt }) => {
                write!(f, "Retry::Attempt(attempt={})", attempt)
            }
            PipelineEvent::Retry(RetryEvent::GaveUp { attempts, reason }) => {
                write!(f, "Retry::GaveUp(attempts={}, reason={})", attempts, reason)
            }
            PipelineEvent::Auth(AuthEvent::ReauthTriggered) => write!(f, "Auth::ReauthTriggered"),
            PipelineEvent::Auth(AuthEvent::Suppressed) => write!(f, "Auth::Suppressed"),
            PipelineEvent::Request(RequestOutcome::Success { attempts, duration }) => {
                write!(f, "Request::Success(attempts={}, duration={:?})", attempts, duration)
            }
            PipelineEvent::Request(RequestOutcome::Failure { attempts, duration }) => {
                write!(f, "Request::Failure(attempts={}, duration={:?})", attempts, duration)
            }
        }
    }
}
