//! Telemetry for the request pipeline.
//!
//! The pipeline emits structured [`PipelineEvent`]s describing registry activity, retry
//! decisions, auth-expiry observations and final request outcomes. Events flow through
//! `TelemetrySink` implementations, which are plain `tower::Service<PipelineEvent>`s so they
//! compose with standard tower combinators.
//!
//! ```rust
//! use tollgate::telemetry::{PipelineEvent, RetryEvent, RequestOutcome};
//! use std::time::Duration;
//!
//! let retry = PipelineEvent::Retry(RetryEvent::Attempt { attempt: 1 });
//! let done = PipelineEvent::Request(RequestOutcome::Success {
//!     attempts: 2,
//!     duration: Duration::from_millis(50),
//! });
//! assert_eq!(retry.to_string(), "Retry::Attempt(attempt=1)");
//! # let _ = done;
//! ```

pub mod events;
pub mod sinks;

pub use events::{AuthEvent, CancellationEvent, PipelineEvent, RequestOutcome, RetryEvent};
pub use sinks::{emit_best_effort, LogSink, MemorySink, NullSink, TelemetrySink};
