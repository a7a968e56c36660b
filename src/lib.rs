#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Tollgate
//!
//! HTTP client middleware for async Rust built on `tower`.
//!
//! ## Features
//!
//! - **Keyed cancellation**: register a token per request key and cancel one request or every
//!   request under a route prefix
//! - **Bounded retry**: failed attempts are re-dispatched up to three times; canceled requests
//!   and requests that opt out are never retried
//! - **Auth-expiry debouncing**: a burst of `401` responses triggers re-authentication once per
//!   window
//! - **Hook chains**: ordered request and response stages around every attempt
//! - **Telemetry** through pluggable `tower::Service` sinks
//!
//! ## Quick Start
//!
//! ```rust
//! use tollgate::{Client, HttpResponse, RequestConfig, TransportError};
//! use tower::service_fn;
//!
//! #[tokio::main]
//! async fn main() {
//!     let transport = service_fn(|req: RequestConfig| async move {
//!         let status = if req.url.ends_with("/ok") { 200 } else { 503 };
//!         Ok::<_, TransportError>(HttpResponse::new(status))
//!     });
//!     let client = Client::new(transport);
//!
//!     let token = client.create_route_token("orders");
//!     let response = client
//!         .request(RequestConfig::get("/orders/ok").cancellation_key(token.key()))
//!         .await
//!         .unwrap();
//!     assert_eq!(response.status(), 200);
//!     assert!(client.registry().is_empty());
//!
//!     let err = client.request(RequestConfig::get("/flaky")).await.unwrap_err();
//!     assert_eq!(err.attempt_count(), 3);
//! }
//! ```

pub mod attempt;
pub mod auth;
pub mod cancel;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod hooks;
pub mod pipeline;
pub mod prelude;
pub mod request;
pub mod retry;
pub mod telemetry;
#[cfg(feature = "reqwest")]
pub mod transport;

// Re-exports
pub use attempt::AttemptState;
pub use auth::{AuthExpiryDebouncer, AuthExpiryDebouncerBuilder, AuthObservation, DebounceState};
pub use cancel::{CancellationHandle, CancellationRegistry, InMemoryCancellationRegistry};
pub use client::{Client, ClientBuilder};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::ClientConfig;
pub use error::{ConfigError, FailureKind, HookError, RequestError, TransportError};
pub use hooks::{HookChain, RequestHook, ResponseHook};
pub use pipeline::{InterceptLayer, InterceptService};
pub use request::{HttpResponse, Method, RequestConfig, Response};
pub use retry::{PropagateReason, RetryCoordinator, RetryDecision};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
