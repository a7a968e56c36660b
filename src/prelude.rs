//! Convenient re-exports for common Tollgate types.
pub use crate::{
    attempt::AttemptState,
    auth::{AuthExpiryDebouncer, AuthObservation},
    cancel::{CancellationHandle, CancellationRegistry, InMemoryCancellationRegistry},
    client::{Client, ClientBuilder},
    config::ClientConfig,
    error::{FailureKind, RequestError, TransportError},
    hooks::{HookChain, RequestHook, ResponseHook},
    pipeline::InterceptLayer,
    request::{HttpResponse, Method, RequestConfig, Response},
    retry::{RetryCoordinator, RetryDecision},
};
