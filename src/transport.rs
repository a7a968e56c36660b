//! [`reqwest`]-backed transport (feature `reqwest`).
//!
//! ```rust,no_run
//! use tollgate::{Client, RequestConfig, ReqwestTransport};
//!
//! # async fn demo() -> Result<(), tollgate::RequestError> {
//! let client = Client::new(ReqwestTransport::default());
//! let response = client.request(RequestConfig::get("http://localhost:3000/health")).await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```

use crate::error::TransportError;
use crate::request::{HttpResponse, RequestConfig};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower_service::Service;

/// Sends requests with a shared [`reqwest::Client`] and stops early when the request's
/// cancellation signal fires.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Service<RequestConfig> for ReqwestTransport {
    type Response = HttpResponse;
    type Error = TransportError;
    type Future = BoxFuture<'static, Result<HttpResponse, TransportError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RequestConfig) -> Self::Future {
        let client = self.client.clone();
        Box::pin(async move {
            let method = reqwest::Method::from_bytes(req.method.as_str().as_bytes())
                .map_err(TransportError::new)?;
            let mut builder = client.request(method, req.url.as_str());
            for (name, value) in &req.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = req.body.clone() {
                builder = builder.body(body);
            }

            let send = builder.send();
            let response = match req.signal() {
                Some(token) => tokio::select! {
                    _ = token.cancelled() => return Err(TransportError::new("request aborted")),
                    result = send => result,
                },
                None => send.await,
            }
            .map_err(TransportError::new)?;

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            let body = response.bytes().await.map_err(TransportError::new)?.to_vec();

            Ok(HttpResponse { status, headers, body })
        })
    }
}
