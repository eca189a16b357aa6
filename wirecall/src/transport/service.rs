//! Tower service adapter.

use std::future::poll_fn;

use bytes::Bytes;
use http_body::Body;
use http_body_util::BodyExt;
use tower_service::Service;

use super::body::TransportBody;
use super::{BoxFuture, Transport};
use crate::TransportError;

/// Adapts a `tower_service::Service` into a [`Transport`].
///
/// The service is cloned per call, so it should be cheap to clone (as
/// most tower stacks are). Service errors are reported as
/// [`TransportError::Other`]; response bodies are read to completion.
///
/// # Example
///
/// ```ignore
/// use wirecall::{ServiceTransport, Session};
///
/// let stack = tower::ServiceBuilder::new()
///     .concurrency_limit(16)
///     .service(my_http_service);
///
/// let session = Session::new(ServiceTransport::new(stack));
/// ```
#[derive(Debug, Clone)]
pub struct ServiceTransport<S> {
    service: S,
}

impl<S> ServiceTransport<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub fn into_inner(self) -> S {
        self.service
    }
}

impl<S, B> Transport for ServiceTransport<S>
where
    S: Service<http::Request<TransportBody>, Response = http::Response<B>>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send,
    S::Error: std::fmt::Display,
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: std::fmt::Display,
{
    fn send(
        &self,
        request: http::Request<TransportBody>,
    ) -> BoxFuture<'static, Result<http::Response<Bytes>, TransportError>> {
        let mut service = self.service.clone();
        Box::pin(async move {
            poll_fn(|cx| service.poll_ready(cx))
                .await
                .map_err(|e| TransportError::Other(e.to_string()))?;
            let response = service
                .call(request)
                .await
                .map_err(|e| TransportError::Other(e.to_string()))?;
            let (parts, body) = response.into_parts();
            let body = body
                .collect()
                .await
                .map_err(|e| TransportError::Closed(format!("failed to read response body: {}", e)))?
                .to_bytes();
            Ok(http::Response::from_parts(parts, body))
        })
    }
}
