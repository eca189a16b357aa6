//! HTTP transport layer.
//!
//! The pipeline talks to the network only through the [`Transport`] trait.
//! This module provides:
//!
//! - [`HyperTransport`]: the default transport, built on hyper_util's legacy client
//!   (HTTP/1.1 and HTTP/2, TLS via rustls, connection pooling)
//! - [`ServiceTransport`]: adapts any `tower_service::Service` into a transport
//!
//! Transports never follow redirects themselves. A 3xx response is handed
//! back as-is so the pipeline's redirect handler sees every redirect event.
//!
//! # Feature Flags
//!
//! TLS support requires enabling the appropriate features:
//!
//! - `tls` (default) - Enables `tls-ring` + `tls-native-roots` for convenience
//! - `tls-ring` / `tls-aws-lc` - Crypto providers
//! - `tls-native-roots` / `tls-webpki-roots` - Root certificates
//!
//! # Example
//!
//! ```ignore
//! use wirecall::transport::HyperTransportBuilder;
//! use std::time::Duration;
//!
//! let transport = HyperTransportBuilder::new()
//!     .pool_idle_timeout(Duration::from_secs(60))
//!     .build()?;
//! let session = Session::new(transport);
//! ```

mod body;
mod connector;
mod hyper;
mod service;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use http::Method;

use crate::TransportError;

pub use body::TransportBody;
pub use connector::{build_https_connector, has_tls_support};
pub use hyper::{HyperTransport, HyperTransportBuilder};
pub use service::ServiceTransport;

// Re-export rustls types that users might need for TLS configuration
pub use rustls::ClientConfig as TlsClientConfig;

/// Type alias for a boxed future returning a result.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The boundary between the pipeline and the network.
///
/// `send` must return a `'static` future: the pipeline spawns it so that a
/// cancelled task can abort the in-flight call through its handle.
pub trait Transport: Send + Sync + 'static {
    /// Perform one HTTP exchange and return the fully read response.
    fn send(
        &self,
        request: http::Request<TransportBody>,
    ) -> BoxFuture<'static, Result<http::Response<Bytes>, TransportError>>;

    /// Whether this transport can carry a request body for `method`.
    ///
    /// Transports that structurally forbid bodies on some methods return
    /// `false`; the pipeline then drops the body and logs a warning.
    fn allows_body(&self, method: &Method) -> bool {
        let _ = method;
        true
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send(
        &self,
        request: http::Request<TransportBody>,
    ) -> BoxFuture<'static, Result<http::Response<Bytes>, TransportError>> {
        (**self).send(request)
    }

    fn allows_body(&self, method: &Method) -> bool {
        (**self).allows_body(method)
    }
}
