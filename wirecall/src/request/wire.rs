//! The transport-ready request.

use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method};
use url::Url;

use crate::cache::CachePolicy;
use crate::transport::TransportBody;
use crate::Error;

/// A fully resolved HTTP call: method, URL, headers, body, timeout and
/// cache directive.
///
/// Built by folding a request's modifiers over a base derived from the
/// configuration. Interceptors receive and return it by value.
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// Per-attempt timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub cache_policy: CachePolicy,
}

impl WireRequest {
    /// A bodiless GET to `url` with no headers.
    pub fn new(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
            cache_policy: CachePolicy::default(),
        }
    }

    /// Returns whether the method is one that normally carries no body.
    pub fn is_safe_method(&self) -> bool {
        matches!(self.method, Method::GET | Method::HEAD)
    }

    pub(crate) fn to_http(&self) -> Result<http::Request<TransportBody>, Error> {
        let mut request = http::Request::builder()
            .method(self.method.clone())
            .uri(self.url.as_str())
            .body(TransportBody::from(self.body.clone()))
            .map_err(|e| Error::Build(e.to_string()))?;
        *request.headers_mut() = self.headers.clone();
        Ok(request)
    }
}
