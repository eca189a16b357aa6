//! Request interceptors.
//!
//! Request interceptors run after the wire request is built and before it is
//! sent, in registration order. Unlike modifiers they may be asynchronous and
//! stateful, which makes them the place for request signing, correlation ids
//! or anything that needs the task's [`Context`].
//!
//! The first interceptor error aborts the task.
//!
//! # Example
//!
//! ```ignore
//! use wirecall::{FnInterceptor, HeaderInterceptor, Session};
//!
//! let session = Session::new(transport)
//!     .on_request(HeaderInterceptor::new("x-client", "billing"))
//!     .on_request(FnInterceptor::new(|mut request, context| async move {
//!         let signature = sign(&request).await?;
//!         request.headers.insert("x-signature", signature);
//!         Ok(request)
//!     }));
//! ```

use std::future::Future;

use http::{HeaderName, HeaderValue};

use crate::request::WireRequest;
use crate::task::Context;
use crate::transport::BoxFuture;
use crate::Error;

/// Rewrites a wire request before it is sent.
pub trait RequestInterceptor: Send + Sync + 'static {
    fn intercept<'a>(
        &'a self,
        request: WireRequest,
        context: &'a Context,
    ) -> BoxFuture<'a, Result<WireRequest, Error>>;
}

/// An interceptor that sets a header on every request.
#[derive(Clone, Debug)]
pub struct HeaderInterceptor {
    name: HeaderName,
    value: HeaderValue,
}

impl HeaderInterceptor {
    /// Create a new header interceptor.
    ///
    /// # Panics
    ///
    /// Panics if the header name or value is invalid.
    pub fn new(name: &str, value: &str) -> Self {
        match Self::try_new(name, value) {
            Ok(interceptor) => interceptor,
            Err(e) => panic!("{e}"),
        }
    }

    /// Try to create a new header interceptor, returning an error if invalid.
    pub fn try_new(name: &str, value: &str) -> Result<Self, Error> {
        let name = name
            .parse()
            .map_err(|_| Error::Build(format!("invalid header name: {}", name)))?;
        let value = value
            .parse()
            .map_err(|_| Error::Build(format!("invalid header value: {}", value)))?;
        Ok(Self { name, value })
    }

    /// Create a new header interceptor from pre-parsed values.
    pub fn from_parts(name: HeaderName, value: HeaderValue) -> Self {
        Self { name, value }
    }
}

impl RequestInterceptor for HeaderInterceptor {
    fn intercept<'a>(
        &'a self,
        mut request: WireRequest,
        _context: &'a Context,
    ) -> BoxFuture<'a, Result<WireRequest, Error>> {
        request.headers.insert(self.name.clone(), self.value.clone());
        Box::pin(std::future::ready(Ok(request)))
    }
}

/// An interceptor built from an async closure.
///
/// The closure receives the request and a snapshot of the task context.
pub struct FnInterceptor<F> {
    func: F,
}

impl<F, Fut> FnInterceptor<F>
where
    F: Fn(WireRequest, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<WireRequest, Error>> + Send + 'static,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut> RequestInterceptor for FnInterceptor<F>
where
    F: Fn(WireRequest, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<WireRequest, Error>> + Send + 'static,
{
    fn intercept<'a>(
        &'a self,
        request: WireRequest,
        context: &'a Context,
    ) -> BoxFuture<'a, Result<WireRequest, Error>> {
        Box::pin((self.func)(request, context.clone()))
    }
}

impl<F: Clone> Clone for FnInterceptor<F> {
    fn clone(&self) -> Self {
        Self {
            func: self.func.clone(),
        }
    }
}

impl<F> std::fmt::Debug for FnInterceptor<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnInterceptor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskId;

    fn wire() -> WireRequest {
        WireRequest::new("https://api.example.com/".parse().unwrap())
    }

    #[tokio::test]
    async fn test_header_interceptor() {
        let interceptor = HeaderInterceptor::new("x-custom-header", "test-value");
        let context = Context::new(TaskId::next());
        let request = interceptor.intercept(wire(), &context).await.unwrap();
        assert_eq!(request.headers.get("x-custom-header").unwrap(), "test-value");
    }

    #[test]
    fn test_header_interceptor_try_new() {
        assert!(HeaderInterceptor::try_new("x-ok", "fine").is_ok());
        assert!(HeaderInterceptor::try_new("bad name", "v").is_err());
        assert!(HeaderInterceptor::try_new("x-ok", "bad\r\nvalue").is_err());
    }

    #[tokio::test]
    async fn test_fn_interceptor_sees_context() {
        let interceptor = FnInterceptor::new(|mut request: WireRequest, context: Context| async move {
            let value = context.retry_count.to_string();
            request.headers.insert("x-attempt", value.parse().unwrap());
            Ok(request)
        });

        let context = Context {
            retry_count: 2,
            ..Context::new(TaskId::next())
        };
        let request = interceptor.intercept(wire(), &context).await.unwrap();
        assert_eq!(request.headers["x-attempt"], "2");
    }

    #[tokio::test]
    async fn test_fn_interceptor_error() {
        let interceptor = FnInterceptor::new(|_request: WireRequest, _context: Context| async move {
            Err(Error::interceptor("signing key unavailable"))
        });
        let context = Context::new(TaskId::next());
        let err = interceptor.intercept(wire(), &context).await.unwrap_err();
        assert!(matches!(err, Error::Interceptor(_)));
    }
}
