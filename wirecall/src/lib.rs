//! Declarative HTTP requests with a resilient execution pipeline.
//!
//! A request is described as a value: a list of [`Modifier`]s, optionally
//! wrapping another request. A [`Session`] turns that description into a
//! concrete [`WireRequest`] and drives it through authentication,
//! interceptors, the response cache, the transport, redirects and status
//! validation, retrying and re-authenticating where its configuration says
//! so.
//!
//! ## Features
//!
//! - Declarative, composable requests ([`Request`], [`HttpRequest`])
//! - Layered configuration with request-scoped overrides ([`config`])
//! - Retry with exponential backoff, jitter and `Retry-After` ([`RetryPolicy`])
//! - Single-flight credential refresh ([`AuthCoordinator`])
//! - Redirect following with a pluggable policy ([`RedirectHandler`])
//! - In-memory LRU response cache ([`MemoryCache`])
//! - Task tracking and cancellation ([`TaskRegistry`])
//! - Pluggable transport; hyper + rustls by default ([`HyperTransport`])
//!
//! ## Example
//!
//! ```ignore
//! use wirecall::{HttpRequest, HyperTransport, Session};
//!
//! let session = Session::new(HyperTransport::new()?)
//!     .base_url("https://api.example.com");
//!
//! let response = session
//!     .send(&HttpRequest::get().path("/v1/items").query("limit", 10))
//!     .await?;
//!
//! println!("{}: {} bytes", response.status(), response.len());
//! ```
//!
//! ## Composing Requests
//!
//! Any type can be a request. Wrapping another request reuses its modifiers;
//! the outer request's modifiers are applied first:
//!
//! ```ignore
//! use std::sync::Arc;
//! use wirecall::{Contents, HttpRequest, Modifier, Request, request};
//!
//! struct GetUser(u64);
//!
//! impl Request for GetUser {
//!     fn modifiers(&self) -> Vec<Arc<dyn Modifier>> {
//!         vec![request::path(format!("/users/{}", self.0))]
//!     }
//! }
//!
//! let traced = HttpRequest::new()
//!     .header("x-trace-id", "abc123")
//!     .contents(GetUser(42));
//!
//! let user = session.send_json::<User>(&traced).await?;
//! ```
//!
//! ## Configuration
//!
//! Sessions carry a typed [`Configuration`]. Builder methods cover the common
//! keys; any key can be set with [`Session::configure`], or per request with
//! [`HttpRequest::configure`], which only affects that request:
//!
//! ```ignore
//! use wirecall::config::keys::Retry;
//! use wirecall::{HttpRequest, RetryPolicy};
//!
//! // Never retry this one.
//! let request = HttpRequest::post()
//!     .path("/payments")
//!     .json(&payment)
//!     .configure::<Retry>(RetryPolicy::no_retry());
//! ```
//!
//! ## Retries
//!
//! Failed transport calls and rejected statuses are offered to the retry
//! handler. The default [`RetryPolicy`] retries connectivity failures and
//! `408, 500, 502, 503, 504, 507` up to twice with exponential backoff:
//!
//! - **Base delay**: 1s
//! - **Multiplier**: 1.6
//! - **Jitter**: up to one extra delay, chosen uniformly
//! - **Max delay**: 120s
//!
//! A `Retry-After` header in delta-seconds overrides the computed delay.
//! Custom handlers can replace the decision with
//! [`Session::retry_handler`], but the policy's `max_retry_count` always
//! bounds the number of retries.
//!
//! ## Authentication
//!
//! ```ignore
//! use wirecall::{BearerAuth, HttpRequest, Session};
//!
//! let session = Session::new(transport)
//!     .base_url("https://api.example.com")
//!     .authorization(BearerAuth::new(|_current, session| async move {
//!         let token = session
//!             .send_json::<Token>(&HttpRequest::post().path("/oauth/token").form(&grant))
//!             .await?;
//!         Ok(token.into_inner().access_token)
//!     }));
//! ```
//!
//! An unauthorized response triggers one credential refresh per task.
//! Concurrent tasks that hit an expired credential share a single refresh.
//!
//! ## Cancellation
//!
//! [`Session::spawn`] runs a request in the background and returns an
//! [`InFlight`] handle. Cancelling it, or calling [`Session::cancel_all`],
//! interrupts the pipeline at its next stage and aborts any transport call
//! in flight. Cancelled tasks resolve to [`Error::Cancelled`].
//!
//! ## Feature Flags
//!
//! | Feature | Description | Dependencies |
//! |---------|-------------|--------------|
//! | `tls` (default) | `tls-ring` + `tls-native-roots` | `rustls`, `hyper-rustls` |
//! | `tls-ring` / `tls-aws-lc` | TLS crypto provider | `rustls` |
//! | `tls-native-roots` / `tls-webpki-roots` | Root certificates | `rustls-native-certs` / `webpki-roots` |
//! | `tracing` (default) | Spans and events from the pipeline, [`TracingLogger`] | `tracing` |
//!
//! When `tracing` is enabled every send runs inside a `wirecall.send` span
//! carrying the task id and request id.

pub mod auth;
pub mod cache;
pub mod config;
mod error;
pub mod handler;
pub mod interceptor;
pub mod logger;
mod pipeline;
pub mod request;
pub mod response;
mod session;
pub mod task;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use error::{Error, TransportError};
pub use session::{InFlight, Session};

pub use auth::{AuthCoordinator, AuthInterceptor, Authenticator, BasicAuth, BearerAuth};
pub use cache::{CacheKey, CachePolicy, MemoryCache, ResponseCache};
pub use config::{
    ConfigKey, Configuration, ExponentialBackoff, RetryDelay, RetryHandler, RetryPolicy,
    RetryResult,
};
pub use handler::{
    AcceptableStatuses, CacheDecision, CacheHandler, CacheSuccessfulGets, FollowRedirects,
    IgnoreRedirects, NeverCache, RedirectDecision, RedirectHandler, SameOriginRedirects,
    StatusValidator,
};
pub use interceptor::{FnInterceptor, HeaderInterceptor, RequestInterceptor};
#[cfg(feature = "tracing")]
pub use logger::TracingLogger;
pub use logger::{NoopLogger, RequestLogger};
pub use request::{Contents, HttpRequest, Modifier, Request, WireRequest};
pub use response::{RawResponse, Response};
pub use task::{Context, Task, TaskId, TaskRegistry};
pub use transport::{
    HyperTransport, HyperTransportBuilder, ServiceTransport, TlsClientConfig, Transport,
    TransportBody,
};

// Re-export core types that users need
pub use wirecall_core::{Encoder, EncodingError, Form, Json, Raw, StatusError};

pub use bytes::Bytes;
