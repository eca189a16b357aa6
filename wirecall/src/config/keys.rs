//! Built-in configuration keys.
//!
//! Every knob the pipeline reads lives here. Sessions set them through their
//! builder methods; single requests override them with
//! [`configure`](crate::request::configure).

use std::sync::Arc;
use std::time::Duration;

use super::registry::ConfigKey;
use super::retry::{RetryHandler, RetryPolicy};
use crate::auth::AuthInterceptor;
use crate::cache::ResponseCache;
use crate::handler::{
    AcceptableStatuses, CacheHandler, CacheSuccessfulGets, FollowRedirects, RedirectHandler,
    StatusValidator,
};
use crate::interceptor::RequestInterceptor;
use crate::logger::{NoopLogger, RequestLogger};
use crate::task::TaskRegistry;

/// Base URL every relative request is resolved against.
pub struct BaseUrl;

impl ConfigKey for BaseUrl {
    type Value = Option<String>;
    fn default_value() -> Self::Value {
        None
    }
}

/// Explicit URL for a single request; takes precedence over [`BaseUrl`].
///
/// Set by the [`url`](crate::request::url) modifier.
pub struct RequestUrl;

impl ConfigKey for RequestUrl {
    type Value = Option<String>;
    fn default_value() -> Self::Value {
        None
    }
}

/// Default per-attempt timeout. `None` waits indefinitely.
pub struct Timeout;

impl ConfigKey for Timeout {
    type Value = Option<Duration>;
    fn default_value() -> Self::Value {
        None
    }
}

/// Retry policy. Its `max_retry_count` is always enforced.
pub struct Retry;

impl ConfigKey for Retry {
    type Value = RetryPolicy;
    fn default_value() -> Self::Value {
        RetryPolicy::default()
    }
}

/// Custom retry decision. When unset the [`Retry`] policy decides.
pub struct RetryHandlerKey;

impl ConfigKey for RetryHandlerKey {
    type Value = Option<Arc<dyn RetryHandler>>;
    fn default_value() -> Self::Value {
        None
    }
}

/// Response status validator. Defaults to accepting 2xx.
pub struct Validator;

impl ConfigKey for Validator {
    type Value = Arc<dyn StatusValidator>;
    fn default_value() -> Self::Value {
        Arc::new(AcceptableStatuses::success())
    }
}

/// Request interceptors, run in registration order.
pub struct RequestInterceptors;

impl ConfigKey for RequestInterceptors {
    type Value = Vec<Arc<dyn RequestInterceptor>>;
    fn default_value() -> Self::Value {
        Vec::new()
    }
}

pub struct RedirectHandlerKey;

impl ConfigKey for RedirectHandlerKey {
    type Value = Arc<dyn RedirectHandler>;
    fn default_value() -> Self::Value {
        Arc::new(FollowRedirects)
    }
}

/// Maximum redirects followed per task.
pub struct MaxRedirects;

impl ConfigKey for MaxRedirects {
    type Value = usize;
    fn default_value() -> Self::Value {
        10
    }
}

pub struct CacheHandlerKey;

impl ConfigKey for CacheHandlerKey {
    type Value = Arc<dyn CacheHandler>;
    fn default_value() -> Self::Value {
        Arc::new(CacheSuccessfulGets)
    }
}

/// Response store. Caching is off when unset.
pub struct ResponseCacheKey;

impl ConfigKey for ResponseCacheKey {
    type Value = Option<Arc<dyn ResponseCache>>;
    fn default_value() -> Self::Value {
        None
    }
}

/// Credential coordinator used to authorize requests.
pub struct Authorization;

impl ConfigKey for Authorization {
    type Value = Option<Arc<dyn AuthInterceptor>>;
    fn default_value() -> Self::Value {
        None
    }
}

pub struct Logger;

impl ConfigKey for Logger {
    type Value = Arc<dyn RequestLogger>;
    fn default_value() -> Self::Value {
        Arc::new(NoopLogger)
    }
}

/// The session's task registry.
///
/// Must be set before any request runs; [`Session::new`](crate::Session::new)
/// does this.
pub struct Tasks;

impl ConfigKey for Tasks {
    type Value = TaskRegistry;

    /// # Panics
    ///
    /// Always. Reading `Tasks` from a configuration that never had it set is
    /// a programming error.
    fn default_value() -> Self::Value {
        panic!("the `Tasks` configuration key was read before a task registry was set")
    }
}
