//! Response-side handlers consulted by the pipeline after each call.
//!
//! In the order the pipeline runs them:
//! - [`RedirectHandler`]: only for 3xx responses carrying a `Location`
//! - [`StatusValidator`]: accepts the final status or classifies it
//! - [`CacheHandler`]: decides whether the response is stored

use std::collections::BTreeSet;

use http::{Method, StatusCode};
use wirecall_core::StatusError;

use crate::request::WireRequest;
use crate::response::RawResponse;

/// Accepts or rejects a response status.
pub trait StatusValidator: Send + Sync + 'static {
    fn validate(&self, response: &RawResponse) -> Result<(), StatusError>;
}

impl<F> StatusValidator for F
where
    F: Fn(&RawResponse) -> Result<(), StatusError> + Send + Sync + 'static,
{
    fn validate(&self, response: &RawResponse) -> Result<(), StatusError> {
        self(response)
    }
}

/// Accepts a fixed set of statuses and rejects everything else.
///
/// # Example
///
/// ```ignore
/// let session = Session::new(transport).validate([200, 201]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptableStatuses(BTreeSet<u16>);

impl AcceptableStatuses {
    pub fn new<I: IntoIterator<Item = u16>>(statuses: I) -> Self {
        Self(statuses.into_iter().collect())
    }

    /// Every 2xx status.
    pub fn success() -> Self {
        Self::new(200..300)
    }

    pub fn contains(&self, status: StatusCode) -> bool {
        self.0.contains(&status.as_u16())
    }
}

impl StatusValidator for AcceptableStatuses {
    fn validate(&self, response: &RawResponse) -> Result<(), StatusError> {
        if self.contains(response.status()) {
            Ok(())
        } else {
            Err(StatusError::classify(response.status()))
        }
    }
}

/// What to do with a redirect.
#[derive(Clone, Debug, PartialEq)]
pub enum RedirectDecision {
    /// Follow to the request the pipeline prepared.
    Follow,
    /// Follow to a different request.
    FollowWith(WireRequest),
    /// Stop and treat the 3xx response as final.
    Ignore,
}

/// Decides how redirects are followed.
///
/// `next` is the request the pipeline would send: the `Location` resolved
/// against the current URL, with the method downgraded to GET for 303 (and
/// for 301/302 answering a POST) and `authorization` removed when the origin
/// changes.
pub trait RedirectHandler: Send + Sync + 'static {
    fn on_redirect(
        &self,
        request: &WireRequest,
        response: &RawResponse,
        next: &WireRequest,
    ) -> RedirectDecision;
}

/// Follows every redirect.
#[derive(Clone, Copy, Debug, Default)]
pub struct FollowRedirects;

impl RedirectHandler for FollowRedirects {
    fn on_redirect(&self, _: &WireRequest, _: &RawResponse, _: &WireRequest) -> RedirectDecision {
        RedirectDecision::Follow
    }
}

/// Returns 3xx responses to the validator unfollowed.
#[derive(Clone, Copy, Debug, Default)]
pub struct IgnoreRedirects;

impl RedirectHandler for IgnoreRedirects {
    fn on_redirect(&self, _: &WireRequest, _: &RawResponse, _: &WireRequest) -> RedirectDecision {
        RedirectDecision::Ignore
    }
}

/// Follows redirects only while they stay on the original origin.
#[derive(Clone, Copy, Debug, Default)]
pub struct SameOriginRedirects;

impl RedirectHandler for SameOriginRedirects {
    fn on_redirect(
        &self,
        request: &WireRequest,
        _: &RawResponse,
        next: &WireRequest,
    ) -> RedirectDecision {
        if request.url.origin() == next.url.origin() {
            RedirectDecision::Follow
        } else {
            RedirectDecision::Ignore
        }
    }
}

/// What to do with a response once it has been validated.
#[derive(Clone, Debug, PartialEq)]
pub enum CacheDecision {
    Cache,
    Ignore,
    /// Store this response instead.
    Modify(RawResponse),
}

/// Decides what gets stored in the response cache.
///
/// Called for every response, successful or not, when a cache is configured.
pub trait CacheHandler: Send + Sync + 'static {
    fn decide(
        &self,
        request: &WireRequest,
        response: &RawResponse,
        validation: Result<(), StatusError>,
    ) -> CacheDecision;
}

/// Stores successful GET responses.
#[derive(Clone, Copy, Debug, Default)]
pub struct CacheSuccessfulGets;

impl CacheHandler for CacheSuccessfulGets {
    fn decide(
        &self,
        request: &WireRequest,
        _: &RawResponse,
        validation: Result<(), StatusError>,
    ) -> CacheDecision {
        if request.method == Method::GET && validation.is_ok() {
            CacheDecision::Cache
        } else {
            CacheDecision::Ignore
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCache;

impl CacheHandler for NeverCache {
    fn decide(&self, _: &WireRequest, _: &RawResponse, _: Result<(), StatusError>) -> CacheDecision {
        CacheDecision::Ignore
    }
}
