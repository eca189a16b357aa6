//! Retry policy with pluggable delay strategies.
//!
//! The pipeline consults a [`RetryHandler`] whenever a call fails with a
//! transport error or a rejected status. The handler answers with a
//! [`RetryResult`]; the pipeline then enforces the
//! [`RetryPolicy::max_retry_count`] ceiling no matter what the handler said.
//!
//! # Example
//!
//! ```ignore
//! use wirecall::{RetryPolicy, Session};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new()
//!     .max_retry_count(4)
//!     .retryable_statuses([429, 503])
//!     .exponential(Duration::from_millis(100), 2.0);
//!
//! let session = Session::new(transport).retry(policy);
//! ```
//!
//! # Retryable Errors
//!
//! The default policy retries:
//! - statuses 408, 500, 502, 503, 504 and 507
//! - connectivity failures (connect errors, timeouts, closed connections)
//!
//! Everything else, including encoding errors and cancellation, is never
//! offered for retry.

use std::collections::BTreeSet;
use std::time::Duration;

use http::header;
use wirecall_core::StatusError;

use crate::task::{Context, Task};
use crate::Error;

/// Default configuration values.
pub mod defaults {
    use std::time::Duration;

    /// Default maximum number of retries (not counting the initial attempt).
    pub const MAX_RETRY_COUNT: u32 = 2;

    /// Default initial delay for exponential backoff.
    pub const BASE_DELAY: Duration = Duration::from_secs(1);

    /// Default multiplier for exponential backoff.
    pub const MULTIPLIER: f64 = 1.6;

    /// Default maximum delay between retries.
    pub const MAX_DELAY: Duration = Duration::from_secs(120);
}

/// Outcome of a retry decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryResult {
    DoNotRetry,
    /// Retry immediately.
    Retry,
    /// Retry after sleeping for the given duration.
    RetryAfter(Duration),
}

/// Decides whether a failed call should be attempted again.
///
/// Implemented by [`RetryPolicy`] and by any
/// `Fn(&Task, &Error, &Context) -> RetryResult` closure.
pub trait RetryHandler: Send + Sync + 'static {
    fn should_retry(&self, task: &Task, error: &Error, context: &Context) -> RetryResult;
}

impl<F> RetryHandler for F
where
    F: Fn(&Task, &Error, &Context) -> RetryResult + Send + Sync + 'static,
{
    fn should_retry(&self, task: &Task, error: &Error, context: &Context) -> RetryResult {
        self(task, error, context)
    }
}

/// Exponential backoff parameters.
///
/// The n-th retry (1-based) waits `base * multiplier^(n-1)`, clamped to
/// `max_delay`. With jitter enabled a uniform random amount in `[0, delay)`
/// is added on top.
#[derive(Clone, Debug, PartialEq)]
pub struct ExponentialBackoff {
    pub base: Duration,
    /// Should be >= 1.0.
    pub multiplier: f64,
    pub jitter: bool,
    pub max_delay: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base: defaults::BASE_DELAY,
            multiplier: defaults::MULTIPLIER,
            jitter: true,
            max_delay: defaults::MAX_DELAY,
        }
    }
}

impl ExponentialBackoff {
    /// Delay before the `retry`-th retry, without jitter.
    pub fn base_delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base.as_secs_f64() * self.multiplier.powi(exponent);
        let max = self.max_delay.as_secs_f64();
        // powi can overflow to infinity for large retry counts
        if !secs.is_finite() || secs >= max {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }

    /// Delay before the `retry`-th retry, jitter applied.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let delay = self.base_delay_for(retry);
        if self.jitter && !delay.is_zero() {
            delay + delay.mul_f64(rand::random::<f64>())
        } else {
            delay
        }
    }
}

/// How long to wait between attempts.
#[derive(Clone, Debug, PartialEq)]
pub enum RetryDelay {
    /// Retry immediately.
    Instant,
    Fixed(Duration),
    Exponential(ExponentialBackoff),
}

impl RetryDelay {
    /// Delay before the `retry`-th retry (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self {
            RetryDelay::Instant => Duration::ZERO,
            RetryDelay::Fixed(delay) => *delay,
            RetryDelay::Exponential(backoff) => backoff.delay_for(retry),
        }
    }
}

/// Configuration for retry behavior.
///
/// # Default Values
///
/// - `max_retry_count`: 2
/// - `retryable_statuses`: 408, 500, 502, 503, 504, 507
/// - `retry_transport_errors`: true
/// - `delay`: exponential, base 1s, multiplier 1.6, jittered, capped at 120s
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries (not counting the initial attempt).
    ///
    /// The pipeline enforces this ceiling even for custom retry handlers.
    pub max_retry_count: u32,

    pub retryable_statuses: BTreeSet<u16>,

    /// Whether connectivity failures are retried.
    pub retry_transport_errors: bool,

    pub delay: RetryDelay,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_count: defaults::MAX_RETRY_COUNT,
            retryable_statuses: StatusError::RETRYABLE_BY_DEFAULT
                .iter()
                .map(StatusError::code)
                .collect(),
            retry_transport_errors: true,
            delay: RetryDelay::Exponential(ExponentialBackoff::default()),
        }
    }
}

impl RetryPolicy {
    /// Create a new RetryPolicy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a retry policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retry_count: 0,
            ..Default::default()
        }
    }

    /// Set the maximum number of retries.
    pub fn max_retry_count(mut self, count: u32) -> Self {
        self.max_retry_count = count;
        self
    }

    /// Replace the set of retryable statuses.
    pub fn retryable_statuses<I: IntoIterator<Item = u16>>(mut self, statuses: I) -> Self {
        self.retryable_statuses = statuses.into_iter().collect();
        self
    }

    pub fn retry_transport_errors(mut self, enabled: bool) -> Self {
        self.retry_transport_errors = enabled;
        self
    }

    /// Retry without waiting.
    pub fn instant(mut self) -> Self {
        self.delay = RetryDelay::Instant;
        self
    }

    /// Wait the same duration before every retry.
    pub fn fixed(mut self, delay: Duration) -> Self {
        self.delay = RetryDelay::Fixed(delay);
        self
    }

    /// Use exponential backoff with jitter and the default delay cap.
    ///
    /// # Panics
    ///
    /// Panics if `multiplier` is less than 1.0.
    pub fn exponential(mut self, base: Duration, multiplier: f64) -> Self {
        assert!(multiplier >= 1.0, "multiplier must be >= 1.0");
        self.delay = RetryDelay::Exponential(ExponentialBackoff {
            base,
            multiplier,
            ..Default::default()
        });
        self
    }

    /// Set the delay strategy directly.
    pub fn delay(mut self, delay: RetryDelay) -> Self {
        self.delay = delay;
        self
    }

    /// Returns whether `error` is eligible for retry under this policy,
    /// ignoring the retry ceiling.
    pub fn is_retryable(&self, error: &Error) -> bool {
        match error {
            Error::Transport(transport) => {
                self.retry_transport_errors && transport.is_connectivity()
            }
            Error::Status { response, .. } => self
                .retryable_statuses
                .contains(&response.status().as_u16()),
            _ => false,
        }
    }
}

impl RetryHandler for RetryPolicy {
    /// Eligibility is checked before the ceiling, so a policy with
    /// `max_retry_count == 0` still classifies the error but never retries.
    fn should_retry(&self, _task: &Task, error: &Error, context: &Context) -> RetryResult {
        if !self.is_retryable(error) {
            return RetryResult::DoNotRetry;
        }
        if context.retry_count >= self.max_retry_count {
            return RetryResult::DoNotRetry;
        }
        if let Some(delay) = error.response().and_then(|r| retry_after(r.headers())) {
            return RetryResult::RetryAfter(delay);
        }
        match self.delay.delay_for(context.retry_count + 1) {
            delay if delay.is_zero() => RetryResult::Retry,
            delay => RetryResult::RetryAfter(delay),
        }
    }
}

/// Parse a `Retry-After` header given in delta-seconds.
///
/// HTTP-date values are ignored.
fn retry_after(headers: &http::HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::RawResponse;
    use crate::task::TaskId;
    use crate::TransportError;
    use bytes::Bytes;
    use http::{HeaderMap, HeaderValue, StatusCode};
    use wirecall_core::{EncodingError, StatusError};

    fn status_error(status: u16, headers: HeaderMap) -> Error {
        let status = StatusCode::from_u16(status).unwrap();
        Error::status(
            StatusError::classify(status),
            RawResponse::new(
                status,
                headers,
                Bytes::new(),
                "https://api.example.com/".parse().unwrap(),
            ),
        )
    }

    fn context(retry_count: u32) -> Context {
        Context {
            retry_count,
            ..Context::new(TaskId::next())
        }
    }

    fn task() -> Task {
        Task::new("test")
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retry_count, 2);
        assert_eq!(
            policy.retryable_statuses,
            BTreeSet::from([408, 500, 502, 503, 504, 507])
        );
        assert!(policy.retry_transport_errors);
        assert_eq!(
            policy.delay,
            RetryDelay::Exponential(ExponentialBackoff {
                base: Duration::from_secs(1),
                multiplier: 1.6,
                jitter: true,
                max_delay: Duration::from_secs(120),
            })
        );
    }

    #[test]
    fn test_no_retry_preset() {
        assert_eq!(RetryPolicy::no_retry().max_retry_count, 0);
    }

    #[test]
    fn test_base_above_max_delay_is_clamped() {
        let backoff = ExponentialBackoff {
            base: Duration::from_secs(10),
            max_delay: Duration::from_secs(1),
            jitter: false,
            ..Default::default()
        };
        assert_eq!(backoff.base_delay_for(1), Duration::from_secs(1));
        assert_eq!(backoff.base_delay_for(4), Duration::from_secs(1));
    }

    #[test]
    #[should_panic(expected = "multiplier must be >= 1.0")]
    fn test_retry_policy_invalid_multiplier() {
        RetryPolicy::new().exponential(Duration::from_secs(1), 0.5);
    }

    #[test]
    fn test_exponential_backoff_no_jitter() {
        let backoff = ExponentialBackoff {
            base: Duration::from_secs(1),
            multiplier: 2.0,
            jitter: false,
            max_delay: Duration::from_secs(100),
        };
        assert_eq!(backoff.delay_for(1), Duration::from_secs(1));
        assert_eq!(backoff.delay_for(2), Duration::from_secs(2));
        assert_eq!(backoff.delay_for(3), Duration::from_secs(4));
    }

    #[test]
    fn test_exponential_backoff_max_delay_clamping() {
        let backoff = ExponentialBackoff {
            base: Duration::from_secs(10),
            multiplier: 10.0,
            jitter: false,
            max_delay: Duration::from_secs(15),
        };
        assert_eq!(backoff.delay_for(1), Duration::from_secs(10));
        assert_eq!(backoff.delay_for(2), Duration::from_secs(15));
        assert_eq!(backoff.delay_for(5000), Duration::from_secs(15));
    }

    #[test]
    fn test_exponential_backoff_with_jitter() {
        let backoff = ExponentialBackoff {
            base: Duration::from_secs(1),
            multiplier: 2.0,
            jitter: true,
            max_delay: Duration::from_secs(100),
        };
        for _ in 0..32 {
            let delay = backoff.delay_for(2);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay < Duration::from_secs(4));
        }
    }

    #[test]
    fn test_fixed_and_instant_delay() {
        assert_eq!(RetryDelay::Instant.delay_for(3), Duration::ZERO);
        assert_eq!(
            RetryDelay::Fixed(Duration::from_millis(250)).delay_for(7),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_retryable_classification() {
        let policy = RetryPolicy::default();
        assert!(policy.is_retryable(&status_error(503, HeaderMap::new())));
        assert!(policy.is_retryable(&status_error(408, HeaderMap::new())));
        assert!(!policy.is_retryable(&status_error(501, HeaderMap::new())));
        assert!(!policy.is_retryable(&status_error(404, HeaderMap::new())));
        assert!(policy.is_retryable(&Error::Transport(TransportError::Timeout)));
        assert!(!policy.is_retryable(&Error::Transport(TransportError::TooManyRedirects(10))));
        assert!(!policy.is_retryable(&EncodingError::Json("bad".into()).into()));
        assert!(!policy.is_retryable(&Error::Cancelled));

        let no_transport = RetryPolicy::default().retry_transport_errors(false);
        assert!(!no_transport.is_retryable(&Error::Transport(TransportError::Timeout)));
    }

    #[test]
    fn test_should_retry_respects_ceiling() {
        let policy = RetryPolicy::new().instant();
        let err = status_error(503, HeaderMap::new());
        assert_eq!(policy.should_retry(&task(), &err, &context(0)), RetryResult::Retry);
        assert_eq!(policy.should_retry(&task(), &err, &context(1)), RetryResult::Retry);
        assert_eq!(
            policy.should_retry(&task(), &err, &context(2)),
            RetryResult::DoNotRetry
        );
    }

    #[test]
    fn test_should_retry_zero_ceiling() {
        let policy = RetryPolicy::no_retry().instant();
        let err = status_error(503, HeaderMap::new());
        assert_eq!(
            policy.should_retry(&task(), &err, &context(0)),
            RetryResult::DoNotRetry
        );
    }

    #[test]
    fn test_should_retry_uses_delay_strategy() {
        let policy = RetryPolicy::new().fixed(Duration::from_millis(300));
        let err = Error::Transport(TransportError::Connect("refused".into()));
        assert_eq!(
            policy.should_retry(&task(), &err, &context(0)),
            RetryResult::RetryAfter(Duration::from_millis(300))
        );
    }

    #[test]
    fn test_should_retry_honors_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(header::RETRY_AFTER, HeaderValue::from_static("7"));
        let policy = RetryPolicy::new().instant();
        assert_eq!(
            policy.should_retry(&task(), &status_error(503, headers), &context(0)),
            RetryResult::RetryAfter(Duration::from_secs(7))
        );
    }

    #[test]
    fn test_retry_after_ignores_http_dates() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_closure_retry_handler() {
        let handler = |_: &Task, error: &Error, _: &Context| {
            if error.is_transport() {
                RetryResult::Retry
            } else {
                RetryResult::DoNotRetry
            }
        };
        let err = Error::Transport(TransportError::Other("boom".into()));
        assert_eq!(handler.should_retry(&task(), &err, &context(0)), RetryResult::Retry);
    }
}
