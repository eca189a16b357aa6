//! Error types for wirecall.
//!
//! This module provides [`Error`], the single terminal error a caller can
//! receive from [`Session::send`](crate::Session::send), and
//! [`TransportError`], the failures a [`Transport`](crate::Transport) reports.

use wirecall_core::{EncodingError, StatusError};

use crate::response::RawResponse;

/// Failures reported by the underlying transport.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established (DNS, refused, TLS handshake).
    #[error("connect failed: {0}")]
    Connect(String),

    /// The call did not complete within its timeout.
    #[error("request timed out")]
    Timeout,

    /// The connection was closed or reset while the call was in flight.
    #[error("connection closed: {0}")]
    Closed(String),

    /// The redirect chain exceeded the configured limit.
    #[error("too many redirects ({0})")]
    TooManyRedirects(usize),

    /// Any other transport failure.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Returns whether this is a connectivity failure that a retry may fix.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            TransportError::Connect(_) | TransportError::Timeout | TransportError::Closed(_)
        )
    }
}

/// Terminal error for a request.
///
/// `Error` is `Clone` so that a single auth refresh failure can be handed to
/// every caller waiting on it.
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    /// Neither an explicit URL nor a configured base URL could be resolved.
    #[error("invalid request url: {0}")]
    InvalidRequestUrl(String),

    /// The request body could not be encoded. Never retried.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Connectivity or timeout failure from the transport.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The response status was rejected by the status validator.
    #[error("{error}")]
    Status {
        error: StatusError,
        response: Box<RawResponse>,
    },

    /// Refreshing credentials failed. Not retried again within the same task.
    #[error("auth refresh failed: {0}")]
    AuthRefresh(String),

    /// The task was cancelled.
    #[error("request cancelled")]
    Cancelled,

    /// A request interceptor aborted the call.
    #[error("interceptor error: {0}")]
    Interceptor(String),

    /// The request demanded a cached response and none was stored.
    #[error("no cached response for {0}")]
    CacheMiss(String),

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The wire request could not be turned into an HTTP request.
    #[error("failed to build request: {0}")]
    Build(String),
}

impl Error {
    /// Create a status error from a rejected response.
    pub fn status(error: StatusError, response: RawResponse) -> Self {
        Error::Status {
            error,
            response: Box::new(response),
        }
    }

    /// Create an interceptor error.
    pub fn interceptor<S: Into<String>>(message: S) -> Self {
        Error::Interceptor(message.into())
    }

    /// Create an auth refresh error.
    pub fn auth_refresh<S: Into<String>>(message: S) -> Self {
        Error::AuthRefresh(message.into())
    }

    /// The classified status, if this is a status error.
    pub fn status_error(&self) -> Option<StatusError> {
        match self {
            Error::Status { error, .. } => Some(*error),
            _ => None,
        }
    }

    /// The rejected response, if this is a status error.
    pub fn response(&self) -> Option<&RawResponse> {
        match self {
            Error::Status { response, .. } => Some(response),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Returns whether this error came out of the response validation stage.
    ///
    /// Only these errors are offered to the retry and auth interceptors.
    /// Everything else aborts the pipeline as soon as it is raised.
    pub fn is_validation_stage(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Status { .. })
    }
}
