//! Request logging boundary.
//!
//! A [`RequestLogger`] observes each attempt: the wire request as sent, then
//! the response or error. Loggers return nothing, so they cannot change the
//! outcome of a task.

use crate::request::WireRequest;
use crate::response::RawResponse;
use crate::task::Context;
use crate::Error;

/// Observes requests as the pipeline sends them.
pub trait RequestLogger: Send + Sync + 'static {
    fn log_request(&self, request: &WireRequest, context: &Context);

    fn log_response(&self, request: &WireRequest, response: &RawResponse, context: &Context);

    fn log_error(&self, request: &WireRequest, error: &Error, context: &Context);
}

/// Discards everything. The default.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopLogger;

impl RequestLogger for NoopLogger {
    fn log_request(&self, _: &WireRequest, _: &Context) {}

    fn log_response(&self, _: &WireRequest, _: &RawResponse, _: &Context) {}

    fn log_error(&self, _: &WireRequest, _: &Error, _: &Context) {}
}

/// Emits one `tracing` event per request, response and error.
#[cfg(feature = "tracing")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

#[cfg(feature = "tracing")]
impl RequestLogger for TracingLogger {
    fn log_request(&self, request: &WireRequest, context: &Context) {
        tracing::info!(
            task = %context.task_id,
            method = %request.method,
            url = %request.url,
            retry = context.retry_count,
            body_len = request.body.as_ref().map_or(0, |b| b.len()),
            "sending request"
        );
    }

    fn log_response(&self, request: &WireRequest, response: &RawResponse, context: &Context) {
        tracing::info!(
            task = %context.task_id,
            method = %request.method,
            url = %request.url,
            status = response.status().as_u16(),
            body_len = response.body().len(),
            "received response"
        );
    }

    fn log_error(&self, request: &WireRequest, error: &Error, context: &Context) {
        tracing::warn!(
            task = %context.task_id,
            method = %request.method,
            url = %request.url,
            error = %error,
            "request failed"
        );
    }
}
