//! The per-task execution pipeline.
//!
//! Each attempt runs these stages strictly in order:
//!
//! 1. build the wire request from the request's modifiers and a
//!    request-scoped copy of the session configuration
//! 2. make sure a credential is installed and apply it
//! 3. run request interceptors in registration order
//! 4. answer from the response cache when the cache policy allows it
//! 5. send, following redirects through the redirect handler
//! 6. validate the status, then let the cache handler store the response
//!
//! A failed attempt is offered to the retry handler when the error came from
//! sending or validating. Otherwise, an unauthorized response triggers one
//! credential refresh per task. Every other error ends the task at once.
//! Cancellation is checked at every stage transition and interrupts any
//! await in progress.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use http::{Method, StatusCode, header};
use tokio::task::AbortHandle;
use wirecall_core::StatusError;

use crate::cache::{CacheKey, CachePolicy, ResponseCache};
use crate::config::keys::{
    Authorization, CacheHandlerKey, Logger, MaxRedirects, RedirectHandlerKey, RequestInterceptors,
    ResponseCacheKey, Retry, RetryHandlerKey, Validator,
};
use crate::config::{Configuration, RetryHandler, RetryResult};
use crate::handler::{CacheDecision, RedirectDecision};
use crate::logger::RequestLogger;
use crate::request::{Modifier, Request, WireRequest, effective_modifiers, fold_modifiers, scope_configuration};
use crate::response::RawResponse;
use crate::session::Session;
use crate::task::{CallHandle, Task};
use crate::transport::Transport;
use crate::{Error, TransportError};

/// Run `request` to completion as `task`.
pub(crate) async fn execute(
    session: &Session,
    request: &dyn Request,
    task: &Task,
) -> Result<RawResponse, Error> {
    let modifiers = effective_modifiers(request);

    loop {
        ensure_not_cancelled(task)?;
        let config = scope_configuration(&modifiers, session.configuration());

        let error = match attempt(session, &config, &modifiers, task).await {
            Ok(response) => return Ok(response),
            Err(error) => error,
        };

        if !error.is_validation_stage() {
            return Err(error);
        }

        let context = task.context().with_error(error.clone());
        let policy = config.get::<Retry>();
        let decision = match config.get::<RetryHandlerKey>() {
            Some(handler) => handler.should_retry(task, &error, &context),
            None => policy.should_retry(task, &error, &context),
        };

        let delay = match decision {
            RetryResult::DoNotRetry => None,
            RetryResult::Retry => Some(Duration::ZERO),
            RetryResult::RetryAfter(delay) => Some(delay),
        };

        if let Some(delay) = delay {
            if task.retry_count() >= policy.max_retry_count {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    task = %task.id(),
                    max_retry_count = policy.max_retry_count,
                    error = %error,
                    "retry limit reached"
                );
                return Err(error);
            }
            let _attempt = task.record_retry();
            #[cfg(feature = "tracing")]
            tracing::debug!(
                task = %task.id(),
                attempt = _attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying after failure"
            );
            if !delay.is_zero() {
                cancellable(task, async {
                    tokio::time::sleep(delay).await;
                    Ok(())
                })
                .await?;
            }
            continue;
        }

        if error.status_error() == Some(StatusError::Unauthorized) && !task.auth_retried() {
            if let Some(auth) = config.get::<Authorization>() {
                task.mark_auth_retried();
                #[cfg(feature = "tracing")]
                tracing::debug!(task = %task.id(), "unauthorized, refreshing credentials");
                cancellable(task, async {
                    auth.refresh(session, task.auth_generation())
                        .await
                        .map_err(into_auth_error)
                })
                .await?;
                continue;
            }
        }

        return Err(error);
    }
}

/// One pass through the pipeline, from building to validation.
async fn attempt(
    session: &Session,
    config: &Configuration,
    modifiers: &[Arc<dyn Modifier>],
    task: &Task,
) -> Result<RawResponse, Error> {
    let mut wire = fold_modifiers(modifiers, config)?;

    if let Some(auth) = config.get::<Authorization>() {
        cancellable(task, async {
            auth.ensure_valid(session).await.map_err(into_auth_error)
        })
        .await?;
        task.set_auth_generation(auth.apply(&mut wire)?);
    }

    let context = task.context();
    for interceptor in config.get::<RequestInterceptors>() {
        ensure_not_cancelled(task)?;
        wire = cancellable(task, interceptor.intercept(wire, &context)).await?;
    }
    ensure_not_cancelled(task)?;

    let cache = config.get::<ResponseCacheKey>();
    let cache_key = CacheKey::for_request(&wire);
    if let Some(response) = read_cache(cache.as_deref(), &cache_key, wire.cache_policy)? {
        #[cfg(feature = "tracing")]
        tracing::debug!(task = %task.id(), url = %wire.url, "served from cache");
        return Ok(response);
    }

    drop_unsupported_body(session.transport().as_ref(), &mut wire);

    let logger = config.get::<Logger>();
    let (sent, response) = send_following_redirects(session, config, task, wire, logger.as_ref()).await?;

    let validation = config.get::<Validator>().validate(&response);

    if let Some(cache) = &cache {
        match config.get::<CacheHandlerKey>().decide(&sent, &response, validation) {
            CacheDecision::Cache => cache.put(cache_key, response.clone()),
            CacheDecision::Modify(replacement) => cache.put(cache_key, replacement),
            CacheDecision::Ignore => {}
        }
    }

    match validation {
        Ok(()) => Ok(response),
        Err(status) => Err(Error::status(status, response)),
    }
}

fn read_cache(
    cache: Option<&dyn ResponseCache>,
    key: &CacheKey,
    policy: CachePolicy,
) -> Result<Option<RawResponse>, Error> {
    if !policy.reads_cache() {
        return Ok(None);
    }
    match cache.and_then(|cache| cache.get(key)) {
        Some(response) => Ok(Some(response)),
        None if policy == CachePolicy::ReturnCacheDontLoad => {
            Err(Error::CacheMiss(format!("{} {}", key.method, key.url)))
        }
        None => Ok(None),
    }
}

/// Drop a GET/HEAD body the transport cannot carry.
fn drop_unsupported_body(transport: &dyn Transport, wire: &mut WireRequest) {
    if wire.body.is_none() || !wire.is_safe_method() {
        return;
    }
    if transport.allows_body(&wire.method) {
        #[cfg(feature = "tracing")]
        tracing::debug!(method = %wire.method, url = %wire.url, "sending body with safe method");
    } else {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            method = %wire.method,
            url = %wire.url,
            "transport cannot send a body with this method; body dropped"
        );
        wire.body = None;
        wire.headers.remove(header::CONTENT_TYPE);
        wire.headers.remove(header::CONTENT_LENGTH);
    }
}

/// Send `wire`, following redirects. Returns the request that produced the
/// final response along with it.
async fn send_following_redirects(
    session: &Session,
    config: &Configuration,
    task: &Task,
    mut wire: WireRequest,
    logger: &dyn RequestLogger,
) -> Result<(WireRequest, RawResponse), Error> {
    let handler = config.get::<RedirectHandlerKey>();
    let max_redirects = config.get::<MaxRedirects>();
    let mut redirects = 0;

    loop {
        ensure_not_cancelled(task)?;
        logger.log_request(&wire, &task.context());
        let response = match dispatch(session.transport().as_ref(), task, &wire).await {
            Ok(response) => {
                logger.log_response(&wire, &response, &task.context());
                response
            }
            Err(error) => {
                logger.log_error(&wire, &error, &task.context());
                return Err(error);
            }
        };

        let Some(next) = redirect_target(&wire, &response) else {
            return Ok((wire, response));
        };
        let next = match handler.on_redirect(&wire, &response, &next) {
            RedirectDecision::Follow => next,
            RedirectDecision::FollowWith(next) => next,
            RedirectDecision::Ignore => return Ok((wire, response)),
        };

        redirects += 1;
        task.record_redirect();
        if redirects > max_redirects {
            return Err(TransportError::TooManyRedirects(max_redirects).into());
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(
            task = %task.id(),
            status = response.status().as_u16(),
            location = %next.url,
            "following redirect"
        );
        wire = next;
    }
}

/// The request a redirect response points to, if it is one.
fn redirect_target(wire: &WireRequest, response: &RawResponse) -> Option<WireRequest> {
    let status = response.status();
    if !matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    ) {
        return None;
    }
    let url = wire.url.join(response.location()?).ok()?;

    let mut next = wire.clone();
    let becomes_get = (status == StatusCode::SEE_OTHER && wire.method != Method::HEAD)
        || ((status == StatusCode::MOVED_PERMANENTLY || status == StatusCode::FOUND)
            && wire.method == Method::POST);
    if becomes_get {
        next.method = Method::GET;
        next.body = None;
        next.headers.remove(header::CONTENT_TYPE);
        next.headers.remove(header::CONTENT_LENGTH);
    }
    if url.origin() != wire.url.origin() {
        next.headers.remove(header::AUTHORIZATION);
    }
    next.url = url;
    Some(next)
}

/// Perform one transport call for `task`.
///
/// The call runs as its own tokio task so that cancelling `task` can abort
/// it through its handle.
async fn dispatch(
    transport: &dyn Transport,
    task: &Task,
    wire: &WireRequest,
) -> Result<RawResponse, Error> {
    task.set_wire_request(wire.clone());
    let call = transport.send(wire.to_http()?);
    let timeout = wire.timeout;

    let (join, call) = CallHandle::spawn(async move {
        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, call)
                .await
                .unwrap_or(Err(TransportError::Timeout)),
            None => call.await,
        }
    });
    let _abort = AbortOnDrop(join.abort_handle());
    task.attach(call);
    let result = join.await;
    task.detach();

    match result {
        Ok(Ok(response)) => Ok(RawResponse::from_http(response, wire.url.clone())),
        Ok(Err(error)) => Err(error.into()),
        Err(join) if join.is_cancelled() => Err(Error::Cancelled),
        Err(join) => Err(TransportError::Other(format!("transport panicked: {join}")).into()),
    }
}

/// Aborts the transport call if the pipeline future is dropped mid-flight.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn ensure_not_cancelled(task: &Task) -> Result<(), Error> {
    if task.is_cancelled() {
        #[cfg(feature = "tracing")]
        tracing::debug!(task = %task.id(), "task cancelled");
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

/// Run `future` unless `task` is cancelled first.
async fn cancellable<T, F>(task: &Task, future: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    tokio::select! {
        biased;
        _ = task.cancelled() => Err(Error::Cancelled),
        result = future => result,
    }
}

fn into_auth_error(error: Error) -> Error {
    match error {
        Error::AuthRefresh(_) | Error::Cancelled => error,
        other => Error::AuthRefresh(other.to_string()),
    }
}
