//! The session: shared configuration plus a transport.
//!
//! A [`Session`] is cheap to clone. Clones share the transport and the task
//! registry, but each holds its own copy of the configuration, so builder
//! calls on a clone never leak into the original.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Poll, ready};
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

use crate::auth::{AuthCoordinator, AuthInterceptor, Authenticator};
use crate::cache::ResponseCache;
use crate::config::keys::{
    Authorization, BaseUrl, CacheHandlerKey, Logger, MaxRedirects, RedirectHandlerKey,
    RequestInterceptors, ResponseCacheKey, Retry, RetryHandlerKey, Tasks, Timeout, Validator,
};
use crate::config::{ConfigKey, Configuration, RetryHandler, RetryPolicy};
use crate::handler::{AcceptableStatuses, CacheHandler, RedirectHandler, StatusValidator};
use crate::interceptor::RequestInterceptor;
use crate::logger::RequestLogger;
use crate::pipeline;
use crate::request::Request;
use crate::response::{RawResponse, Response};
use crate::task::{Task, TaskId, TaskRegistry};
use crate::transport::Transport;
use crate::Error;

/// Entry point for sending requests.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use wirecall::{HttpRequest, HyperTransport, RetryPolicy, Session};
///
/// let session = Session::new(HyperTransport::new()?)
///     .base_url("https://api.example.com")
///     .timeout(Duration::from_secs(10))
///     .retry(RetryPolicy::new().max_retry_count(3));
///
/// let user = session
///     .send_json::<User>(&HttpRequest::get().path("/users/42"))
///     .await?;
/// ```
#[derive(Clone)]
pub struct Session {
    transport: Arc<dyn Transport>,
    configuration: Configuration,
}

impl Session {
    pub fn new<T: Transport>(transport: T) -> Self {
        Self::from_arc(Arc::new(transport))
    }

    /// Create a session over a transport that is already shared.
    pub fn from_arc(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            configuration: Configuration::new().with::<Tasks>(TaskRegistry::new()),
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Set any configuration key.
    pub fn configure<K: ConfigKey>(mut self, value: K::Value) -> Self {
        self.configuration.set::<K>(value);
        self
    }

    /// URL that request paths are appended to.
    pub fn base_url(self, url: impl Into<String>) -> Self {
        self.configure::<BaseUrl>(Some(url.into()))
    }

    /// Default timeout for every transport call.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.configure::<Timeout>(Some(timeout))
    }

    pub fn retry(self, policy: RetryPolicy) -> Self {
        self.configure::<Retry>(policy)
    }

    /// Replace the retry decision. The policy's `max_retry_count` still
    /// bounds the number of retries.
    pub fn retry_handler<H: RetryHandler>(self, handler: H) -> Self {
        self.configure::<RetryHandlerKey>(Some(Arc::new(handler)))
    }

    /// Accept exactly these statuses.
    pub fn validate<I: IntoIterator<Item = u16>>(self, statuses: I) -> Self {
        self.validator(AcceptableStatuses::new(statuses))
    }

    pub fn validator<V: StatusValidator>(self, validator: V) -> Self {
        self.configure::<Validator>(Arc::new(validator))
    }

    /// Authenticate every request with `authenticator`.
    pub fn authorization<A: Authenticator>(self, authenticator: A) -> Self {
        self.auth_interceptor(AuthCoordinator::new(authenticator))
    }

    /// Install a prepared auth coordinator, for example one seeded with a
    /// known credential.
    pub fn auth_interceptor<I: AuthInterceptor>(self, interceptor: I) -> Self {
        self.configure::<Authorization>(Some(Arc::new(interceptor)))
    }

    /// The same session with authorization removed.
    ///
    /// Authenticators receive this session for their token calls.
    pub fn without_authorization(&self) -> Self {
        let mut session = self.clone();
        session.configuration.remove::<Authorization>();
        session
    }

    pub fn cache<C: ResponseCache>(self, cache: C) -> Self {
        self.configure::<ResponseCacheKey>(Some(Arc::new(cache)))
    }

    pub fn cache_handler<H: CacheHandler>(self, handler: H) -> Self {
        self.configure::<CacheHandlerKey>(Arc::new(handler))
    }

    pub fn redirection_handler<H: RedirectHandler>(self, handler: H) -> Self {
        self.configure::<RedirectHandlerKey>(Arc::new(handler))
    }

    pub fn max_redirects(self, max: usize) -> Self {
        self.configure::<MaxRedirects>(max)
    }

    /// Append a request interceptor. Interceptors run in the order they
    /// were added.
    pub fn on_request<I: RequestInterceptor>(mut self, interceptor: I) -> Self {
        self.configuration
            .update::<RequestInterceptors, _>(|interceptors| interceptors.push(Arc::new(interceptor)));
        self
    }

    pub fn logger<L: RequestLogger>(self, logger: L) -> Self {
        self.configure::<Logger>(Arc::new(logger))
    }

    /// Tasks currently in flight on this session and its clones.
    pub fn tasks(&self) -> TaskRegistry {
        self.configuration.get::<Tasks>()
    }

    pub fn task(&self, id: TaskId) -> Option<Arc<Task>> {
        self.tasks().task(id)
    }

    /// Cancel every task in flight. Resolves once their transport calls
    /// have been aborted.
    pub async fn cancel_all(&self) {
        self.tasks().cancel_all().await
    }

    /// Send `request` and wait for the validated response.
    pub async fn send(&self, request: &dyn Request) -> Result<Response<Bytes>, Error> {
        let task = Arc::new(Task::new(request.id()));
        let _registration = self.tasks().register(task.clone());
        self.run(request, &task).await
    }

    /// Send `request` and decode the response body as JSON.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: &dyn Request,
    ) -> Result<Response<T>, Error> {
        self.send(request).await?.json()
    }

    /// Start `request` in the background.
    ///
    /// The task is registered before this returns, so it is visible to
    /// [`tasks`](Self::tasks) and [`cancel_all`](Self::cancel_all) straight
    /// away.
    pub fn spawn<R: Request + 'static>(&self, request: R) -> InFlight {
        let task = Arc::new(Task::new(request.id()));
        let registration = self.tasks().register(task.clone());
        let session = self.clone();
        let handle = tokio::spawn({
            let task = task.clone();
            async move {
                let _registration = registration;
                session.run(&request, &task).await
            }
        });
        InFlight { task, handle }
    }

    async fn run(&self, request: &dyn Request, task: &Task) -> Result<Response<Bytes>, Error> {
        let execution = pipeline::execute(self, request, task);

        #[cfg(feature = "tracing")]
        let execution = {
            use tracing::Instrument;
            execution.instrument(tracing::info_span!(
                "wirecall.send",
                task = %task.id(),
                request = %task.request_id(),
            ))
        };

        execution.await.map(RawResponse::into_response)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.configuration.get::<BaseUrl>())
            .field("configuration", &self.configuration)
            .finish_non_exhaustive()
    }
}

/// A request running in the background. Await it for the response.
///
/// Dropping an `InFlight` detaches it; the request keeps running until it
/// completes or is cancelled.
pub struct InFlight {
    task: Arc<Task>,
    handle: JoinHandle<Result<Response<Bytes>, Error>>,
}

impl InFlight {
    pub fn id(&self) -> TaskId {
        self.task.id()
    }

    pub fn task(&self) -> Arc<Task> {
        self.task.clone()
    }

    pub fn cancel(&self) {
        self.task.cancel();
    }
}

impl Future for InFlight {
    type Output = Result<Response<Bytes>, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Self::Output> {
        match ready!(Pin::new(&mut self.handle).poll(cx)) {
            Ok(result) => Poll::Ready(result),
            Err(join) if join.is_cancelled() => Poll::Ready(Err(Error::Cancelled)),
            Err(join) => std::panic::resume_unwind(join.into_panic()),
        }
    }
}

impl std::fmt::Debug for InFlight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlight").field("task", &self.task).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::HttpRequest;
    use crate::test_support::{MockTransport, Reply};

    #[test]
    fn test_builders_do_not_leak_into_clones() {
        let base = Session::new(MockTransport::new()).base_url("https://a.example.com");
        let other = base.clone().base_url("https://b.example.com").max_redirects(1);

        assert_eq!(
            base.configuration().get::<BaseUrl>().as_deref(),
            Some("https://a.example.com")
        );
        assert_eq!(base.configuration().get::<MaxRedirects>(), 10);
        assert_eq!(other.configuration().get::<MaxRedirects>(), 1);
    }

    #[test]
    fn test_clones_share_task_registry() {
        let session = Session::new(MockTransport::new());
        let clone = session.clone().without_authorization();
        let task = Arc::new(Task::new("shared"));
        session.tasks().add(task.clone());
        assert!(clone.task(task.id()).is_some());
    }

    #[test]
    fn test_without_authorization() {
        let session = Session::new(MockTransport::new())
            .authorization(crate::auth::BasicAuth::new("user", "pass"));
        assert!(session.configuration().get::<Authorization>().is_some());
        assert!(session.without_authorization().configuration().get::<Authorization>().is_none());
        assert!(session.configuration().get::<Authorization>().is_some());
    }

    #[test]
    fn test_on_request_appends() {
        let session = Session::new(MockTransport::new())
            .on_request(crate::interceptor::HeaderInterceptor::new("x-a", "1"))
            .on_request(crate::interceptor::HeaderInterceptor::new("x-b", "2"));
        assert_eq!(session.configuration().get::<RequestInterceptors>().len(), 2);
    }

    #[tokio::test]
    async fn test_send_without_base_url() {
        let mock = MockTransport::new();
        let err = Session::new(mock.clone())
            .send(&HttpRequest::get().path("/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequestUrl(_)));
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_send_json() {
        #[derive(serde::Deserialize)]
        struct User {
            name: String,
        }

        let mock = MockTransport::replies([Reply::body(200, r#"{"name":"ada"}"#)]);
        let user = Session::new(mock)
            .base_url("https://api.example.com")
            .send_json::<User>(&HttpRequest::get().path("/users/1"))
            .await
            .unwrap();
        assert_eq!(user.name, "ada");
    }

    #[tokio::test]
    async fn test_spawn_registers_immediately() {
        let mock = MockTransport::responder(|_| Reply::Pending);
        let session = Session::new(mock).base_url("https://api.example.com");

        let call = session.spawn(HttpRequest::get().named("pending"));
        let task = session.task(call.id()).unwrap();
        assert_eq!(task.request_id(), "pending");

        call.cancel();
        assert!(call.await.unwrap_err().is_cancelled());
        assert!(session.tasks().is_empty());
    }
}
