//! In-flight work.
//!
//! A [`Task`] is one execution of a request through the pipeline. It owns the
//! mutable execution state (retry count, auth-retry flag, redirect count) and
//! the cancellation signal. All state sits behind the task's own lock and is
//! only reachable through its methods.

mod registry;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use http::StatusCode;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};

use crate::request::WireRequest;
use crate::Error;

pub use registry::TaskRegistry;
pub(crate) use registry::Registration;

/// Identity of a task within its registry.
///
/// Ids are assigned from a process-wide counter, so two tasks never share
/// one even when they run identical requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TaskId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// A transport call running as its own tokio task.
///
/// `done` closes once the call's future has been dropped, whether it ran to
/// completion or was aborted.
#[derive(Debug)]
pub(crate) struct CallHandle {
    abort: AbortHandle,
    done: watch::Receiver<()>,
}

impl CallHandle {
    /// Spawn `call` and return its join handle along with the handle a task
    /// keeps to abort it.
    pub(crate) fn spawn<F>(call: F) -> (JoinHandle<F::Output>, CallHandle)
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (done, watcher) = watch::channel(());
        let join = tokio::spawn(async move {
            let _done = done;
            call.await
        });
        let handle = CallHandle {
            abort: join.abort_handle(),
            done: watcher,
        };
        (join, handle)
    }

    pub(crate) fn abort(&self) {
        self.abort.abort();
    }

    /// Resolves once the call's future is gone.
    pub(crate) async fn finished(mut self) {
        // Nothing is ever sent; this only returns when the sender drops.
        let _ = self.done.changed().await;
    }
}

#[derive(Default)]
struct TaskState {
    retry_count: u32,
    auth_retried: bool,
    /// Credential generation applied to the most recent attempt.
    auth_generation: Option<u64>,
    redirect_count: usize,
    /// The transport call currently in flight.
    call: Option<CallHandle>,
    /// The most recently sent wire request.
    wire: Option<WireRequest>,
}

/// One in-flight execution of a request.
pub struct Task {
    id: TaskId,
    request_id: String,
    state: Mutex<TaskState>,
    cancelled: watch::Sender<bool>,
}

impl Task {
    pub fn new(request_id: impl Into<String>) -> Self {
        let (cancelled, _) = watch::channel(false);
        Self {
            id: TaskId::next(),
            request_id: request_id.into(),
            state: Mutex::new(TaskState::default()),
            cancelled,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The [`Request::id`](crate::Request::id) of the request being executed.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn retry_count(&self) -> u32 {
        self.lock().retry_count
    }

    /// Whether the one automatic re-authentication has been spent.
    pub fn auth_retried(&self) -> bool {
        self.lock().auth_retried
    }

    /// Redirects followed, summed over every attempt.
    pub fn redirect_count(&self) -> usize {
        self.lock().redirect_count
    }

    /// The wire request most recently sent for this task.
    pub fn wire_request(&self) -> Option<WireRequest> {
        self.lock().wire.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Cancel the task.
    ///
    /// The pipeline stops at its next stage transition and any transport
    /// call in flight is aborted.
    pub fn cancel(&self) {
        self.cancel_in_flight();
    }

    /// Cancel and hand back the interrupted transport call, if there was
    /// one.
    pub(crate) fn cancel_in_flight(&self) -> Option<CallHandle> {
        self.cancelled.send_replace(true);
        let call = self.lock().call.take();
        if let Some(call) = &call {
            call.abort();
        }
        call
    }

    /// Resolves once the task has been cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.cancelled.subscribe();
        // The sender lives as long as `self`, so this only returns once the
        // flag is set.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }

    /// A snapshot of the task's counters.
    pub fn context(&self) -> Context {
        let state = self.lock();
        Context {
            task_id: self.id,
            status: None,
            error: None,
            retry_count: state.retry_count,
            auth_retried: state.auth_retried,
        }
    }

    /// Attach a transport call that just started. A task that is already
    /// cancelled aborts it immediately.
    pub(crate) fn attach(&self, call: CallHandle) {
        let mut state = self.lock();
        if self.is_cancelled() {
            call.abort();
        } else {
            state.call = Some(call);
        }
    }

    pub(crate) fn detach(&self) {
        self.lock().call = None;
    }

    pub(crate) fn record_retry(&self) -> u32 {
        let mut state = self.lock();
        state.retry_count += 1;
        state.retry_count
    }

    pub(crate) fn mark_auth_retried(&self) {
        self.lock().auth_retried = true;
    }

    pub(crate) fn auth_generation(&self) -> Option<u64> {
        self.lock().auth_generation
    }

    pub(crate) fn set_auth_generation(&self, generation: Option<u64>) {
        self.lock().auth_generation = generation;
    }

    pub(crate) fn record_redirect(&self) -> usize {
        let mut state = self.lock();
        state.redirect_count += 1;
        state.redirect_count
    }

    pub(crate) fn set_wire_request(&self, wire: WireRequest) {
        self.lock().wire = Some(wire);
    }

    fn lock(&self) -> MutexGuard<'_, TaskState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("request_id", &self.request_id)
            .field("retry_count", &state.retry_count)
            .field("auth_retried", &state.auth_retried)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Immutable snapshot of a task's execution state, handed to interceptors.
#[derive(Clone, Debug)]
pub struct Context {
    pub task_id: TaskId,
    /// Status of the latest response, if any.
    pub status: Option<StatusCode>,
    /// The latest error, if any.
    pub error: Option<Error>,
    pub retry_count: u32,
    pub auth_retried: bool,
}

impl Context {
    pub fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            status: None,
            error: None,
            retry_count: 0,
            auth_retried: false,
        }
    }

    /// Record `error`, taking the status from its response when it has one.
    pub fn with_error(mut self, error: Error) -> Self {
        if let Some(response) = error.response() {
            self.status = Some(response.status());
        }
        self.error = Some(error);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_task_ids_are_unique() {
        let a = Task::new("same");
        let b = Task::new("same");
        assert_ne!(a.id(), b.id());
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_counters() {
        let task = Task::new("counters");
        assert_eq!(task.record_retry(), 1);
        assert_eq!(task.record_retry(), 2);
        assert_eq!(task.record_redirect(), 1);
        task.mark_auth_retried();

        let context = task.context();
        assert_eq!(context.task_id, task.id());
        assert_eq!(context.retry_count, 2);
        assert!(context.auth_retried);
        assert_eq!(task.redirect_count(), 1);
    }

    #[test]
    fn test_context_with_status_error() {
        use crate::response::RawResponse;
        use bytes::Bytes;
        use wirecall_core::StatusError;

        let error = Error::status(
            StatusError::ServiceUnavailable,
            RawResponse::new(
                StatusCode::SERVICE_UNAVAILABLE,
                Default::default(),
                Bytes::new(),
                "https://api.example.com/".parse().unwrap(),
            ),
        );
        let context = Context::new(TaskId::next()).with_error(error);
        assert_eq!(context.status, Some(StatusCode::SERVICE_UNAVAILABLE));
        assert!(context.error.is_some());

        let context = Context::new(TaskId::next()).with_error(Error::Cancelled);
        assert_eq!(context.status, None);
    }

    #[tokio::test]
    async fn test_cancel_aborts_attached_call() {
        let task = Task::new("abort");
        let (call, handle) = CallHandle::spawn(std::future::pending::<()>());
        task.attach(handle);

        task.cancel();
        assert!(task.is_cancelled());
        assert!(call.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_attach_after_cancel_aborts_immediately() {
        let task = Task::new("late");
        task.cancel();

        let (call, handle) = CallHandle::spawn(std::future::pending::<()>());
        task.attach(handle);
        assert!(call.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiters() {
        let task = std::sync::Arc::new(Task::new("wait"));
        let waiter = tokio::spawn({
            let task = task.clone();
            async move { task.cancelled().await }
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!waiter.is_finished());
        task.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
