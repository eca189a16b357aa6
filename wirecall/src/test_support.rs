//! Scripted transport for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};

use crate::transport::{BoxFuture, Transport, TransportBody};
use crate::TransportError;

/// A request as the transport saw it.
#[derive(Clone, Debug)]
pub(crate) struct Recorded {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// What the mock does with one request.
#[derive(Clone, Debug)]
pub(crate) enum Reply {
    Respond {
        status: u16,
        headers: Vec<(&'static str, String)>,
        body: Bytes,
    },
    Fail(TransportError),
    /// Never completes.
    Pending,
    Delayed(Duration, Box<Reply>),
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Reply::Respond {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn body(status: u16, body: &'static str) -> Self {
        Reply::Respond {
            status,
            headers: Vec::new(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    pub fn header(self, name: &'static str, value: impl Into<String>) -> Self {
        match self {
            Reply::Respond {
                status,
                mut headers,
                body,
            } => {
                headers.push((name, value.into()));
                Reply::Respond {
                    status,
                    headers,
                    body,
                }
            }
            other => other,
        }
    }

    pub fn after(self, delay: Duration) -> Self {
        Reply::Delayed(delay, Box::new(self))
    }

    fn into_future(self) -> BoxFuture<'static, Result<http::Response<Bytes>, TransportError>> {
        match self {
            Reply::Respond {
                status,
                headers,
                body,
            } => {
                let mut response = http::Response::new(body);
                *response.status_mut() = StatusCode::from_u16(status).unwrap();
                for (name, value) in headers {
                    response.headers_mut().append(
                        HeaderName::from_static(name),
                        HeaderValue::from_str(&value).unwrap(),
                    );
                }
                Box::pin(std::future::ready(Ok(response)))
            }
            Reply::Fail(error) => Box::pin(std::future::ready(Err(error))),
            Reply::Pending => Box::pin(std::future::pending()),
            Reply::Delayed(delay, inner) => Box::pin(async move {
                tokio::time::sleep(delay).await;
                inner.into_future().await
            }),
        }
    }
}

type Responder = Arc<dyn Fn(&Recorded) -> Reply + Send + Sync>;

#[derive(Default)]
struct MockState {
    replies: VecDeque<Reply>,
    recorded: Vec<Recorded>,
}

/// Replays queued replies in order, then falls back to `200 OK`, or asks a
/// responder closure when one is installed.
#[derive(Clone)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<MockState>>,
    responder: Option<Responder>,
    forbid_safe_bodies: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            responder: None,
            forbid_safe_bodies: false,
        }
    }

    pub fn replies<I: IntoIterator<Item = Reply>>(replies: I) -> Self {
        let mock = Self::new();
        mock.state.lock().unwrap().replies.extend(replies);
        mock
    }

    pub fn responder<F>(responder: F) -> Self
    where
        F: Fn(&Recorded) -> Reply + Send + Sync + 'static,
    {
        Self {
            responder: Some(Arc::new(responder)),
            ..Self::new()
        }
    }

    pub fn forbid_safe_bodies(mut self) -> Self {
        self.forbid_safe_bodies = true;
        self
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().recorded.clone()
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().recorded.len()
    }
}

impl Transport for MockTransport {
    fn send(
        &self,
        request: http::Request<TransportBody>,
    ) -> BoxFuture<'static, Result<http::Response<Bytes>, TransportError>> {
        let (parts, mut body) = request.into_parts();
        let recorded = Recorded {
            method: parts.method,
            uri: parts.uri.to_string(),
            headers: parts.headers,
            body: body.take_bytes(),
        };

        let reply = {
            let mut state = self.state.lock().unwrap();
            let reply = match &self.responder {
                Some(responder) => responder(&recorded),
                None => state
                    .replies
                    .pop_front()
                    .unwrap_or_else(|| Reply::status(200)),
            };
            state.recorded.push(recorded);
            reply
        };
        reply.into_future()
    }

    fn allows_body(&self, method: &Method) -> bool {
        !(self.forbid_safe_bodies && (*method == Method::GET || *method == Method::HEAD))
    }
}
