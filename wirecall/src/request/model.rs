//! The declarative request model.
//!
//! A [`Request`] is an immutable value: an identifier, its own modifiers and
//! the request it wraps. Wrapping lets a request reuse another one wholesale
//! and layer more specific modifiers on the outside:
//!
//! ```ignore
//! use wirecall::{HttpRequest, Request, Modifier, Contents};
//! use std::sync::Arc;
//!
//! struct ListUsers;
//!
//! impl Request for ListUsers {
//!     fn modifiers(&self) -> Vec<Arc<dyn Modifier>> {
//!         vec![wirecall::request::path("/users")]
//!     }
//! }
//!
//! // An admin listing is a user listing plus one header.
//! let request = HttpRequest::new()
//!     .named("ListAdmins")
//!     .header("x-role", "admin")
//!     .contents(ListUsers);
//! ```

use std::sync::Arc;
use std::time::Duration;

use http::{HeaderName, HeaderValue, Method};
use serde::Serialize;
use url::Url;
use wirecall_core::{BoxedEncoder, Encoder, Form, Json};

use super::modifier::{self, Modifier};
use super::wire::WireRequest;
use crate::cache::CachePolicy;
use crate::config::keys::{BaseUrl, RequestUrl, Timeout};
use crate::config::{ConfigKey, Configuration};
use crate::Error;

/// What a request delegates to.
pub enum Contents<'a> {
    Borrowed(&'a dyn Request),
    Owned(Box<dyn Request + 'a>),
    /// Terminal marker: nothing further to delegate to.
    End,
}

impl Contents<'_> {
    fn as_request(&self) -> Option<&dyn Request> {
        match self {
            Contents::Borrowed(request) => Some(*request),
            Contents::Owned(request) => Some(request.as_ref()),
            Contents::End => None,
        }
    }
}

/// A declarative description of an HTTP call.
pub trait Request: Send + Sync {
    /// Identifier used in logs and task records. Defaults to the type name.
    fn id(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }

    /// This request's own modifiers, applied before those of its contents.
    fn modifiers(&self) -> Vec<Arc<dyn Modifier>> {
        Vec::new()
    }

    /// The wrapped request, or [`Contents::End`].
    fn contents(&self) -> Contents<'_> {
        Contents::End
    }
}

impl<T: Request + ?Sized> Request for &T {
    fn id(&self) -> String {
        (**self).id()
    }

    fn modifiers(&self) -> Vec<Arc<dyn Modifier>> {
        (**self).modifiers()
    }

    fn contents(&self) -> Contents<'_> {
        (**self).contents()
    }
}

impl<T: Request + ?Sized> Request for Box<T> {
    fn id(&self) -> String {
        (**self).id()
    }

    fn modifiers(&self) -> Vec<Arc<dyn Modifier>> {
        (**self).modifiers()
    }

    fn contents(&self) -> Contents<'_> {
        (**self).contents()
    }
}

impl<T: Request + ?Sized> Request for Arc<T> {
    fn id(&self) -> String {
        (**self).id()
    }

    fn modifiers(&self) -> Vec<Arc<dyn Modifier>> {
        (**self).modifiers()
    }

    fn contents(&self) -> Contents<'_> {
        (**self).contents()
    }
}

/// Flatten a request's modifiers: its own, then those of its contents,
/// recursively.
pub fn effective_modifiers(request: &dyn Request) -> Vec<Arc<dyn Modifier>> {
    let mut modifiers = request.modifiers();
    if let Some(inner) = request.contents().as_request() {
        modifiers.extend(effective_modifiers(inner));
    }
    modifiers
}

/// Build the wire request for `request` under `configuration`.
///
/// Modifiers first contribute their request-scoped configuration, then the
/// URL is resolved as the explicit request URL or else the base URL, and
/// finally every modifier is folded over a GET to that URL. The first
/// modifier failure aborts the build.
///
/// Building is pure: the same request and configuration always produce the
/// same wire request.
pub fn build_wire_request(
    request: &dyn Request,
    configuration: &Configuration,
) -> Result<WireRequest, Error> {
    let modifiers = effective_modifiers(request);
    let scoped = scope_configuration(&modifiers, configuration);
    fold_modifiers(&modifiers, &scoped)
}

pub(crate) fn scope_configuration(
    modifiers: &[Arc<dyn Modifier>],
    configuration: &Configuration,
) -> Configuration {
    let mut scoped = configuration.clone();
    for modifier in modifiers {
        modifier.configure(&mut scoped);
    }
    scoped
}

pub(crate) fn fold_modifiers(
    modifiers: &[Arc<dyn Modifier>],
    configuration: &Configuration,
) -> Result<WireRequest, Error> {
    let url = resolve_url(configuration)?;
    let mut wire = WireRequest::new(url);
    wire.timeout = configuration.get::<Timeout>();
    modifiers
        .iter()
        .try_fold(wire, |wire, modifier| modifier.modify(wire))
}

fn resolve_url(configuration: &Configuration) -> Result<Url, Error> {
    let raw = configuration
        .get::<RequestUrl>()
        .or_else(|| configuration.get::<BaseUrl>())
        .ok_or_else(|| {
            Error::InvalidRequestUrl("no request url and no base url configured".to_string())
        })?;
    Url::parse(&raw).map_err(|e| Error::InvalidRequestUrl(format!("{raw}: {e}")))
}

/// A general-purpose request assembled with builder methods.
///
/// # Example
///
/// ```ignore
/// use wirecall::HttpRequest;
///
/// let request = HttpRequest::post()
///     .path("/v1/orders")
///     .query("dry_run", "true")
///     .json(&order)
///     .timeout(Duration::from_secs(5));
/// ```
#[derive(Clone, Default)]
pub struct HttpRequest {
    name: Option<String>,
    modifiers: Vec<Arc<dyn Modifier>>,
    contents: Option<Arc<dyn Request>>,
}

impl HttpRequest {
    /// An empty request. Without modifiers it is a GET to the base URL.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get() -> Self {
        Self::new().method(Method::GET)
    }

    pub fn post() -> Self {
        Self::new().method(Method::POST)
    }

    pub fn put() -> Self {
        Self::new().method(Method::PUT)
    }

    pub fn patch() -> Self {
        Self::new().method(Method::PATCH)
    }

    pub fn delete() -> Self {
        Self::new().method(Method::DELETE)
    }

    /// Add an arbitrary modifier.
    pub fn modifier<M: Modifier>(mut self, modifier: M) -> Self {
        self.modifiers.push(Arc::new(modifier));
        self
    }

    pub fn method(self, method: Method) -> Self {
        self.modifier(modifier::SetMethod(method))
    }

    /// Target an explicit URL instead of the session's base URL.
    pub fn url(self, url: impl Into<String>) -> Self {
        self.modifier(modifier::ExplicitUrl(url.into()))
    }

    pub fn path(self, path: impl Into<String>) -> Self {
        self.modifier(modifier::Path(path.into()))
    }

    /// Set a header.
    ///
    /// # Panics
    ///
    /// Panics if the name or value is not a valid header. Use
    /// [`try_header`](Self::try_header) for untrusted input.
    pub fn header(self, name: &str, value: &str) -> Self {
        self.modifiers_push(header(name, value))
    }

    /// Set a header, failing on an invalid name or value.
    pub fn try_header(self, name: &str, value: &str) -> Result<Self, Error> {
        Ok(self.modifiers_push(try_header(name, value)?))
    }

    pub fn query(self, key: impl Into<String>, value: impl ToString) -> Self {
        self.modifier(modifier::Query {
            key: key.into(),
            value: value.to_string(),
        })
    }

    /// Attach a JSON body. The value is serialized when the wire request is
    /// built.
    pub fn json<T: Serialize + Send + Sync + 'static>(self, value: T) -> Self {
        self.body(Json(value))
    }

    /// Attach a URL-encoded form body.
    pub fn form<T: Serialize + Send + Sync + 'static>(self, value: T) -> Self {
        self.body(Form(value))
    }

    pub fn body<E: Encoder>(self, encoder: E) -> Self {
        self.modifier(modifier::Body(BoxedEncoder::new(encoder)))
    }

    pub fn timeout(self, timeout: Duration) -> Self {
        self.modifier(modifier::Timeout(timeout))
    }

    pub fn cache_policy(self, policy: CachePolicy) -> Self {
        self.modifier(modifier::SetCachePolicy(policy))
    }

    /// Override a configuration key for this request only.
    pub fn configure<K: ConfigKey>(self, value: K::Value) -> Self {
        self.modifier(modifier::Configure::<K>::new(value))
    }

    /// Set the identifier reported by [`Request::id`].
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Wrap another request. Its modifiers apply after this request's.
    pub fn contents<R: Request + 'static>(mut self, request: R) -> Self {
        self.contents = Some(Arc::new(request));
        self
    }

    fn modifiers_push(mut self, modifier: Arc<dyn Modifier>) -> Self {
        self.modifiers.push(modifier);
        self
    }
}

impl Request for HttpRequest {
    fn id(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| std::any::type_name::<Self>().to_string())
    }

    fn modifiers(&self) -> Vec<Arc<dyn Modifier>> {
        self.modifiers.clone()
    }

    fn contents(&self) -> Contents<'_> {
        match &self.contents {
            Some(request) => Contents::Borrowed(request.as_ref()),
            None => Contents::End,
        }
    }
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequest")
            .field("id", &self.id())
            .field("modifiers", &self.modifiers.len())
            .field("contents", &self.contents.as_ref().map(|c| c.id()))
            .finish()
    }
}

// Modifier constructors for hand-written `Request` impls.

pub fn method(method: Method) -> Arc<dyn Modifier> {
    Arc::new(modifier::SetMethod(method))
}

pub fn url(url: impl Into<String>) -> Arc<dyn Modifier> {
    Arc::new(modifier::ExplicitUrl(url.into()))
}

pub fn path(path: impl Into<String>) -> Arc<dyn Modifier> {
    Arc::new(modifier::Path(path.into()))
}

/// # Panics
///
/// Panics if the name or value is not a valid header.
pub fn header(name: &str, value: &str) -> Arc<dyn Modifier> {
    match try_header(name, value) {
        Ok(modifier) => modifier,
        Err(e) => panic!("{e}"),
    }
}

pub fn try_header(name: &str, value: &str) -> Result<Arc<dyn Modifier>, Error> {
    let name = HeaderName::try_from(name)
        .map_err(|e| Error::Build(format!("invalid header name {name:?}: {e}")))?;
    let value = HeaderValue::try_from(value)
        .map_err(|e| Error::Build(format!("invalid value for header {name}: {e}")))?;
    Ok(Arc::new(modifier::SetHeader { name, value }))
}

pub fn query(key: impl Into<String>, value: impl ToString) -> Arc<dyn Modifier> {
    Arc::new(modifier::Query {
        key: key.into(),
        value: value.to_string(),
    })
}

pub fn json<T: Serialize + Send + Sync + 'static>(value: T) -> Arc<dyn Modifier> {
    body(Json(value))
}

pub fn form<T: Serialize + Send + Sync + 'static>(value: T) -> Arc<dyn Modifier> {
    body(Form(value))
}

pub fn body<E: Encoder>(encoder: E) -> Arc<dyn Modifier> {
    Arc::new(modifier::Body(BoxedEncoder::new(encoder)))
}

pub fn timeout(timeout: Duration) -> Arc<dyn Modifier> {
    Arc::new(modifier::Timeout(timeout))
}

pub fn cache_policy(policy: CachePolicy) -> Arc<dyn Modifier> {
    Arc::new(modifier::SetCachePolicy(policy))
}

pub fn configure<K: ConfigKey>(value: K::Value) -> Arc<dyn Modifier> {
    Arc::new(modifier::Configure::<K>::new(value))
}
