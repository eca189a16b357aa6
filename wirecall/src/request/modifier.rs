//! Modifiers: small, pure transformations of a [`WireRequest`].
//!
//! A modifier never performs I/O. Apart from body encoding every stock
//! modifier is total. Modifiers may also contribute request-scoped
//! configuration through [`Modifier::configure`], which runs before the URL
//! is resolved.

use std::marker::PhantomData;
use std::time::Duration;

use http::{HeaderName, HeaderValue, Method, header};
use wirecall_core::BoxedEncoder;

use super::wire::WireRequest;
use crate::cache::CachePolicy;
use crate::config::keys::RequestUrl;
use crate::config::{ConfigKey, Configuration};
use crate::Error;

/// A transformation applied to a wire request while it is being built.
///
/// # Example
///
/// ```ignore
/// use wirecall::{Error, Modifier, WireRequest};
///
/// struct Trace(&'static str);
///
/// impl Modifier for Trace {
///     fn modify(&self, mut request: WireRequest) -> Result<WireRequest, Error> {
///         request.headers.insert("x-trace", self.0.parse().unwrap());
///         Ok(request)
///     }
/// }
/// ```
pub trait Modifier: Send + Sync + 'static {
    fn modify(&self, request: WireRequest) -> Result<WireRequest, Error>;

    /// Contribute request-scoped configuration.
    ///
    /// Called on a per-request copy of the session configuration before the
    /// wire request is built.
    fn configure(&self, configuration: &mut Configuration) {
        let _ = configuration;
    }
}

/// Sets the HTTP method.
#[derive(Debug, Clone)]
pub struct SetMethod(pub Method);

impl Modifier for SetMethod {
    fn modify(&self, mut request: WireRequest) -> Result<WireRequest, Error> {
        request.method = self.0.clone();
        Ok(request)
    }
}

/// Sets a header, replacing earlier values for the same name.
#[derive(Debug, Clone)]
pub struct SetHeader {
    pub name: HeaderName,
    pub value: HeaderValue,
}

impl Modifier for SetHeader {
    fn modify(&self, mut request: WireRequest) -> Result<WireRequest, Error> {
        request.headers.insert(self.name.clone(), self.value.clone());
        Ok(request)
    }
}

/// Adds a header value, keeping earlier values for the same name.
#[derive(Debug, Clone)]
pub struct AppendHeader {
    pub name: HeaderName,
    pub value: HeaderValue,
}

impl Modifier for AppendHeader {
    fn modify(&self, mut request: WireRequest) -> Result<WireRequest, Error> {
        request.headers.append(self.name.clone(), self.value.clone());
        Ok(request)
    }
}

/// Appends one `key=value` pair to the query string.
#[derive(Debug, Clone)]
pub struct Query {
    pub key: String,
    pub value: String,
}

impl Modifier for Query {
    fn modify(&self, mut request: WireRequest) -> Result<WireRequest, Error> {
        request
            .url
            .query_pairs_mut()
            .append_pair(&self.key, &self.value);
        Ok(request)
    }
}

/// Appends path segments to the URL.
///
/// Segments are split on `/` and percent-encoded individually, so
/// `path("/users/a b")` on `https://host/v1` yields
/// `https://host/v1/users/a%20b`.
#[derive(Debug, Clone)]
pub struct Path(pub String);

impl Modifier for Path {
    fn modify(&self, mut request: WireRequest) -> Result<WireRequest, Error> {
        let not_a_base = || Error::InvalidRequestUrl(format!("cannot append a path to {}", self.0));
        if request.url.cannot_be_a_base() {
            return Err(not_a_base());
        }
        request
            .url
            .path_segments_mut()
            .map_err(|_| not_a_base())?
            .pop_if_empty()
            .extend(self.0.split('/').filter(|segment| !segment.is_empty()));
        Ok(request)
    }
}

/// Encodes and attaches a body.
///
/// Sets `content-type` from the encoder unless one is already present.
#[derive(Debug, Clone)]
pub struct Body(pub BoxedEncoder);

impl Modifier for Body {
    fn modify(&self, mut request: WireRequest) -> Result<WireRequest, Error> {
        let bytes = self.0.encode()?;
        if !request.headers.contains_key(header::CONTENT_TYPE) {
            let value = HeaderValue::from_str(self.0.content_type())
                .map_err(|e| Error::Build(format!("invalid content type: {e}")))?;
            request.headers.insert(header::CONTENT_TYPE, value);
        }
        request.body = Some(bytes);
        Ok(request)
    }
}

/// Sets the per-attempt timeout.
#[derive(Debug, Clone, Copy)]
pub struct Timeout(pub Duration);

impl Modifier for Timeout {
    fn modify(&self, mut request: WireRequest) -> Result<WireRequest, Error> {
        request.timeout = Some(self.0);
        Ok(request)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SetCachePolicy(pub CachePolicy);

impl Modifier for SetCachePolicy {
    fn modify(&self, mut request: WireRequest) -> Result<WireRequest, Error> {
        request.cache_policy = self.0;
        Ok(request)
    }
}

/// Targets an explicit URL instead of the session's base URL.
#[derive(Debug, Clone)]
pub struct ExplicitUrl(pub String);

impl Modifier for ExplicitUrl {
    fn modify(&self, request: WireRequest) -> Result<WireRequest, Error> {
        Ok(request)
    }

    fn configure(&self, configuration: &mut Configuration) {
        configuration.set::<RequestUrl>(Some(self.0.clone()));
    }
}

/// Overrides one configuration key for a single request.
pub struct Configure<K: ConfigKey> {
    value: K::Value,
    _key: PhantomData<fn() -> K>,
}

impl<K: ConfigKey> Configure<K> {
    pub fn new(value: K::Value) -> Self {
        Self {
            value,
            _key: PhantomData,
        }
    }
}

impl<K: ConfigKey> Modifier for Configure<K> {
    fn modify(&self, request: WireRequest) -> Result<WireRequest, Error> {
        Ok(request)
    }

    fn configure(&self, configuration: &mut Configuration) {
        configuration.set::<K>(self.value.clone());
    }
}

impl<K: ConfigKey> std::fmt::Debug for Configure<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configure")
            .field("key", &std::any::type_name::<K>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wirecall_core::{EncodingError, Encoder, Json, Raw};

    fn base() -> WireRequest {
        WireRequest::new("https://api.example.com".parse().unwrap())
    }

    #[test]
    fn test_path_appends_segments() {
        let wire = Path("/v1".into()).modify(base()).unwrap();
        assert_eq!(wire.url.as_str(), "https://api.example.com/v1");

        let wire = Path("users/a b/".into()).modify(wire).unwrap();
        assert_eq!(wire.url.as_str(), "https://api.example.com/v1/users/a%20b");
    }

    #[test]
    fn test_path_on_cannot_be_a_base_url() {
        let wire = WireRequest::new("mailto:ops@example.com".parse().unwrap());
        let err = Path("x".into()).modify(wire).unwrap_err();
        assert!(matches!(err, Error::InvalidRequestUrl(_)));
    }

    #[test]
    fn test_query_appends_pairs() {
        let wire = Query {
            key: "q".into(),
            value: "x y".into(),
        }
        .modify(base())
        .unwrap();
        let wire = Query {
            key: "q".into(),
            value: "z".into(),
        }
        .modify(wire)
        .unwrap();
        assert_eq!(wire.url.query(), Some("q=x+y&q=z"));
    }

    #[test]
    fn test_set_header_replaces_append_header_keeps() {
        let name = HeaderName::from_static("x-tag");
        let set = |v: &'static str| SetHeader {
            name: name.clone(),
            value: HeaderValue::from_static(v),
        };

        let wire = set("a").modify(base()).unwrap();
        let wire = set("b").modify(wire).unwrap();
        assert_eq!(wire.headers.get_all(&name).iter().count(), 1);
        assert_eq!(wire.headers[&name], "b");

        let wire = AppendHeader {
            name: name.clone(),
            value: HeaderValue::from_static("c"),
        }
        .modify(wire)
        .unwrap();
        assert_eq!(wire.headers.get_all(&name).iter().count(), 2);
    }

    #[test]
    fn test_body_sets_content_type_once() {
        let wire = Body(BoxedEncoder::new(Json(serde_json::json!({"a": 1}))))
            .modify(base())
            .unwrap();
        assert_eq!(wire.headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(wire.body.as_deref(), Some(&b"{\"a\":1}"[..]));

        let mut explicit = base();
        explicit
            .headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"));
        let wire = Body(BoxedEncoder::new(Raw::text("a,b")))
            .modify(explicit)
            .unwrap();
        assert_eq!(wire.headers[header::CONTENT_TYPE], "text/csv");
    }

    #[test]
    fn test_body_encoding_failure() {
        struct Broken;

        impl Encoder for Broken {
            fn content_type(&self) -> &'static str {
                "application/json"
            }

            fn encode(&self) -> Result<bytes::Bytes, EncodingError> {
                Err(EncodingError::Json("key must be a string".into()))
            }
        }

        let err = Body(BoxedEncoder::new(Broken)).modify(base()).unwrap_err();
        assert!(matches!(err, Error::Encoding(EncodingError::Json(_))));
    }

    #[test]
    fn test_configure_writes_scope() {
        let mut config = Configuration::new();
        Configure::<crate::config::keys::MaxRedirects>::new(3).configure(&mut config);
        ExplicitUrl("https://other.example.com".into()).configure(&mut config);
        assert_eq!(config.get::<crate::config::keys::MaxRedirects>(), 3);
        assert_eq!(
            config.get::<RequestUrl>().as_deref(),
            Some("https://other.example.com")
        );
    }
}
