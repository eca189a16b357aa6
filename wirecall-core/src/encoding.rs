//! Request body encoders.
//!
//! This module provides the [`Encoder`] trait, the single contract the
//! request pipeline relies on for bodies, and the stock encoders:
//! - [`Json`]: serializes a value with `serde_json`
//! - [`Form`]: serializes a value as `application/x-www-form-urlencoded` with `serde_qs`
//! - [`Raw`]: pre-encoded bytes with an explicit content type

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

/// Error produced when a body cannot be encoded.
///
/// Encoding is deterministic, so these errors are never retried.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    #[error("json encoding failed: {0}")]
    Json(String),

    #[error("form encoding failed: {0}")]
    Form(String),

    #[error("{0}")]
    Custom(String),
}

/// Encoder trait for request bodies.
///
/// An encoder owns the value it encodes. The pipeline calls [`encode`](Encoder::encode)
/// every time it builds a wire request, so implementations must be pure.
///
/// # Example
///
/// ```ignore
/// use wirecall_core::{Encoder, EncodingError};
/// use bytes::Bytes;
///
/// struct Csv(Vec<Vec<String>>);
///
/// impl Encoder for Csv {
///     fn content_type(&self) -> &'static str { "text/csv" }
///
///     fn encode(&self) -> Result<Bytes, EncodingError> {
///         let text = self.0.iter().map(|row| row.join(",")).collect::<Vec<_>>().join("\n");
///         Ok(Bytes::from(text))
///     }
/// }
/// ```
pub trait Encoder: Send + Sync + 'static {
    /// The `Content-Type` the encoded bytes should be sent with.
    fn content_type(&self) -> &'static str;

    /// Encode the owned value.
    fn encode(&self) -> Result<Bytes, EncodingError>;
}

/// A shared encoder for type-erased storage in modifiers.
#[derive(Clone)]
pub struct BoxedEncoder(Arc<dyn Encoder>);

impl BoxedEncoder {
    pub fn new<E: Encoder>(encoder: E) -> Self {
        BoxedEncoder(Arc::new(encoder))
    }

    pub fn content_type(&self) -> &'static str {
        self.0.content_type()
    }

    pub fn encode(&self) -> Result<Bytes, EncodingError> {
        self.0.encode()
    }
}

impl std::fmt::Debug for BoxedEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BoxedEncoder")
            .field(&self.content_type())
            .finish()
    }
}

/// JSON body encoder.
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T> Encoder for Json<T>
where
    T: Serialize + Send + Sync + 'static,
{
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode(&self) -> Result<Bytes, EncodingError> {
        serde_json::to_vec(&self.0)
            .map(Bytes::from)
            .map_err(|e| EncodingError::Json(e.to_string()))
    }
}

/// URL-encoded form body encoder.
///
/// Nested structures use the bracket notation understood by most form
/// parsers (`user[name]=x`).
#[derive(Debug, Clone)]
pub struct Form<T>(pub T);

impl<T> Encoder for Form<T>
where
    T: Serialize + Send + Sync + 'static,
{
    fn content_type(&self) -> &'static str {
        "application/x-www-form-urlencoded"
    }

    fn encode(&self) -> Result<Bytes, EncodingError> {
        serde_qs::to_string(&self.0)
            .map(Bytes::from)
            .map_err(|e| EncodingError::Form(e.to_string()))
    }
}

/// Pre-encoded body bytes.
#[derive(Debug, Clone)]
pub struct Raw {
    content_type: &'static str,
    bytes: Bytes,
}

impl Raw {
    pub fn new(content_type: &'static str, bytes: impl Into<Bytes>) -> Self {
        Self {
            content_type,
            bytes: bytes.into(),
        }
    }

    /// Bytes sent as `application/octet-stream`.
    pub fn octets(bytes: impl Into<Bytes>) -> Self {
        Self::new("application/octet-stream", bytes)
    }

    /// UTF-8 text sent as `text/plain; charset=utf-8`.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new("text/plain; charset=utf-8", Bytes::from(text.into()))
    }
}

impl Encoder for Raw {
    fn content_type(&self) -> &'static str {
        self.content_type
    }

    fn encode(&self) -> Result<Bytes, EncodingError> {
        // Bytes clones are reference-counted.
        Ok(self.bytes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct User {
        name: &'static str,
        age: u32,
    }

    #[test]
    fn test_json_encoder() {
        let encoder = Json(User { name: "ada", age: 36 });
        assert_eq!(encoder.content_type(), "application/json");
        assert_eq!(encoder.encode().unwrap(), Bytes::from(r#"{"name":"ada","age":36}"#));
    }

    #[test]
    fn test_json_encoder_failure() {
        // Maps with non-string keys cannot be represented as JSON objects.
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], "value");
        let err = Json(map).encode().unwrap_err();
        assert!(matches!(err, EncodingError::Json(_)));
    }

    #[test]
    fn test_form_encoder() {
        let encoder = Form(User { name: "ada lovelace", age: 36 });
        assert_eq!(encoder.content_type(), "application/x-www-form-urlencoded");
        let body = encoder.encode().unwrap();
        let text = std::str::from_utf8(&body).unwrap();
        assert!(text.contains("age=36"));
        assert!(text.starts_with("name=ada"));
    }

    #[test]
    fn test_raw_encoder() {
        let encoder = Raw::text("hello");
        assert_eq!(encoder.content_type(), "text/plain; charset=utf-8");
        assert_eq!(encoder.encode().unwrap(), Bytes::from("hello"));

        let octets = Raw::octets(vec![0u8, 1, 2]);
        assert_eq!(octets.content_type(), "application/octet-stream");
    }

    #[test]
    fn test_boxed_encoder_is_repeatable() {
        let boxed = BoxedEncoder::new(Json(vec![1, 2, 3]));
        assert_eq!(boxed.encode().unwrap(), boxed.encode().unwrap());
        assert_eq!(format!("{:?}", boxed), "BoxedEncoder(\"application/json\")");
    }
}
