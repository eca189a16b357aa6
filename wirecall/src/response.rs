//! Response types.
//!
//! [`RawResponse`] is what the pipeline hands between validation stages.
//! [`Response`] is what callers receive: a typed body plus status and headers.

use bytes::Bytes;
use http::{HeaderMap, StatusCode, header};
use serde::de::DeserializeOwned;
use std::ops::Deref;
use url::Url;

use crate::Error;

/// An undecoded HTTP response together with the URL that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    url: Url,
}

impl RawResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes, url: Url) -> Self {
        Self {
            status,
            headers,
            body,
            url,
        }
    }

    pub(crate) fn from_http(response: http::Response<Bytes>, url: Url) -> Self {
        let (parts, body) = response.into_parts();
        Self::new(parts.status, parts.headers, body, url)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The URL of the request this response answers.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The `Location` header of a 3xx response, if present and readable.
    pub fn location(&self) -> Option<&str> {
        if !self.status.is_redirection() {
            return None;
        }
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }

    pub(crate) fn into_response(self) -> Response<Bytes> {
        Response {
            inner: self.body,
            status: self.status,
            headers: self.headers,
            url: self.url,
        }
    }
}

/// Response wrapper returned by [`Session::send`](crate::Session::send).
///
/// # Example
///
/// ```ignore
/// let response = session.send_json::<User>(&HttpRequest::new().path("/me")).await?;
///
/// // Access the body directly via Deref
/// println!("Name: {}", response.name);
///
/// // Response headers stay available
/// if let Some(etag) = response.headers().get("etag") {
///     println!("etag: {:?}", etag);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    inner: T,
    status: StatusCode,
    headers: HeaderMap,
    url: Url,
}

impl<T> Response<T> {
    /// Extract the body, discarding status and headers.
    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Transform the body, preserving status and headers.
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            inner: f(self.inner),
            status: self.status,
            headers: self.headers,
            url: self.url,
        }
    }
}

impl Response<Bytes> {
    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(self) -> Result<Response<T>, Error> {
        let value = serde_json::from_slice(&self.inner)
            .map_err(|e| Error::Decode(format!("JSON decoding failed: {}", e)))?;
        Ok(self.map(|_| value))
    }

    /// Decode the body as UTF-8 text.
    pub fn text(self) -> Result<Response<String>, Error> {
        let text = String::from_utf8(self.inner.to_vec())
            .map_err(|e| Error::Decode(format!("invalid UTF-8 body: {}", e)))?;
        Ok(self.map(|_| text))
    }
}

impl<T> Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn raw(status: u16, body: &'static str) -> RawResponse {
        RawResponse::new(
            StatusCode::from_u16(status).unwrap(),
            HeaderMap::new(),
            Bytes::from(body),
            "https://api.example.com/v1".parse().unwrap(),
        )
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        name: String,
    }

    #[test]
    fn test_json_decoding() {
        let response = raw(200, r#"{"name":"ada"}"#).into_response();
        let user = response.json::<User>().unwrap();
        assert_eq!(user.status(), StatusCode::OK);
        assert_eq!(user.name, "ada");
        assert_eq!(user.into_inner(), User { name: "ada".into() });
    }

    #[test]
    fn test_json_decoding_failure() {
        let err = raw(200, "not json").into_response().json::<User>().unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_text() {
        let text = raw(200, "hello").into_response().text().unwrap();
        assert_eq!(text.get_ref(), "hello");
    }

    #[test]
    fn test_location_only_for_redirects() {
        let mut headers = HeaderMap::new();
        headers.insert(header::LOCATION, "/elsewhere".parse().unwrap());
        let redirect = RawResponse::new(
            StatusCode::FOUND,
            headers.clone(),
            Bytes::new(),
            "https://api.example.com/".parse().unwrap(),
        );
        assert_eq!(redirect.location(), Some("/elsewhere"));

        let ok = RawResponse::new(
            StatusCode::OK,
            headers,
            Bytes::new(),
            "https://api.example.com/".parse().unwrap(),
        );
        assert_eq!(ok.location(), None);
    }
}
