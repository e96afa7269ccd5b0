//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::Method;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::Error;

/// An incoming HTTP request with its body fully buffered.
///
/// Cloning is cheap: the body is reference-counted [`Bytes`].
#[derive(Clone, Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
}

impl Request {
    /// Builds a request by hand: for tests, or for driving a
    /// [`Router`](crate::Router) without a socket.
    ///
    /// `target` may carry a query string (`/users?page=2`).
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (target.to_owned(), None),
        };
        Self {
            method,
            path,
            query,
            headers: Vec::new(),
            body: Bytes::new(),
            params: HashMap::new(),
        }
    }

    /// Adds a header. Returns `self` for chaining.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Replaces the body. Returns `self` for chaining.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub(crate) fn from_parts(parts: http::request::Parts, body: Bytes) -> Self {
        let headers = parts.headers.iter()
            .filter_map(|(name, value)| match value.to_str() {
                Ok(value) => Some((name.as_str().to_owned(), value.to_owned())),
                Err(_) => {
                    debug!(header = %name, "dropping non-UTF-8 request header");
                    None
                }
            })
            .collect();
        Self {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().map(str::to_owned),
            headers,
            body,
            params: HashMap::new(),
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns the first value of a query-string parameter, percent-decoded.
    pub fn query_param(&self, key: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_query_from_target() {
        let req = Request::new(Method::GET, "/search?q=rust%20lang&page=2");
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query(), Some("q=rust%20lang&page=2"));
        assert_eq!(req.query_param("q").as_deref(), Some("rust lang"));
        assert_eq!(req.query_param("page").as_deref(), Some("2"));
        assert_eq!(req.query_param("missing"), None);
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = Request::new(Method::GET, "/").with_header("X-Api-Key", "secret");
        assert_eq!(req.header("x-api-key"), Some("secret"));
        assert_eq!(req.header("authorization"), None);
    }

    #[test]
    fn json_body() {
        #[derive(serde::Deserialize)]
        struct Input { name: String }

        let req = Request::new(Method::POST, "/users").with_body(r#"{"name":"alice"}"#);
        let input: Input = req.json().unwrap();
        assert_eq!(input.name, "alice");

        let bad = Request::new(Method::POST, "/users").with_body("{");
        assert!(matches!(bad.json::<Input>(), Err(Error::Json(_))));
    }

    #[test]
    fn from_parts_drops_only_non_utf8_headers() {
        let (parts, ()) = http::Request::builder()
            .method(Method::POST)
            .uri("/upload?kind=raw")
            .header("x-binary", http::HeaderValue::from_bytes(b"caf\xe9").unwrap())
            .header("content-type", "application/octet-stream")
            .body(())
            .unwrap()
            .into_parts();

        let req = Request::from_parts(parts, Bytes::from_static(b"data"));
        assert_eq!(req.header("x-binary"), None);
        assert_eq!(req.header("content-type"), Some("application/octet-stream"));
        assert_eq!(req.query(), Some("kind=raw"));
        assert_eq!(req.headers().len(), 1);
    }
}
