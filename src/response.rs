//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! A handler builds a [`Response`] and returns it; the terminal step of the
//! pipeline writes it into the [`Context`](crate::Context). Middleware
//! reads and edits it in place during its "after" phase.

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use serde::Serialize;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseBuilder::bytes`].
#[derive(Clone, Copy, Debug)]
pub enum ContentType {
    Csv,          // text/csv
    EventStream,  // text/event-stream  (SSE)
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream  (binary / file download)
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv         => "text/csv",
            Self::EventStream => "text/event-stream",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// # Shortcuts (200 OK)
///
/// ```rust
/// use kasane::{Response, StatusCode};
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
/// ```
///
/// # Builder (custom status or headers)
///
/// ```rust
/// use kasane::{ContentType, Response, StatusCode};
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .json(br#"{"id":42}"#.to_vec());
///
/// Response::builder().bytes(ContentType::Xml, b"<ok/>".to_vec());
/// ```
#[derive(Clone, Debug)]
pub struct Response {
    pub(crate) body: Bytes,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) status: StatusCode,
}

impl Default for Response {
    fn default() -> Self {
        Self::status(StatusCode::OK)
    }
}

impl Response {
    /// `200 OK`, `application/json`.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::with_type(ContentType::Json, body.into())
    }

    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        let body: String = body.into();
        Self::with_type(ContentType::Text, body.into())
    }

    /// `200 OK`, `text/html; charset=utf-8`.
    pub fn html(body: impl Into<String>) -> Self {
        let body: String = body.into();
        Self::with_type(ContentType::Html, body.into())
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { body: Bytes::new(), headers: Vec::new(), status: code }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: StatusCode::OK }
    }

    /// A JSON error envelope: `{"error": "...", "status": 404}`.
    pub fn error(code: StatusCode, message: &str) -> Self {
        let body = serde_json::json!({ "error": message, "status": code.as_u16() });
        Self::builder().status(code).json(body.to_string())
    }

    fn with_type(content_type: ContentType, body: Bytes) -> Self {
        Self {
            body,
            headers: vec![("content-type".to_owned(), content_type.as_str().to_owned())],
            status: StatusCode::OK,
        }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    pub fn set_status(&mut self, code: StatusCode) {
        self.status = code;
    }

    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Case-insensitive header lookup. Returns the first match.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a header, replacing every existing value under the same name.
    pub fn insert_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_owned(), value.into()));
    }

    /// Adds a header value without touching existing ones.
    pub fn append_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.push((name.to_owned(), value.into()));
    }

    /// Converts into the hyper representation. Headers whose name or value
    /// is not valid on the wire are dropped.
    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut builder = http::Response::builder().status(self.status);
        if let Some(headers) = builder.headers_mut() {
            for (name, value) in &self.headers {
                let (Ok(name), Ok(value)) = (
                    http::HeaderName::from_bytes(name.as_bytes()),
                    http::HeaderValue::from_str(value),
                ) else {
                    tracing::warn!(header = %name, "dropping invalid response header");
                    continue;
                };
                headers.append(name, value);
            }
        }
        let body = Full::new(self.body);
        builder.body(body.clone()).unwrap_or_else(|_| {
            let mut fallback = http::Response::new(body);
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: impl Into<Bytes>) -> Response {
        self.finish(ContentType::Json, body.into())
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        let body: String = body.into();
        self.finish(ContentType::Text, body.into())
    }

    /// Terminate with an HTML body (`text/html; charset=utf-8`).
    pub fn html(self, body: impl Into<String>) -> Response {
        let body: String = body.into();
        self.finish(ContentType::Html, body.into())
    }

    /// Terminate with a typed body. Use this for XML, binary, SSE, etc.
    pub fn bytes(self, content_type: ContentType, body: impl Into<Bytes>) -> Response {
        self.finish(content_type, body.into())
    }

    /// Terminate with no body (e.g. `204 No Content`, redirects).
    pub fn no_body(self) -> Response {
        Response { body: Bytes::new(), headers: self.headers, status: self.status }
    }

    fn finish(self, content_type: ContentType, body: Bytes) -> Response {
        let mut headers = vec![("content-type".to_owned(), content_type.as_str().to_owned())];
        headers.extend(self.headers);
        Response { body, headers, status: self.status }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a status directly from a handler: `return StatusCode::NOT_FOUND`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

/// `(StatusCode::CREATED, Json(user))` overrides the status of any response.
impl<R: IntoResponse> IntoResponse for (StatusCode, R) {
    fn into_response(self) -> Response {
        let mut res = self.1.into_response();
        res.status = self.0;
        res
    }
}

/// Serializes `T` with serde_json into an `application/json` response.
///
/// ```rust
/// use kasane::{Json, IntoResponse};
///
/// #[derive(serde::Serialize)]
/// struct User { id: u64, name: String }
///
/// let res = Json(User { id: 1, name: "alice".into() }).into_response();
/// assert_eq!(res.body().as_ref(), br#"{"id":1,"name":"alice"}"#);
/// ```
#[derive(Clone, Debug)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(bytes) => Response::json(bytes),
            Err(e) => Response::error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_puts_content_type_first() {
        let res = Response::builder()
            .status(StatusCode::CREATED)
            .header("location", "/users/1")
            .json(r#"{"id":1}"#);
        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.headers()[0], ("content-type".to_owned(), "application/json".to_owned()));
        assert_eq!(res.header("Location"), Some("/users/1"));
    }

    #[test]
    fn insert_header_replaces_append_keeps() {
        let mut res = Response::text("x");
        res.append_header("vary", "origin");
        res.append_header("vary", "accept");
        assert_eq!(res.headers().iter().filter(|(k, _)| k == "vary").count(), 2);

        res.insert_header("Vary", "*");
        let vary: Vec<_> = res.headers().iter().filter(|(k, _)| k.eq_ignore_ascii_case("vary")).collect();
        assert_eq!(vary.len(), 1);
        assert_eq!(vary[0].1, "*");
    }

    #[test]
    fn error_envelope() {
        let res = Response::error(StatusCode::NOT_FOUND, "user 7 not found");
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        let v: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(v["error"], "user 7 not found");
        assert_eq!(v["status"], 404);
    }

    #[test]
    fn tuple_overrides_status() {
        let res = (StatusCode::ACCEPTED, "queued").into_response();
        assert_eq!(res.status_code(), StatusCode::ACCEPTED);
        assert_eq!(res.body().as_ref(), b"queued");
    }

    #[test]
    fn into_inner_skips_invalid_headers() {
        let mut res = Response::text("ok");
        res.append_header("bad header", "x");
        res.append_header("x-good", "yes");
        let inner = res.into_inner();
        assert_eq!(inner.status(), StatusCode::OK);
        assert_eq!(inner.headers().get("x-good").unwrap(), "yes");
        assert_eq!(inner.headers().len(), 2);
    }
}
