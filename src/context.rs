//! Per-request context threaded through the middleware pipeline.
//!
//! One [`Context`] is created for every inbound request. The pipeline hands
//! the same `&mut Context` to every middleware unit and finally to the
//! handler, so anything written into it (a response header, a request id in
//! the extensions, a replaced response) is visible to later units and to
//! the caller of [`Pipeline::run`](crate::middleware::Pipeline::run).

use http::Extensions;

use crate::middleware::RequestIdValue;
use crate::request::Request;
use crate::response::Response;

/// Inbound request plus the outbound response being assembled for it.
///
/// The response starts out as an empty `200 OK`; the handler normally
/// replaces it and middleware edits it on the way back out.
#[derive(Debug)]
pub struct Context {
    request: Request,
    response: Response,
    extensions: Extensions,
}

impl Context {
    pub fn new(request: Request) -> Self {
        Self { request, response: Response::default(), extensions: Extensions::new() }
    }

    pub fn request(&self) -> &Request { &self.request }
    pub fn request_mut(&mut self) -> &mut Request { &mut self.request }
    pub fn response(&self) -> &Response { &self.response }
    pub fn response_mut(&mut self) -> &mut Response { &mut self.response }

    /// Replaces the response wholesale. This is how a unit short-circuits:
    /// set a response and return without running `next`.
    pub fn set_response(&mut self, response: Response) {
        self.response = response;
    }

    /// Typed per-request storage shared by units and the handler.
    pub fn extensions(&self) -> &Extensions { &self.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.extensions }

    /// The id assigned by [`RequestId`](crate::middleware::RequestId), if
    /// that unit ran upstream.
    pub fn request_id(&self) -> Option<&str> {
        self.extensions.get::<RequestIdValue>().map(|id| id.0.as_str())
    }

    pub fn into_response(self) -> Response {
        self.response
    }
}

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};

    use super::*;

    #[test]
    fn starts_with_empty_ok_response() {
        let ctx = Context::new(Request::new(Method::GET, "/"));
        assert_eq!(ctx.response().status_code(), StatusCode::OK);
        assert!(ctx.response().body().is_empty());
        assert_eq!(ctx.request_id(), None);
    }

    #[test]
    fn extensions_are_typed() {
        #[derive(Clone, Debug, PartialEq)]
        struct User(&'static str);

        let mut ctx = Context::new(Request::new(Method::GET, "/"));
        ctx.extensions_mut().insert(User("alice"));
        assert_eq!(ctx.extensions().get::<User>(), Some(&User("alice")));
    }
}
