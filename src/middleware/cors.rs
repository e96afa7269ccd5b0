//! Cross-origin resource sharing.

use http::{Method, StatusCode};

use super::{BoxFuture, Middleware, Next, Outcome};
use crate::context::Context;
use crate::response::Response;

#[derive(Clone, Debug)]
enum AllowOrigin {
    Any,
    List(Vec<String>),
}

/// CORS headers for browser clients.
///
/// Preflight requests (`OPTIONS` with `access-control-request-method`) are
/// answered here without running the rest of the chain: `204` when the
/// origin is allowed, `403` when it is not. Simple requests from an allowed
/// origin run normally and get the `access-control-allow-*` headers on the
/// way out. Requests without an `origin` header pass through untouched.
///
/// ```rust
/// use kasane::middleware::Cors;
/// use kasane::Method;
///
/// let cors = Cors::new()
///     .allow_origin("https://app.example.com")
///     .allow_methods([Method::GET, Method::POST])
///     .allow_headers(["content-type", "authorization"])
///     .max_age(600);
/// ```
#[derive(Clone, Debug)]
pub struct Cors {
    origins: AllowOrigin,
    methods: String,
    headers: String,
    max_age: Option<u64>,
    credentials: bool,
}

impl Default for Cors {
    fn default() -> Self {
        Self {
            origins: AllowOrigin::List(Vec::new()),
            methods: "GET, POST, PUT, PATCH, DELETE, OPTIONS".to_owned(),
            headers: "content-type, authorization".to_owned(),
            max_age: None,
            credentials: false,
        }
    }
}

impl Cors {
    /// No origins allowed until [`allow_origin`](Cors::allow_origin) is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Any origin, any common method, any requested header.
    pub fn permissive() -> Self {
        Self { origins: AllowOrigin::Any, headers: "*".to_owned(), ..Self::default() }
    }

    pub fn allow_origin(mut self, origin: &str) -> Self {
        match &mut self.origins {
            AllowOrigin::Any => {}
            AllowOrigin::List(list) => list.push(origin.trim_end_matches('/').to_owned()),
        }
        self
    }

    pub fn allow_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().map(|m| m.to_string()).collect::<Vec<_>>().join(", ");
        self
    }

    pub fn allow_headers<'h>(mut self, headers: impl IntoIterator<Item = &'h str>) -> Self {
        self.headers = headers.into_iter().collect::<Vec<_>>().join(", ");
        self
    }

    pub fn max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.credentials = allow;
        self
    }

    fn allows(&self, origin: &str) -> bool {
        match &self.origins {
            AllowOrigin::Any => true,
            AllowOrigin::List(list) => list.iter().any(|o| o.eq_ignore_ascii_case(origin)),
        }
    }

    fn decorate(&self, res: &mut Response, origin: &str) {
        // A credentialed response may not use the wildcard.
        if matches!(self.origins, AllowOrigin::Any) && !self.credentials {
            res.insert_header("access-control-allow-origin", "*");
        } else {
            res.insert_header("access-control-allow-origin", origin);
            res.append_header("vary", "origin");
        }
        if self.credentials {
            res.insert_header("access-control-allow-credentials", "true");
        }
    }
}

impl Middleware for Cors {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, mut next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let Some(origin) = ctx.request().header("origin").map(str::to_owned) else {
                return next.run(ctx).await;
            };
            let allowed = self.allows(&origin);
            let preflight = *ctx.request().method() == Method::OPTIONS
                && ctx.request().header("access-control-request-method").is_some();

            if preflight {
                if !allowed {
                    ctx.set_response(Response::status(StatusCode::FORBIDDEN));
                    return Ok(());
                }
                let mut res = Response::status(StatusCode::NO_CONTENT);
                self.decorate(&mut res, &origin);
                res.insert_header("access-control-allow-methods", self.methods.clone());
                res.insert_header("access-control-allow-headers", self.headers.clone());
                if let Some(age) = self.max_age {
                    res.insert_header("access-control-max-age", age.to_string());
                }
                ctx.set_response(res);
                return Ok(());
            }

            next.run(ctx).await?;
            if allowed {
                self.decorate(ctx.response_mut(), &origin);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::Pipeline;
    use crate::request::Request;

    async fn run(cors: Cors, req: Request) -> Context {
        let pipeline = Pipeline::builder()
            .with(cors)
            .handler(|_req: Request| async { "payload" })
            .build()
            .unwrap();
        let mut ctx = Context::new(req);
        pipeline.run(&mut ctx).await.unwrap();
        ctx
    }

    #[tokio::test]
    async fn preflight_short_circuits() {
        let req = Request::new(Method::OPTIONS, "/users")
            .with_header("origin", "https://app.example.com")
            .with_header("access-control-request-method", "POST");
        let ctx = run(Cors::new().allow_origin("https://app.example.com/").max_age(600), req).await;

        let res = ctx.response();
        assert_eq!(res.status_code(), StatusCode::NO_CONTENT);
        assert!(res.body().is_empty());
        assert_eq!(res.header("access-control-allow-origin"), Some("https://app.example.com"));
        assert_eq!(res.header("access-control-max-age"), Some("600"));
        assert_eq!(res.header("vary"), Some("origin"));
    }

    #[tokio::test]
    async fn preflight_from_unknown_origin_is_forbidden() {
        let req = Request::new(Method::OPTIONS, "/users")
            .with_header("origin", "https://evil.example")
            .with_header("access-control-request-method", "DELETE");
        let ctx = run(Cors::new().allow_origin("https://app.example.com"), req).await;
        assert_eq!(ctx.response().status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn simple_request_gets_headers_after_handler() {
        let req = Request::new(Method::GET, "/").with_header("origin", "https://x.dev");
        let ctx = run(Cors::permissive(), req).await;
        assert_eq!(ctx.response().body().as_ref(), b"payload");
        assert_eq!(ctx.response().header("access-control-allow-origin"), Some("*"));
    }

    #[tokio::test]
    async fn credentials_echo_origin() {
        let req = Request::new(Method::GET, "/").with_header("origin", "https://x.dev");
        let ctx = run(Cors::permissive().allow_credentials(true), req).await;
        assert_eq!(ctx.response().header("access-control-allow-origin"), Some("https://x.dev"));
        assert_eq!(ctx.response().header("access-control-allow-credentials"), Some("true"));
    }

    #[tokio::test]
    async fn no_origin_no_headers() {
        let ctx = run(Cors::permissive(), Request::new(Method::GET, "/")).await;
        assert_eq!(ctx.response().header("access-control-allow-origin"), None);
    }
}
