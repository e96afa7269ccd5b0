//! Radix-tree request router.
//!
//! One tree per HTTP method, O(path-length) lookup. Every route resolves to
//! its own [`Pipeline`]: the router-wide middleware, then the middleware of
//! each enclosing [`nest`](Router::nest) group, then the handler.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;
use tracing::error;

use crate::context::Context;
use crate::error::Error;
use crate::handler::{BoxFuture, BoxedEndpoint, Endpoint, Handler, Outcome};
use crate::middleware::{BoxedMiddleware, Middleware, Pipeline};
use crate::request::Request;
use crate::response::Response;

struct Route {
    method: Method,
    path: String,
    endpoint: BoxedEndpoint,
    /// Group middleware, outermost group first.
    layers: Vec<BoxedMiddleware>,
}

struct Compiled {
    trees: HashMap<Method, MatchitRouter<Pipeline>>,
    fallback: Pipeline,
    not_allowed: Pipeline,
}

/// The application router.
///
/// Build it once at startup and pass it to [`Server::serve`](crate::Server::serve).
/// Registration methods take and return `self` so they chain naturally.
/// Route tables are compiled into pipelines on first use.
pub struct Router {
    middleware: Vec<BoxedMiddleware>,
    routes: Vec<Route>,
    patterns: HashMap<Method, MatchitRouter<()>>,
    fallback: Option<BoxedEndpoint>,
    compiled: OnceLock<Compiled>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            middleware: Vec::new(),
            routes: Vec::new(),
            patterns: HashMap::new(),
            fallback: None,
            compiled: OnceLock::new(),
        }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax and catch-alls `{*name}`;
    /// `req.param("name")` retrieves them:
    ///
    /// ```rust,no_run
    /// # use kasane::{Method, Request, Response, Router};
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// # async fn create_user(_: Request) -> Response { Response::text("") }
    /// # async fn assets(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::GET,  "/users/{id}",     get_user)
    ///     .on(Method::POST, "/users",          create_user)
    ///     .on(Method::GET,  "/static/{*file}", assets);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics on an invalid or conflicting pattern. Use
    /// [`try_on`](Router::try_on) to get the error instead.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.try_on(method, path, handler)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// Like [`on`](Router::on), but reports a bad pattern as
    /// [`Error::Configuration`].
    pub fn try_on(self, method: Method, path: &str, handler: impl Handler) -> Result<Self, Error> {
        self.add(method, path.to_owned(), handler.into_endpoint(), Vec::new())
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PATCH, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Mounts an [`Endpoint`] that needs the whole context rather than an
    /// owned request.
    pub fn endpoint(self, method: Method, path: &str, endpoint: impl Endpoint) -> Self {
        self.add(method, path.to_owned(), Arc::new(endpoint), Vec::new())
            .unwrap_or_else(|e| panic!("{e}"))
    }

    /// Appends router-wide middleware. It wraps every route, including those
    /// registered earlier, plus the 404/405 responses. Units run in the
    /// order they were added.
    pub fn with(self, middleware: impl Middleware) -> Self {
        self.with_shared(Arc::new(middleware))
    }

    pub fn with_shared(mut self, middleware: BoxedMiddleware) -> Self {
        self.middleware.push(middleware);
        self.compiled = OnceLock::new();
        self
    }

    /// Mounts every route of `group` under `prefix`. The group's own
    /// middleware runs after this router's and only for the group's routes.
    ///
    /// ```rust,no_run
    /// # use kasane::{Request, Router, middleware::BearerAuth};
    /// # async fn stats(_: Request) -> &'static str { "" }
    /// let app = Router::new().nest(
    ///     "/admin",
    ///     Router::new().with(BearerAuth::new(["s3cret"])).get("/stats", stats),
    /// );
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if a prefixed path conflicts with an existing route.
    pub fn nest(mut self, prefix: &str, group: Router) -> Self {
        let prefix = prefix.trim_end_matches('/');
        for route in group.routes {
            let path = if route.path == "/" {
                // Nesting at the root keeps the group's root at `/`.
                if prefix.is_empty() { "/".to_owned() } else { prefix.to_owned() }
            } else {
                format!("{prefix}{}", route.path)
            };
            let mut layers = group.middleware.clone();
            layers.extend(route.layers);
            self = self.add(route.method, path, route.endpoint, layers)
                .unwrap_or_else(|e| panic!("{e}"));
        }
        self
    }

    /// Handler for requests that match no route. Defaults to an empty `404`.
    pub fn fallback(mut self, handler: impl Handler) -> Self {
        self.fallback = Some(handler.into_endpoint());
        self.compiled = OnceLock::new();
        self
    }

    /// Registered `(method, path)` pairs in registration order.
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.routes.iter().map(|r| (&r.method, r.path.as_str()))
    }

    fn add(
        mut self,
        method: Method,
        path: String,
        endpoint: BoxedEndpoint,
        layers: Vec<BoxedMiddleware>,
    ) -> Result<Self, Error> {
        self.patterns
            .entry(method.clone())
            .or_default()
            .insert(path.as_str(), ())
            .map_err(|e| Error::config(format!("invalid route `{method} {path}`: {e}")))?;
        self.routes.push(Route { method, path, endpoint, layers });
        self.compiled = OnceLock::new();
        Ok(self)
    }

    fn compiled(&self) -> &Compiled {
        self.compiled.get_or_init(|| self.compile())
    }

    fn compile(&self) -> Compiled {
        let stack = |layers: &[BoxedMiddleware]| -> Vec<BoxedMiddleware> {
            self.middleware.iter().chain(layers).cloned().collect()
        };

        let mut trees: HashMap<Method, MatchitRouter<Pipeline>> = HashMap::new();
        for route in &self.routes {
            let pipeline = Pipeline::from_parts(stack(&route.layers), Arc::clone(&route.endpoint));
            // Patterns were validated on registration.
            if let Err(e) = trees.entry(route.method.clone()).or_default().insert(route.path.as_str(), pipeline) {
                error!(method = %route.method, path = %route.path, "skipping route: {e}");
            }
        }

        let fallback = self.fallback.clone().unwrap_or_else(|| Arc::new(NotFound) as BoxedEndpoint);
        Compiled {
            trees,
            fallback: Pipeline::from_parts(self.middleware.clone(), fallback),
            not_allowed: Pipeline::from_parts(self.middleware.clone(), Arc::new(MethodNotAllowed)),
        }
    }

    /// Picks the pipeline for the request in `ctx` and stores any path
    /// parameters on the request.
    fn select(&self, ctx: &mut Context) -> Pipeline {
        let compiled = self.compiled();
        let req = ctx.request_mut();

        let lookup = |method: &Method| compiled.trees.get(method).and_then(|t| t.at(&req.path).ok());
        let matched = lookup(&req.method).or_else(|| {
            // HEAD is served by the GET route; hyper drops the body.
            (req.method == Method::HEAD).then(|| lookup(&Method::GET)).flatten()
        });

        if let Some(matched) = matched {
            let params = matched.params.iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            let pipeline = matched.value.clone();
            req.params = params;
            return pipeline;
        }

        let mut allowed: Vec<&str> = compiled.trees.iter()
            .filter(|(_, tree)| tree.at(&req.path).is_ok())
            .map(|(method, _)| method.as_str())
            .collect();
        if allowed.is_empty() {
            return compiled.fallback.clone();
        }
        allowed.sort_unstable();
        let allow = allowed.join(", ");
        ctx.extensions_mut().insert(AllowedMethods(allow));
        compiled.not_allowed.clone()
    }

    /// Routes `ctx` and runs the selected pipeline. Errors are the ones no
    /// middleware handled.
    pub async fn handle(&self, ctx: &mut Context) -> Outcome {
        let pipeline = self.select(ctx);
        pipeline.run(ctx).await
    }

    /// Serves one request in-process: routing, middleware, handler. An error
    /// that escapes every unit becomes a bare error response with the error's
    /// status. This is what the server calls per request, and what tests
    /// call directly.
    pub async fn call(&self, req: Request) -> Response {
        let mut ctx = Context::new(req);
        match self.handle(&mut ctx).await {
            Ok(()) => ctx.into_response(),
            Err(err) => {
                let status = err.http_status();
                error!(
                    method = %ctx.request().method(),
                    path = %ctx.request().path(),
                    error = %err,
                    "unhandled error in middleware pipeline",
                );
                let reason = status.canonical_reason().unwrap_or("error").to_lowercase();
                Response::error(status, &reason)
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

// ── Built-in endpoints ────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct AllowedMethods(String);

struct NotFound;

impl Endpoint for NotFound {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Outcome> {
        ctx.set_response(Response::status(StatusCode::NOT_FOUND));
        Box::pin(async { Ok(()) })
    }
}

struct MethodNotAllowed;

impl Endpoint for MethodNotAllowed {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Outcome> {
        let allow = ctx.extensions().get::<AllowedMethods>().map(|a| a.0.clone());
        let mut res = Response::status(StatusCode::METHOD_NOT_ALLOWED);
        if let Some(allow) = allow {
            res.insert_header("allow", allow);
        }
        ctx.set_response(res);
        Box::pin(async { Ok(()) })
    }
}
