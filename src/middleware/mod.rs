//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: structured tracing, request-id injection, CORS,
//! authentication, timeouts.
//!
//! # The pipeline
//!
//! A [`Pipeline`] is an ordered list of middleware units plus one terminal
//! [`Endpoint`](crate::handler::Endpoint). Running it hands the request's
//! [`Context`] to unit 0 together with a [`Next`]; running that `Next`
//! invokes unit 1, and so on until the last `Next` invokes the endpoint.
//!
//! ```text
//!   run ──► A.before ──► B.before ──► endpoint
//!                                        │
//!   run ◄── A.after  ◄── B.after  ◄──────┘
//! ```
//!
//! Because each unit awaits the rest of the chain inside its own future, the
//! "after" halves unwind in exact reverse registration order with no extra
//! bookkeeping. A unit that returns without running `next` short-circuits:
//! nothing downstream runs, while everything upstream still gets its
//! "after" phase.
//!
//! Errors are plain `Result`s travelling back up the same path. The
//! pipeline neither retries nor swallows them; put [`Recover`] first to
//! turn them into responses.
//!
//! # Writing a unit
//!
//! ```rust
//! use kasane::middleware::{BoxFuture, Middleware, Next, Outcome};
//! use kasane::Context;
//!
//! struct PoweredBy;
//!
//! impl Middleware for PoweredBy {
//!     fn handle<'a>(&'a self, ctx: &'a mut Context, mut next: Next<'a>) -> BoxFuture<'a, Outcome> {
//!         Box::pin(async move {
//!             next.run(ctx).await?;
//!             ctx.response_mut().insert_header("x-powered-by", "kasane");
//!             Ok(())
//!         })
//!     }
//! }
//! ```

use std::sync::Arc;

use crate::context::Context;
use crate::error::Error;
use crate::handler::{BoxedEndpoint, Endpoint, Handler};

pub use crate::handler::{BoxFuture, Outcome};

mod auth;
mod cors;
mod counter;
mod headers;
mod recover;
mod request_id;
mod timeout;
mod timing;
mod trace;

pub use auth::{ApiKey, BearerAuth};
pub use cors::Cors;
pub use counter::RequestCounter;
pub use headers::SetHeader;
pub use recover::Recover;
pub use request_id::{RequestId, RequestIdValue};
pub use timeout::Timeout;
pub use timing::ResponseTime;
pub use trace::Trace;

// ── Middleware trait ──────────────────────────────────────────────────────────

/// One step of a [`Pipeline`].
///
/// A unit may run `next` zero times (short-circuit), or once, with code
/// before and/or after it. Running it a second time fails with
/// [`Error::ProtocolViolation`].
pub trait Middleware: Send + Sync + 'static {
    /// Name used in logs and protocol-violation errors.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Outcome>;
}

/// A type-erased unit. Cloning the `Arc` shares one unit between pipelines.
pub type BoxedMiddleware = Arc<dyn Middleware>;

impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        (**self).handle(ctx, next)
    }
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// The rest of the chain, as seen from one unit.
///
/// Only the pipeline constructs `Next` values, and each one points strictly
/// past the unit holding it, so the cursor only moves forward.
pub struct Next<'a> {
    units: &'a [BoxedMiddleware],
    endpoint: &'a dyn Endpoint,
    index: usize,
    called: bool,
}

impl<'a> Next<'a> {
    /// Runs the remaining units and the endpoint against `ctx`.
    pub async fn run(&mut self, ctx: &mut Context) -> Outcome {
        if self.called {
            let index = self.index.saturating_sub(1);
            let unit = self.units.get(index).map_or("pipeline", |u| u.name());
            return Err(Error::ProtocolViolation { unit, index });
        }
        self.called = true;

        match self.units.get(self.index) {
            Some(unit) => {
                let next = Next {
                    units: self.units,
                    endpoint: self.endpoint,
                    index: self.index + 1,
                    called: false,
                };
                unit.handle(ctx, next).await
            }
            None => self.endpoint.call(ctx).await,
        }
    }

    /// How many units are still ahead, not counting the endpoint.
    pub fn remaining(&self) -> usize {
        self.units.len().saturating_sub(self.index)
    }
}

// ── from_fn ───────────────────────────────────────────────────────────────────

/// Adapts a closure into a [`Middleware`].
///
/// ```rust
/// use kasane::middleware::from_fn;
///
/// let audit = from_fn("audit", |ctx, mut next| Box::pin(async move {
///     let path = ctx.request().path().to_owned();
///     next.run(ctx).await?;
///     tracing::info!(%path, status = %ctx.response().status_code(), "audited");
///     Ok(())
/// }));
/// ```
pub fn from_fn<F>(name: &'static str, f: F) -> FromFn<F>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
{
    FromFn { name, f }
}

/// Returned by [`from_fn`].
pub struct FromFn<F> {
    name: &'static str,
    f: F,
}

impl<F> Middleware for FromFn<F>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        (self.f)(ctx, next)
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// Ordered middleware units plus a terminal endpoint.
///
/// Immutable once built; cloning is two `Arc` bumps. To add a unit, build a
/// new pipeline.
#[derive(Clone)]
pub struct Pipeline {
    units: Arc<[BoxedMiddleware]>,
    endpoint: BoxedEndpoint,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Assembles a pipeline from already-erased parts.
    ///
    /// Fails with [`Error::Configuration`] when `endpoint` is `None`.
    pub fn new(units: Vec<BoxedMiddleware>, endpoint: Option<BoxedEndpoint>) -> Result<Self, Error> {
        let endpoint = endpoint
            .ok_or_else(|| Error::config("pipeline has no terminal handler"))?;
        Ok(Self::from_parts(units, endpoint))
    }

    pub(crate) fn from_parts(units: Vec<BoxedMiddleware>, endpoint: BoxedEndpoint) -> Self {
        Self { units: units.into(), endpoint }
    }

    /// Runs the chain once against `ctx`. On return the response sits in
    /// `ctx`; any error is one no unit chose to handle.
    pub async fn run(&self, ctx: &mut Context) -> Outcome {
        let mut next = Next {
            units: &self.units,
            endpoint: self.endpoint.as_ref(),
            index: 0,
            called: false,
        };
        next.run(ctx).await
    }

    /// Unit names in execution order.
    pub fn unit_names(&self) -> Vec<&'static str> {
        self.units.iter().map(|u| u.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Collects units in registration order, then the endpoint.
#[derive(Default)]
pub struct PipelineBuilder {
    units: Vec<BoxedMiddleware>,
    endpoint: Option<BoxedEndpoint>,
}

impl PipelineBuilder {
    /// Appends a unit. Returns `self` for chaining.
    pub fn with(self, middleware: impl Middleware) -> Self {
        self.with_shared(Arc::new(middleware))
    }

    /// Appends a unit that may also sit in other pipelines.
    pub fn with_shared(mut self, middleware: BoxedMiddleware) -> Self {
        self.units.push(middleware);
        self
    }

    /// Sets the terminal handler from a handler function.
    pub fn handler(self, handler: impl Handler) -> Self {
        self.endpoint_shared(handler.into_endpoint())
    }

    /// Sets the terminal handler from an [`Endpoint`] implementation.
    pub fn endpoint(self, endpoint: impl Endpoint) -> Self {
        self.endpoint_shared(Arc::new(endpoint))
    }

    pub fn endpoint_shared(mut self, endpoint: BoxedEndpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn build(self) -> Result<Pipeline, Error> {
        Pipeline::new(self.units, self.endpoint)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::{Method, StatusCode};

    use super::*;
    use crate::handler::endpoint_fn;
    use crate::request::Request;
    use crate::response::Response;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Records `<name>-before` / `<name>-after` around `next`.
    struct Probe {
        name: &'static str,
        log: Log,
        pass: bool,
    }

    impl Probe {
        fn new(name: &'static str, log: &Log) -> Self {
            Self { name, log: Arc::clone(log), pass: true }
        }

        fn blocking(name: &'static str, log: &Log) -> Self {
            Self { pass: false, ..Self::new(name, log) }
        }
    }

    impl Middleware for Probe {
        fn name(&self) -> &'static str {
            self.name
        }

        fn handle<'a>(&'a self, ctx: &'a mut Context, mut next: Next<'a>) -> BoxFuture<'a, Outcome> {
            Box::pin(async move {
                self.log.lock().unwrap().push(format!("{}-before", self.name));
                if !self.pass {
                    ctx.set_response(Response::status(StatusCode::FORBIDDEN));
                    return Ok(());
                }
                let result = next.run(ctx).await;
                self.log.lock().unwrap().push(format!("{}-after", self.name));
                result
            })
        }
    }

    fn terminal(log: &Log) -> impl Endpoint {
        let log = Arc::clone(log);
        endpoint_fn(move |ctx| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().unwrap().push("T".to_owned());
                ctx.set_response(Response::text("done"));
                Ok(())
            })
        })
    }

    fn ctx() -> Context {
        Context::new(Request::new(Method::GET, "/"))
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn before_in_order_after_in_reverse() {
        let log = Log::default();
        let pipeline = Pipeline::builder()
            .with(Probe::new("A", &log))
            .with(Probe::new("B", &log))
            .endpoint(terminal(&log))
            .build()
            .unwrap();

        let mut ctx = ctx();
        pipeline.run(&mut ctx).await.unwrap();

        assert_eq!(entries(&log), ["A-before", "B-before", "T", "B-after", "A-after"]);
        assert_eq!(ctx.response().body().as_ref(), b"done");
    }

    #[tokio::test]
    async fn short_circuit_skips_downstream_but_unwinds_upstream() {
        let log = Log::default();
        let pipeline = Pipeline::builder()
            .with(Probe::new("A", &log))
            .with(Probe::blocking("B", &log))
            .with(Probe::new("C", &log))
            .endpoint(terminal(&log))
            .build()
            .unwrap();

        let mut ctx = ctx();
        pipeline.run(&mut ctx).await.unwrap();

        assert_eq!(entries(&log), ["A-before", "B-before", "A-after"]);
        assert_eq!(ctx.response().status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn first_unit_short_circuit_runs_nothing_else() {
        let log = Log::default();
        let pipeline = Pipeline::builder()
            .with(Probe::blocking("A", &log))
            .with(Probe::new("B", &log))
            .endpoint(terminal(&log))
            .build()
            .unwrap();

        pipeline.run(&mut ctx()).await.unwrap();
        assert_eq!(entries(&log), ["A-before"]);
    }

    #[tokio::test]
    async fn empty_pipeline_calls_endpoint_directly() {
        let log = Log::default();
        let pipeline = Pipeline::builder().endpoint(terminal(&log)).build().unwrap();
        assert!(pipeline.is_empty());

        let mut ctx = ctx();
        pipeline.run(&mut ctx).await.unwrap();
        assert_eq!(entries(&log), ["T"]);
        assert_eq!(ctx.response().body().as_ref(), b"done");
    }

    #[test]
    fn build_without_endpoint_is_a_configuration_error() {
        let log = Log::default();
        let result = Pipeline::builder().with(Probe::new("A", &log)).build();
        assert!(matches!(result, Err(Error::Configuration(_))));
        assert!(matches!(Pipeline::new(Vec::new(), None), Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn endpoint_error_reaches_the_wrapping_unit() {
        let seen = Arc::new(Mutex::new(None));
        let seen_in_unit = Arc::clone(&seen);

        let pipeline = Pipeline::builder()
            .with(from_fn("catch", move |ctx, mut next| {
                let seen = Arc::clone(&seen_in_unit);
                Box::pin(async move {
                    if let Err(e) = next.run(ctx).await {
                        *seen.lock().unwrap() = Some(e.to_string());
                        ctx.set_response(Response::status(StatusCode::INTERNAL_SERVER_ERROR));
                    }
                    Ok(())
                })
            }))
            .endpoint(endpoint_fn(|_ctx| Box::pin(async { Err(Error::middleware("db down")) })))
            .build()
            .unwrap();

        let mut ctx = ctx();
        pipeline.run(&mut ctx).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("middleware: db down"));
        assert_eq!(ctx.response().status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn uncaught_error_surfaces_at_run_and_pipeline_stays_usable() {
        let log = Log::default();
        let fail = Arc::new(std::sync::atomic::AtomicBool::new(true));
        let fail_in_endpoint = Arc::clone(&fail);

        let pipeline = Pipeline::builder()
            .with(Probe::new("A", &log))
            .endpoint(endpoint_fn(move |_ctx| {
                let fail = fail_in_endpoint.swap(false, std::sync::atomic::Ordering::SeqCst);
                Box::pin(async move {
                    if fail { Err(Error::middleware("first call fails")) } else { Ok(()) }
                })
            }))
            .build()
            .unwrap();

        assert!(pipeline.run(&mut ctx()).await.is_err());
        assert!(pipeline.run(&mut ctx()).await.is_ok());
        assert_eq!(entries(&log), ["A-before", "A-after", "A-before", "A-after"]);
    }

    #[tokio::test]
    async fn calling_next_twice_is_a_protocol_violation() {
        let log = Log::default();
        let pipeline = Pipeline::builder()
            .with(Probe::new("outer", &log))
            .with(from_fn("twice", |ctx, mut next| Box::pin(async move {
                next.run(ctx).await?;
                next.run(ctx).await
            })))
            .endpoint(terminal(&log))
            .build()
            .unwrap();

        let err = pipeline.run(&mut ctx()).await.unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation { unit: "twice", index: 1 }));
        assert_eq!(entries(&log), ["outer-before", "T", "outer-after"]);
    }

    #[tokio::test]
    async fn shared_unit_serves_two_pipelines() {
        let log = Log::default();
        let shared: BoxedMiddleware = Arc::new(Probe::new("S", &log));

        let first = Pipeline::builder()
            .with_shared(Arc::clone(&shared))
            .endpoint(terminal(&log))
            .build()
            .unwrap();
        let second = Pipeline::builder()
            .with_shared(shared)
            .with(Probe::new("X", &log))
            .endpoint(terminal(&log))
            .build()
            .unwrap();

        first.run(&mut ctx()).await.unwrap();
        second.run(&mut ctx()).await.unwrap();
        assert_eq!(
            entries(&log),
            ["S-before", "T", "S-after", "S-before", "X-before", "T", "X-after", "S-after"]
        );
        assert_eq!(second.unit_names(), ["S", "X"]);
    }

    #[tokio::test]
    async fn next_reports_remaining_units() {
        let counts = Arc::new(Mutex::new(Vec::new()));
        let unit = |counts: &Arc<Mutex<Vec<usize>>>| {
            let counts = Arc::clone(counts);
            from_fn("count", move |ctx, mut next| {
                counts.lock().unwrap().push(next.remaining());
                Box::pin(async move { next.run(ctx).await })
            })
        };

        let pipeline = Pipeline::builder()
            .with(unit(&counts))
            .with(unit(&counts))
            .with(unit(&counts))
            .handler(|_req: Request| async { "ok" })
            .build()
            .unwrap();

        pipeline.run(&mut ctx()).await.unwrap();
        assert_eq!(*counts.lock().unwrap(), [2, 1, 0]);
    }
}
