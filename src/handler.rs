//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The router holds handlers of *different* types in one table, so every
//! handler is hidden behind a common trait object: [`Endpoint`], the
//! terminal step of a middleware [`Pipeline`](crate::middleware::Pipeline).
//!
//! ```text
//! async fn hello(req: Request) -> Response { … }   ← user writes this
//!        ↓ router.get("/", hello)
//! hello.into_endpoint()                            ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                       ← heap-allocated wrapper
//!        ↓  stored as BoxedEndpoint = Arc<dyn Endpoint>
//! endpoint.call(&mut ctx)  at request time         ← one vtable dispatch
//!        ↓
//! Box::pin(async { ctx.set_response(hello(req).await.into_outcome()?) })
//! ```
//!
//! Handlers get an owned clone of the request (the body is shared `Bytes`,
//! so this copies headers and path only) and return a value. Code that
//! needs the whole `&mut Context` implements [`Endpoint`] directly or goes
//! through [`endpoint_fn`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::StatusCode;
use serde::Serialize;

use crate::context::Context;
use crate::error::Error;
use crate::request::Request;
use crate::response::{IntoResponse, Json, Response};

// ── Shared types ──────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future borrowing from `'a`.
///
/// `Pin<Box<…>>` because the runtime polls the future in place; `Send` so
/// tokio can move it between worker threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What every middleware unit and endpoint returns: the response lives in
/// the context, so success carries no value.
pub type Outcome = Result<(), Error>;

// ── Endpoint ──────────────────────────────────────────────────────────────────

/// The terminal step of a pipeline: produces the response into the context.
pub trait Endpoint: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Outcome>;
}

/// A type-erased endpoint shared across concurrent requests and pipelines.
pub type BoxedEndpoint = Arc<dyn Endpoint>;

/// Adapts a closure over `&mut Context` into an [`Endpoint`].
///
/// ```rust
/// use kasane::handler::endpoint_fn;
/// use kasane::Response;
///
/// let teapot = endpoint_fn(|ctx| Box::pin(async move {
///     ctx.set_response(Response::text("short and stout"));
///     Ok(())
/// }));
/// ```
pub fn endpoint_fn<F>(f: F) -> EndpointFn<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
{
    EndpointFn(f)
}

/// Returned by [`endpoint_fn`].
pub struct EndpointFn<F>(F);

impl<F> Endpoint for EndpointFn<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Outcome> {
        (self.0)(ctx)
    }
}

// ── HandlerOutput ─────────────────────────────────────────────────────────────

/// Values a handler may return: anything that is a response, or a
/// `Result` whose error becomes a pipeline error.
pub trait HandlerOutput: Send + 'static {
    fn into_outcome(self) -> Result<Response, Error>;
}

macro_rules! infallible_output {
    ($($ty:ty),* $(,)?) => {
        $(impl HandlerOutput for $ty {
            fn into_outcome(self) -> Result<Response, Error> {
                Ok(self.into_response())
            }
        })*
    };
}

infallible_output!(Response, &'static str, String, StatusCode);

impl<T: Serialize + Send + 'static> HandlerOutput for Json<T> {
    fn into_outcome(self) -> Result<Response, Error> {
        Ok(self.into_response())
    }
}

impl<R: IntoResponse + Send + 'static> HandlerOutput for (StatusCode, R) {
    fn into_outcome(self) -> Result<Response, Error> {
        Ok(self.into_response())
    }
}

impl<R, E> HandlerOutput for Result<R, E>
where
    R: IntoResponse + Send + 'static,
    E: Into<Error> + Send + 'static,
{
    fn into_outcome(self) -> Result<Response, Error> {
        self.map(IntoResponse::into_response).map_err(Into::into)
    }
}

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` (or closure returning a future) with the signature:
///
/// ```text
/// async fn name(req: Request) -> impl HandlerOutput
/// ```
///
/// The trait is **sealed**: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_endpoint(self) -> BoxedEndpoint;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerOutput,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerOutput,
{
    fn into_endpoint(self) -> BoxedEndpoint {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Bridges a typed handler function into the [`Endpoint`] trait object.
struct FnHandler<F>(F);

impl<F, Fut, R> Endpoint for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: HandlerOutput,
{
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Outcome> {
        let fut = (self.0)(ctx.request().clone());
        Box::pin(async move {
            let response = fut.await.into_outcome()?;
            ctx.set_response(response);
            Ok(())
        })
    }
}
