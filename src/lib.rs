//! # kasane
//!
//! A minimal HTTP framework for Rust services built around one idea: every
//! request flows through an ordered stack of middleware wrapped around a
//! single terminal handler.
//!
//! ## The model
//!
//! ```text
//!   A.before ─▶ B.before ─▶ handler ─▶ B.after ─▶ A.after
//! ```
//!
//! - Units run their *before* phase in registration order and their *after*
//!   phase in reverse order.
//! - A unit that returns without calling [`Next::run`](middleware::Next::run)
//!   short-circuits: nothing after it runs, and the units before it still
//!   get their *after* phase.
//! - Errors travel outward through every unit's `next` call site, so an
//!   outer unit like [`Recover`](middleware::Recover) can turn them back into
//!   responses.
//! - Each request owns its own [`Context`]; a pipeline is built once and
//!   shared by any number of concurrent requests.
//!
//! What's included:
//!
//! - Radix-tree routing via [`matchit`], with per-group middleware
//! - Built-in middleware: tracing, request ids, CORS, auth, timeouts
//! - HTTP/1.1 and HTTP/2 via hyper, graceful shutdown on SIGTERM / Ctrl-C
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use kasane::middleware::{Recover, RequestId, Trace};
//! use kasane::{Json, Request, Response, Router, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), kasane::Error> {
//!     let app = Router::new()
//!         .with(Trace)
//!         .with(RequestId::default())
//!         .with(Recover::default())
//!         .get("/users/{id}", get_user)
//!         .post("/users", create_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await
//! }
//!
//! async fn get_user(req: Request) -> Json<serde_json::Value> {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Json(serde_json::json!({ "id": id }))
//! }
//!
//! async fn create_user(req: Request) -> Response {
//!     if req.body().is_empty() {
//!         return Response::status(StatusCode::BAD_REQUEST);
//!     }
//!     Response::builder()
//!         .status(StatusCode::CREATED)
//!         .header("location", "/users/99")
//!         .json(req.body().clone())
//! }
//! ```

mod config;
mod context;
mod error;
mod request;
mod response;
mod router;
mod server;

pub mod handler;
pub mod health;
pub mod middleware;

pub use config::ServerConfig;
pub use context::Context;
pub use error::{BoxError, Error};
pub use handler::{Endpoint, Handler};
pub use http::{Method, StatusCode};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Json, Response, ResponseBuilder};
pub use router::Router;
pub use server::{Server, shutdown_signal};
