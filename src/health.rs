//! Built-in Kubernetes health-check handlers.
//!
//! Kubernetes asks two questions. kasane answers them.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readyz` | Can the pod serve traffic? Failure → pulled from load-balancer. |
//!
//! Register them on your router:
//!
//! ```rust,no_run
//! use kasane::{Router, health};
//!
//! let app = Router::new()
//!     .get("/healthz", health::liveness)
//!     .get("/readyz", health::readiness);
//! ```
//!
//! When the pod needs a warm-up period, or should leave the load balancer
//! before shutting down, serve a [`Readiness`] flag instead:
//!
//! ```rust,no_run
//! use kasane::{Router, health::Readiness};
//!
//! let ready = Readiness::new(false);
//! let app = Router::new().endpoint(kasane::Method::GET, "/readyz", ready.clone());
//! // ...once caches are warm:
//! ready.set(true);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use http::StatusCode;

use crate::context::Context;
use crate::handler::{BoxFuture, Endpoint, Outcome};
use crate::request::Request;
use crate::response::Response;

/// Kubernetes liveness probe handler.
///
/// Always returns `200 OK` with body `"ok"`. If the process can respond to
/// HTTP at all, it is alive.
pub async fn liveness(_req: Request) -> Response {
    Response::text("ok")
}

/// Kubernetes readiness probe handler for services with nothing to wait on.
///
/// Returns `200 OK` with body `"ready"`.
pub async fn readiness(_req: Request) -> Response {
    Response::text("ready")
}

/// A readiness probe backed by a shared flag.
///
/// Clones share the flag, so one clone can be registered as an endpoint
/// while another is flipped by application code.
#[derive(Clone, Debug)]
pub struct Readiness {
    ready: Arc<AtomicBool>,
}

impl Readiness {
    pub fn new(ready: bool) -> Self {
        Self { ready: Arc::new(AtomicBool::new(ready)) }
    }

    pub fn set(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

impl Default for Readiness {
    fn default() -> Self { Self::new(true) }
}

impl Endpoint for Readiness {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Outcome> {
        let response = if self.is_ready() {
            Response::text("ready")
        } else {
            Response::builder()
                .status(StatusCode::SERVICE_UNAVAILABLE)
                .text("not ready")
        };
        ctx.set_response(response);
        Box::pin(async { Ok(()) })
    }
}
