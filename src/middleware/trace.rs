//! Per-request tracing span.

use std::time::Instant;

use tracing::{Instrument, error, info, info_span, warn};

use super::{BoxFuture, Middleware, Next, Outcome};
use crate::context::Context;

/// Opens an `info` span per request carrying method, path and, when
/// [`RequestId`](super::RequestId) runs anywhere in the chain, the request
/// id. Logs one line when the downstream chain completes.
///
/// Server errors log at `error`, client errors at `warn`, the rest at `info`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Trace {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for Trace {
    fn name(&self) -> &'static str {
        "trace"
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, mut next: Next<'a>) -> BoxFuture<'a, Outcome> {
        let span = info_span!(
            "request",
            method = %ctx.request().method(),
            path = %ctx.request().path(),
            request_id = tracing::field::Empty,
        );
        let upstream_id = ctx.request_id().is_some();
        if let Some(id) = ctx.request_id() {
            span.record("request_id", id);
        }

        Box::pin(async move {
            let start = Instant::now();
            let result = next.run(ctx).instrument(span.clone()).await;
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
            // A `RequestId` registered after this unit has assigned it by now.
            if let Some(id) = ctx.request_id().filter(|_| !upstream_id) {
                span.record("request_id", id);
            }

            match &result {
                Ok(()) => {
                    let status = ctx.response().status_code();
                    if status.is_server_error() {
                        error!(parent: &span, status = status.as_u16(), latency_ms, "request completed");
                    } else if status.is_client_error() {
                        warn!(parent: &span, status = status.as_u16(), latency_ms, "request completed");
                    } else {
                        info!(parent: &span, status = status.as_u16(), latency_ms, "request completed");
                    }
                }
                Err(e) => error!(parent: &span, error = %e, latency_ms, "request failed"),
            }
            result
        })
    }
}
