//! Turns downstream errors into responses.

use http::StatusCode;
use tracing::{error, warn};

use super::{BoxFuture, Middleware, Next, Outcome};
use crate::context::Context;
use crate::error::Error;
use crate::response::Response;

/// Catches any error raised further down the chain and replaces the
/// response with a JSON error envelope carrying [`Error::http_status`].
///
/// Register it first so its "after" phase wraps everything else. Server
/// errors are logged at `error` and, unless [`expose_errors`] is set, their
/// message is replaced with the canonical reason phrase.
///
/// [`expose_errors`]: Recover::expose_errors
#[derive(Clone, Copy, Debug, Default)]
pub struct Recover {
    expose: bool,
}

impl Recover {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends internal error messages to clients. Development only.
    pub fn expose_errors(mut self, expose: bool) -> Self {
        self.expose = expose;
        self
    }

    fn message(&self, err: &Error, status: StatusCode) -> String {
        match err {
            Error::Status { message, .. } => message.clone(),
            _ if status.is_server_error() && !self.expose => {
                status.canonical_reason().unwrap_or("error").to_lowercase()
            }
            _ => err.to_string(),
        }
    }
}

impl Middleware for Recover {
    fn name(&self) -> &'static str {
        "recover"
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, mut next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let Err(err) = next.run(ctx).await else {
                return Ok(());
            };

            let status = err.http_status();
            if status.is_server_error() {
                error!(error = %err, path = %ctx.request().path(), "recovered from failed request");
            } else {
                warn!(error = %err, path = %ctx.request().path(), "request rejected");
            }
            ctx.set_response(Response::error(status, &self.message(&err, status)));
            Ok(())
        })
    }
}
