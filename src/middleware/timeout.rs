//! Request deadline.

use std::time::Duration;

use tracing::warn;

use super::{BoxFuture, Middleware, Next, Outcome};
use crate::context::Context;
use crate::error::Error;

/// Drops the downstream chain if it has not finished within the budget and
/// fails with [`Error::Timeout`] (a `504` once [`Recover`](super::Recover)
/// or the server turns it into a response).
///
/// Place it near the front: only units after it are covered.
#[derive(Clone, Copy, Debug)]
pub struct Timeout {
    budget: Duration,
}

impl Timeout {
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }
}

impl Middleware for Timeout {
    fn name(&self) -> &'static str {
        "timeout"
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, mut next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            match tokio::time::timeout(self.budget, next.run(ctx)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(path = %ctx.request().path(), budget = ?self.budget, "request timed out");
                    Err(Error::Timeout(self.budget))
                }
            }
        })
    }
}
