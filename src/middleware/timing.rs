//! `x-response-time` header.

use std::time::Instant;

use super::{BoxFuture, Middleware, Next, Outcome};
use crate::context::Context;

/// Measures the downstream chain and writes the elapsed wall time, in
/// milliseconds with microsecond precision, to `x-response-time`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResponseTime;

impl ResponseTime {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for ResponseTime {
    fn name(&self) -> &'static str {
        "response_time"
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, mut next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let start = Instant::now();
            next.run(ctx).await?;
            let elapsed = start.elapsed().as_secs_f64() * 1000.0;
            ctx.response_mut().insert_header("x-response-time", format!("{elapsed:.3}ms"));
            Ok(())
        })
    }
}
