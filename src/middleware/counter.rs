//! Shared request counter.

use std::sync::atomic::{AtomicU64, Ordering};

use super::{BoxFuture, Middleware, Next, Outcome};
use crate::context::Context;

/// Counts requests that reach it and reports the running total in
/// `x-request-count`.
///
/// The count is unit-local state guarded by an atomic; wrap the counter in
/// an `Arc` to read it from elsewhere or to share it between routers.
#[derive(Debug, Default)]
pub struct RequestCounter {
    count: AtomicU64,
}

impl RequestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Middleware for RequestCounter {
    fn name(&self) -> &'static str {
        "request_counter"
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, mut next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let n = self.count.fetch_add(1, Ordering::Relaxed) + 1;
            next.run(ctx).await?;
            ctx.response_mut().insert_header("x-request-count", n.to_string());
            Ok(())
        })
    }
}
