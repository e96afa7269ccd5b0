//! Request-id propagation.

use uuid::Uuid;

use super::{BoxFuture, Middleware, Next, Outcome};
use crate::context::Context;

const DEFAULT_HEADER: &str = "x-request-id";
const MAX_LEN: usize = 128;

/// The id assigned to the current request. Read it with
/// [`Context::request_id`] or `ctx.extensions().get::<RequestIdValue>()`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestIdValue(pub String);

/// Reuses the inbound `x-request-id` when it looks sane, otherwise mints a
/// UUID v4. The id goes into the context extensions before `next` runs and
/// onto the response after it returns.
///
/// A unit that replaces the whole response on the way out, like
/// [`Recover`](super::Recover), drops headers set inside it. Register
/// `RequestId` before `Recover` so error responses carry the id too. An
/// error that escapes every unit gets a fresh response without it.
#[derive(Clone, Debug)]
pub struct RequestId {
    header: &'static str,
}

impl Default for RequestId {
    fn default() -> Self {
        Self { header: DEFAULT_HEADER }
    }
}

impl RequestId {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a different header name, e.g. `x-correlation-id`.
    pub fn header(mut self, name: &'static str) -> Self {
        self.header = name;
        self
    }
}

fn acceptable(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_LEN && id.bytes().all(|b| b.is_ascii_graphic())
}

impl Middleware for RequestId {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, mut next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let id = ctx.request().header(self.header)
                .filter(|id| acceptable(id))
                .map(str::to_owned)
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            ctx.extensions_mut().insert(RequestIdValue(id.clone()));

            let result = next.run(ctx).await;
            ctx.response_mut().insert_header(self.header, id);
            result
        })
    }
}
