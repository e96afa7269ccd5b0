//! Static response headers.

use super::{BoxFuture, Middleware, Next, Outcome};
use crate::context::Context;

/// Writes a fixed header onto every response once the chain returns.
///
/// ```rust
/// use kasane::middleware::SetHeader;
///
/// let nosniff = SetHeader::overriding("x-content-type-options", "nosniff");
/// let server = SetHeader::if_missing("server", "kasane");
/// ```
#[derive(Clone, Debug)]
pub struct SetHeader {
    name: String,
    value: String,
    overwrite: bool,
}

impl SetHeader {
    /// Always set, replacing whatever the handler wrote.
    pub fn overriding(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into(), overwrite: true }
    }

    /// Set only if the handler did not set it.
    pub fn if_missing(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into(), overwrite: false }
    }
}

impl Middleware for SetHeader {
    fn name(&self) -> &'static str {
        "set_header"
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, mut next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            next.run(ctx).await?;
            let res = ctx.response_mut();
            if self.overwrite || res.header(&self.name).is_none() {
                res.insert_header(&self.name, self.value.clone());
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;
    use crate::middleware::Pipeline;
    use crate::request::Request;
    use crate::response::Response;

    async fn run(unit: SetHeader) -> Context {
        let pipeline = Pipeline::builder()
            .with(unit)
            .handler(|_req: Request| async {
                Response::builder().header("cache-control", "no-store").text("x")
            })
            .build()
            .unwrap();
        let mut ctx = Context::new(Request::new(Method::GET, "/"));
        pipeline.run(&mut ctx).await.unwrap();
        ctx
    }

    #[tokio::test]
    async fn overriding_replaces() {
        let ctx = run(SetHeader::overriding("cache-control", "public")).await;
        assert_eq!(ctx.response().header("cache-control"), Some("public"));
    }

    #[tokio::test]
    async fn if_missing_respects_handler() {
        let ctx = run(SetHeader::if_missing("cache-control", "public")).await;
        assert_eq!(ctx.response().header("cache-control"), Some("no-store"));

        let ctx = run(SetHeader::if_missing("server", "kasane")).await;
        assert_eq!(ctx.response().header("server"), Some("kasane"));
    }
}
