//! Middleware showcase: ordering, short-circuiting, timing, recovery.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example middleware
//!
//! Try:
//!   curl -i http://localhost:3000/                # watch the console for the onion order
//!   curl -i http://localhost:3000/admin/stats     # 401, handler never runs
//!   curl -i -H 'authorization: Bearer s3cret' http://localhost:3000/admin/stats
//!   curl -i http://localhost:3000/fail            # error turned into a 500 by Recover
//!   curl -i http://localhost:3000/slow            # 504 from Timeout

use std::sync::Arc;
use std::time::Duration;

use kasane::middleware::{
    BearerAuth, BoxFuture, Middleware, Next, Outcome, Recover, RequestCounter, RequestId,
    ResponseTime, Timeout, Trace, from_fn,
};
use kasane::{Context, Error, Request, Router, Server};
use tracing_subscriber::EnvFilter;

/// Prints when its before and after phases run.
struct Announce(&'static str);

impl Middleware for Announce {
    fn name(&self) -> &'static str {
        self.0
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, mut next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            println!("  -> {} (before, {} unit(s) ahead)", self.0, next.remaining());
            let outcome = next.run(ctx).await;
            println!("  <- {} (after, status {})", self.0, ctx.response().status_code());
            outcome
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let counter = Arc::new(RequestCounter::new());

    let admin = Router::new()
        .with(BearerAuth::new(["s3cret"]).realm("admin"))
        .get("/stats", |_req: Request| async { "42 widgets sold" });

    let app = Router::new()
        .with(Trace)
        .with(RequestId::default())
        .with(Recover::new())
        .with(ResponseTime)
        .with(Arc::clone(&counter))
        .with(Announce("outer"))
        .with(Announce("inner"))
        .with(from_fn("stamp", |ctx, mut next| Box::pin(async move {
            next.run(ctx).await?;
            ctx.response_mut().insert_header("x-demo", "middleware");
            Ok(())
        })))
        .get("/", |_req: Request| async {
            println!("  == handler");
            "hello from the middle of the onion"
        })
        .get("/fail", fail)
        .nest("/slow", Router::new().with(Timeout::new(Duration::from_millis(500))).get("/", slow))
        .nest("/admin", admin);

    println!("kasane middleware demo on http://localhost:3000");
    println!("  curl -i http://localhost:3000/");
    println!("  curl -i http://localhost:3000/admin/stats");
    println!("  curl -i -H 'authorization: Bearer s3cret' http://localhost:3000/admin/stats");
    println!("  curl -i http://localhost:3000/fail");
    println!("  curl -i http://localhost:3000/slow");

    Server::bind("0.0.0.0:3000").serve(app).await?;
    println!("served {} request(s)", counter.count());
    Ok(())
}

async fn fail(_req: Request) -> Result<&'static str, Error> {
    Err(Error::middleware("the flux capacitor is out of flux"))
}

async fn slow(_req: Request) -> &'static str {
    tokio::time::sleep(Duration::from_secs(2)).await;
    "too late"
}
