//! Routing tour: parameters, catch-alls, nested groups, 404/405, fallback.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example routing
//!
//! Try:
//!   curl http://localhost:3000/users/7/posts/3
//!   curl http://localhost:3000/files/docs/guide/intro.md
//!   curl 'http://localhost:3000/search?q=rust&page=2'
//!   curl http://localhost:3000/api/v1/status
//!   curl -H 'x-api-key: demo-key' http://localhost:3000/api/v1/private
//!   curl -i -X DELETE http://localhost:3000/users/7/posts/3   # 405 + allow
//!   curl -i http://localhost:3000/nowhere                     # custom fallback

use kasane::middleware::{ApiKey, Recover, SetHeader, Trace};
use kasane::{Error, Json, Request, Router, Server, StatusCode};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let private = Router::new()
        .with(ApiKey::new(["demo-key"]))
        .get("/", |_req: Request| async { "secret stuff" });

    let v1 = Router::new()
        .with(SetHeader::overriding("x-api-version", "1"))
        .get("/status", |_req: Request| async { Json(json!({ "status": "ok" })) })
        .nest("/private", private);

    let app = Router::new()
        .with(Trace)
        .with(Recover::new())
        .get("/users/{id}/posts/{post}", user_post)
        .put("/users/{id}/posts/{post}", user_post)
        .get("/files/{*path}", file)
        .get("/search", search)
        .nest("/api/v1", v1)
        .fallback(not_found);

    println!("kasane routing demo on http://localhost:3000");
    for (method, path) in app.routes() {
        println!("  {method:<6} {path}");
    }
    println!("  curl http://localhost:3000/users/7/posts/3");
    println!("  curl -i -X DELETE http://localhost:3000/users/7/posts/3");

    Server::bind("0.0.0.0:3000").serve(app).await
}

async fn user_post(req: Request) -> Json<Value> {
    Json(json!({
        "method": req.method().as_str(),
        "user": req.param("id"),
        "post": req.param("post"),
    }))
}

async fn file(req: Request) -> String {
    format!("would serve `{}`", req.param("path").unwrap_or_default())
}

async fn search(req: Request) -> Json<Value> {
    let page: u32 = req.query_param("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    Json(json!({ "q": req.query_param("q"), "page": page }))
}

async fn not_found(req: Request) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "no such route", "path": req.path() })),
    )
}
