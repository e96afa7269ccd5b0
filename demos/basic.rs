//! Minimal kasane example: a greeting, path parameters, and health checks.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/
//!   curl http://localhost:3000/hello/alice
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl http://localhost:3000/healthz

use kasane::middleware::{Recover, RequestId, Trace};
use kasane::{Error, Json, Request, Response, Router, Server, ServerConfig, StatusCode, health};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;

    let app = Router::new()
        .with(Trace)
        .with(RequestId::default())
        .with(Recover::default())
        .get("/",             index)
        .get("/hello/{name}", hello)
        .get("/users/{id}",   get_user)
        .post("/users",       create_user)
        .get("/healthz",      health::liveness)
        .get("/readyz",       health::readiness);

    println!("kasane basic demo on http://{}", config.addr);
    println!("  curl http://localhost:3000/hello/alice");
    println!("  curl http://localhost:3000/users/42");
    println!("  curl -X POST http://localhost:3000/users -d '{{\"name\":\"alice\"}}'");
    println!("  curl http://localhost:3000/healthz");

    Server::with_config(config).serve(app).await
}

async fn index(_req: Request) -> &'static str {
    "kasane says hi"
}

async fn hello(req: Request) -> String {
    format!("hello, {}!", req.param("name").unwrap_or("stranger"))
}

// GET /users/{id}
async fn get_user(req: Request) -> Json<Value> {
    let id = req.param("id").unwrap_or("unknown");
    Json(json!({ "id": id, "name": "alice" }))
}

#[derive(Deserialize)]
struct CreateUser {
    name: String,
}

// POST /users
//
// A malformed body surfaces as `Error::Json`, which `Recover` turns into a
// 400 response.
async fn create_user(req: Request) -> Result<Response, Error> {
    let input: CreateUser = req.json()?;
    let body = serde_json::to_vec(&json!({ "id": "99", "name": input.name }))?;
    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/users/99")
        .json(body))
}
