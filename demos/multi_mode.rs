//! One application, three middleware stacks, chosen at startup.
//!
//! Run with:
//!   cargo run --example multi_mode -- --mode dev
//!   cargo run --example multi_mode -- --mode prod --port 8080
//!   KASANE_MODE=minimal cargo run --example multi_mode
//!
//! Try:
//!   curl -i http://localhost:3000/
//!   curl -i http://localhost:3000/boom
//!   curl -i http://localhost:3000/slow
//!   curl -i -H 'origin: https://app.example.com' http://localhost:3000/

use std::time::Duration;

use clap::{Parser, ValueEnum};
use kasane::middleware::{Cors, Recover, RequestId, ResponseTime, SetHeader, Timeout, Trace};
use kasane::{Error, Request, Router, Server, ServerConfig, StatusCode, health};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Verbose logs, exposed error messages, permissive CORS.
    Dev,
    /// Hidden error messages, strict CORS, hard timeout, security headers.
    Prod,
    /// Routes only.
    Minimal,
}

#[derive(Parser)]
#[command(name = "multi_mode")]
#[command(about = "kasane demo: pick a middleware stack per environment", long_about = None)]
struct Cli {
    #[arg(short, long, value_enum, env = "KASANE_MODE", default_value = "dev")]
    mode: Mode,

    #[arg(short, long, default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();

    let default_filter = match cli.mode {
        Mode::Dev => "debug",
        Mode::Prod => "info",
        Mode::Minimal => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    let app = stack(cli.mode, routes());

    let names: Vec<String> = app.routes().map(|(m, p)| format!("{m} {p}")).collect();
    println!("kasane multi_mode demo ({:?}) on http://localhost:{}", cli.mode, cli.port);
    println!("  routes: {}", names.join(", "));
    println!("  curl -i http://localhost:{}/", cli.port);
    println!("  curl -i http://localhost:{}/boom", cli.port);
    println!("  curl -i http://localhost:{}/slow", cli.port);

    let config = ServerConfig::new(format!("0.0.0.0:{}", cli.port))
        .drain_timeout(Duration::from_secs(10));
    Server::with_config(config).serve(app).await
}

fn routes() -> Router {
    Router::new()
        .get("/", |_req: Request| async { "hello" })
        .get("/boom", boom)
        .get("/slow", slow)
        .get("/healthz", health::liveness)
}

fn stack(mode: Mode, app: Router) -> Router {
    match mode {
        Mode::Dev => app
            .with(Trace)
            .with(RequestId::default())
            .with(ResponseTime)
            .with(Recover::new().expose_errors(true))
            .with(Cors::permissive()),
        Mode::Prod => app
            .with(Trace)
            .with(RequestId::default())
            .with(Recover::new())
            .with(SetHeader::overriding("x-content-type-options", "nosniff"))
            .with(SetHeader::if_missing("cache-control", "no-store"))
            .with(Cors::new().allow_origin("https://app.example.com"))
            .with(Timeout::new(Duration::from_secs(1))),
        Mode::Minimal => app,
    }
}

async fn boom(_req: Request) -> Result<&'static str, Error> {
    Err(Error::middleware("database connection refused"))
}

async fn slow(_req: Request) -> (StatusCode, &'static str) {
    tokio::time::sleep(Duration::from_secs(2)).await;
    (StatusCode::OK, "finally")
}
