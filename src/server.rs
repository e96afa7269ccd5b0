//! HTTP server and graceful shutdown.
//!
//! Each accepted connection runs in its own task; each request on it is
//! buffered into a [`Request`] and handed to [`Router::call`], which selects
//! the route's middleware pipeline and runs it.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//!
//! The server reacts by:
//! 1. Immediately stopping `listener.accept()`, so no new connections are made.
//! 2. Telling every open connection to close once its in-flight request is
//!    answered. Idle keep-alive connections close immediately. The wait is
//!    bounded by [`ServerConfig::drain_timeout`] when set.
//! 3. Returning from [`Server::serve`], which lets `main` exit cleanly.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

enum Bind {
    Addr,
    Listener(TcpListener),
}

/// The HTTP server.
pub struct Server {
    config: ServerConfig,
    bind: Bind,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called. An unusable address is reported by `serve`.
    ///
    /// ```rust,no_run
    /// use kasane::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: impl Into<String>) -> Self {
        Self::with_config(ServerConfig::new(addr))
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self { config, bind: Bind::Addr }
    }

    /// Serves on an already-bound listener, e.g. one bound to port 0 in tests.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { config: ServerConfig::default(), bind: Bind::Listener(listener) }
    }

    /// Replaces the configuration. The address is ignored for servers made
    /// with [`from_listener`](Server::from_listener).
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by in-flight requests completing).
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), but stops when `signal` resolves.
    pub async fn serve_with_shutdown<F>(self, router: Router, signal: F) -> Result<(), Error>
    where
        F: Future<Output = ()> + Send,
    {
        let listener = match self.bind {
            Bind::Listener(listener) => listener,
            Bind::Addr => {
                self.config.validate()?;
                TcpListener::bind(self.config.addr.as_str()).await?
            }
        };
        let local_addr = listener.local_addr()?;

        // Shared across connection tasks without copying the routing table.
        let router = Arc::new(router);
        let mut conn_builder = ConnBuilder::new(TokioExecutor::new());
        if self.config.http1_only {
            conn_builder = conn_builder.http1_only();
        }
        let conn_builder = Arc::new(conn_builder);

        info!(addr = %local_addr, http1_only = self.config.http1_only, "kasane listening");

        // Every spawned connection task, so shutdown can wait for them.
        let mut tasks = tokio::task::JoinSet::new();
        // Flipped once on shutdown; every connection task watches it.
        let (stop_tx, stop_rx) = watch::channel(false);

        let shutdown = signal;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a signal immediately stops
                // accepting, even if more connections are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    // Ignored when no connection is open.
                    let _ = stop_tx.send(true);
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let conn_builder = Arc::clone(&conn_builder);
                    let io = TokioIo::new(stream);

                    let mut stop = stop_rx.clone();

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            async move { dispatch(router, req, remote_addr).await }
                        });

                        let conn = conn_builder.serve_connection(io, svc);
                        tokio::pin!(conn);

                        let result = tokio::select! {
                            res = conn.as_mut() => res,
                            _ = stop.changed() => {
                                // Finish the in-flight request, then close;
                                // idle keep-alive connections close at once.
                                conn.as_mut().graceful_shutdown();
                                conn.await
                            }
                        };
                        if let Err(e) = result {
                            debug!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished tasks so the set does not grow without bound.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        drain(tasks, &self.config).await;
        info!("kasane stopped");
        Ok(())
    }
}

async fn drain(mut tasks: tokio::task::JoinSet<()>, config: &ServerConfig) {
    let all = async { while tasks.join_next().await.is_some() {} };
    match config.drain_timeout {
        None => all.await,
        Some(limit) => {
            if tokio::time::timeout(limit, all).await.is_err() {
                warn!(timeout = ?limit, remaining = tasks.len(), "drain timeout elapsed, aborting connections");
                tasks.shutdown().await;
            }
        }
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Core hot path: buffers one request, runs it through the router, and
/// converts the resulting response.
///
/// The error type is [`Infallible`](std::convert::Infallible): failures
/// become responses (400 for an unreadable body, the router's error
/// response for pipeline errors) so hyper never sees an error.
async fn dispatch(
    router: Arc<Router>,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, std::convert::Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!(peer = %remote_addr, "failed to read request body: {e}");
            return Ok(Response::error(StatusCode::BAD_REQUEST, "unreadable request body").into_inner());
        }
    };

    let response = router.call(Request::from_parts(parts, body)).await;
    Ok(response.into_inner())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** (sent by `kubectl` and the
/// Kubernetes control plane) and **SIGINT** (Ctrl-C, for local dev).
/// On Windows only Ctrl-C is available. If a handler cannot be installed
/// that arm never fires and the error is logged.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    // `pending()` never resolves, so on non-Unix platforms the SIGTERM arm
    // is effectively disabled.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
