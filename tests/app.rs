//! A realistic application stack driven in-process through `Router::call`.

use std::sync::Arc;
use std::time::Duration;

use kasane::middleware::{
    BearerAuth, Cors, Recover, RequestCounter, RequestId, ResponseTime, SetHeader, Timeout, Trace,
};
use kasane::{Error, Json, Method, Request, Router, StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, PartialEq)]
struct Echo {
    name: String,
}

fn app(counter: Arc<RequestCounter>) -> Router {
    let admin = Router::new()
        .with(BearerAuth::new(["s3cret"]))
        .get("/stats", |_req: Request| async { "stats" })
        .get("/", |_req: Request| async { "admin home" });

    Router::new()
        .with(Trace)
        .with(RequestId::default())
        .with(Recover::new())
        .with(ResponseTime)
        .with(counter)
        .with(Cors::new().allow_origin("https://app.example.com"))
        .with(SetHeader::if_missing("cache-control", "no-store"))
        .post("/echo", |req: Request| async move {
            let echo: Echo = req.json()?;
            Ok::<_, Error>(Json(echo))
        })
        .get("/fail", |_req: Request| async {
            Err::<&str, _>(Error::status(StatusCode::CONFLICT, "already exists"))
        })
        .nest(
            "/slow",
            Router::new()
                .with(Timeout::new(Duration::from_millis(50)))
                .get("/", |_req: Request| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
        )
        .nest("/admin", admin)
}

#[tokio::test]
async fn json_round_trip_with_ambient_headers() {
    let app = app(Arc::new(RequestCounter::new()));

    let req = Request::new(Method::POST, "/echo")
        .with_header("content-type", "application/json")
        .with_body(r#"{"name":"kasane"}"#);
    let res = app.call(req).await;

    assert_eq!(res.status_code(), StatusCode::OK);
    let echo: Echo = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(echo, Echo { name: "kasane".into() });
    assert!(res.header("x-request-id").is_some());
    assert!(res.header("x-response-time").is_some_and(|t| t.ends_with("ms")));
    assert_eq!(res.header("x-request-count"), Some("1"));
    assert_eq!(res.header("cache-control"), Some("no-store"));
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = app(Arc::new(RequestCounter::new()));
    let res = app.call(Request::new(Method::POST, "/echo").with_body("{nope")).await;
    assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_errors_keep_their_status_and_message() {
    let app = app(Arc::new(RequestCounter::new()));
    let res = app.call(Request::new(Method::GET, "/fail")).await;

    assert_eq!(res.status_code(), StatusCode::CONFLICT);
    let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(body["error"], "already exists");
    // RequestId wraps Recover, so the recovered response is still tagged.
    assert!(res.header("x-request-id").is_some());
}

#[tokio::test]
async fn group_auth_only_guards_the_group() {
    let app = app(Arc::new(RequestCounter::new()));

    let res = app.call(Request::new(Method::GET, "/admin/stats")).await;
    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    assert!(res.header("www-authenticate").is_some());

    let req = Request::new(Method::GET, "/admin/stats").with_header("authorization", "Bearer s3cret");
    let res = app.call(req).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.body().as_ref(), b"stats");

    let req = Request::new(Method::GET, "/admin").with_header("authorization", "Bearer s3cret");
    assert_eq!(app.call(req).await.body().as_ref(), b"admin home");

    let res = app.call(Request::new(Method::POST, "/echo").with_body(r#"{"name":"x"}"#)).await;
    assert_eq!(res.status_code(), StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn slow_group_times_out() {
    let app = app(Arc::new(RequestCounter::new()));
    let res = app.call(Request::new(Method::GET, "/slow")).await;
    assert_eq!(res.status_code(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn preflight_is_answered_before_routing_matters() {
    let app = app(Arc::new(RequestCounter::new()));

    let req = Request::new(Method::OPTIONS, "/echo")
        .with_header("origin", "https://app.example.com")
        .with_header("access-control-request-method", "POST");
    let res = app.call(req).await;
    assert_eq!(res.status_code(), StatusCode::NO_CONTENT);
    assert_eq!(res.header("access-control-allow-origin"), Some("https://app.example.com"));

    let req = Request::new(Method::OPTIONS, "/echo")
        .with_header("origin", "https://evil.example.com")
        .with_header("access-control-request-method", "POST");
    assert_eq!(app.call(req).await.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unmatched_paths_still_pass_through_global_middleware() {
    let counter = Arc::new(RequestCounter::new());
    let app = app(Arc::clone(&counter));

    let res = app.call(Request::new(Method::GET, "/missing")).await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    assert!(res.header("x-request-id").is_some());

    let res = app.call(Request::new(Method::DELETE, "/echo")).await;
    assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(res.header("allow"), Some("POST"));

    assert_eq!(counter.count(), 2);
}
