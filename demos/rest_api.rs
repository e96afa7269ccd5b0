//! In-memory REST API: users and posts CRUD over JSON.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example rest_api
//!
//! Try:
//!   curl -X POST http://localhost:3000/users -d '{"name":"alice","email":"alice@example.com"}'
//!   curl http://localhost:3000/users
//!   curl http://localhost:3000/users/1
//!   curl -X PUT http://localhost:3000/users/1 -d '{"name":"alice b","email":"ab@example.com"}'
//!   curl -X POST http://localhost:3000/posts -d '{"user_id":1,"title":"hi","body":"first"}'
//!   curl 'http://localhost:3000/posts?user_id=1'
//!   curl -X DELETE http://localhost:3000/users/1

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use kasane::handler::endpoint_fn;
use kasane::middleware::{Cors, Recover, RequestId, Trace};
use kasane::{
    Context, Error, IntoResponse, Json, Method, Request, Response, Router, Server, StatusCode, health,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Serialize)]
struct User {
    id: u64,
    name: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct UserInput {
    name: String,
    email: String,
}

#[derive(Clone, Debug, Serialize)]
struct Post {
    id: u64,
    user_id: u64,
    title: String,
    body: String,
}

#[derive(Debug, Deserialize)]
struct PostInput {
    user_id: u64,
    title: String,
    body: String,
}

#[derive(Default)]
struct Store {
    users: BTreeMap<u64, User>,
    posts: BTreeMap<u64, Post>,
    next_user: u64,
    next_post: u64,
}

type Db = Arc<RwLock<Store>>;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let db: Db = Arc::default();

    let app = Router::new()
        .with(Trace)
        .with(RequestId::default())
        .with(Recover::new())
        .with(Cors::permissive())
        .get("/users", {
            let db = Arc::clone(&db);
            move |_req: Request| list_users(Arc::clone(&db))
        })
        .post("/users", {
            let db = Arc::clone(&db);
            move |req: Request| create_user(Arc::clone(&db), req)
        })
        .get("/users/{id}", {
            let db = Arc::clone(&db);
            move |req: Request| get_user(Arc::clone(&db), req)
        })
        .put("/users/{id}", {
            let db = Arc::clone(&db);
            move |req: Request| update_user(Arc::clone(&db), req)
        })
        .delete("/users/{id}", {
            let db = Arc::clone(&db);
            move |req: Request| delete_user(Arc::clone(&db), req)
        })
        .get("/posts", {
            let db = Arc::clone(&db);
            move |req: Request| list_posts(Arc::clone(&db), req)
        })
        .post("/posts", {
            let db = Arc::clone(&db);
            move |req: Request| create_post(Arc::clone(&db), req)
        })
        .endpoint(Method::GET, "/stats", {
            let db = Arc::clone(&db);
            endpoint_fn(move |ctx: &mut Context| {
                let stats = read(&db).map(|store| {
                    serde_json::json!({
                        "users": store.users.len(),
                        "posts": store.posts.len(),
                        "request_id": ctx.request_id(),
                    })
                });
                Box::pin(async move {
                    ctx.set_response(Json(stats?).into_response());
                    Ok(())
                })
            })
        })
        .get("/healthz", health::liveness);

    println!("kasane rest_api demo on http://localhost:3000");
    println!("  curl -X POST http://localhost:3000/users -d '{{\"name\":\"alice\",\"email\":\"alice@example.com\"}}'");
    println!("  curl http://localhost:3000/users/1");
    println!("  curl -X POST http://localhost:3000/posts -d '{{\"user_id\":1,\"title\":\"hi\",\"body\":\"first\"}}'");
    println!("  curl 'http://localhost:3000/posts?user_id=1'");
    println!("  curl http://localhost:3000/stats");

    Server::bind("0.0.0.0:3000").serve(app).await
}

// ── Store access ──────────────────────────────────────────────────────────────

fn read(db: &Db) -> Result<std::sync::RwLockReadGuard<'_, Store>, Error> {
    db.read().map_err(|_| Error::middleware("store lock poisoned"))
}

fn write(db: &Db) -> Result<std::sync::RwLockWriteGuard<'_, Store>, Error> {
    db.write().map_err(|_| Error::middleware("store lock poisoned"))
}

fn id_param(req: &Request) -> Result<u64, Error> {
    req.param("id")
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| Error::status(StatusCode::BAD_REQUEST, "id must be a positive integer"))
}

fn not_found(what: &str, id: u64) -> Error {
    Error::status(StatusCode::NOT_FOUND, format!("{what} {id} not found"))
}

// ── Users ─────────────────────────────────────────────────────────────────────

async fn list_users(db: Db) -> Result<Json<Vec<User>>, Error> {
    let store = read(&db)?;
    Ok(Json(store.users.values().cloned().collect()))
}

async fn create_user(db: Db, req: Request) -> Result<Response, Error> {
    let input: UserInput = req.json()?;
    let mut store = write(&db)?;
    store.next_user += 1;
    let user = User { id: store.next_user, name: input.name, email: input.email };
    store.users.insert(user.id, user.clone());

    let mut res = (StatusCode::CREATED, Json(&user)).into_response();
    res.insert_header("location", format!("/users/{}", user.id));
    Ok(res)
}

async fn get_user(db: Db, req: Request) -> Result<Json<User>, Error> {
    let id = id_param(&req)?;
    let store = read(&db)?;
    store.users.get(&id).cloned().map(Json).ok_or_else(|| not_found("user", id))
}

async fn update_user(db: Db, req: Request) -> Result<Json<User>, Error> {
    let id = id_param(&req)?;
    let input: UserInput = req.json()?;
    let mut store = write(&db)?;
    let user = store.users.get_mut(&id).ok_or_else(|| not_found("user", id))?;
    user.name = input.name;
    user.email = input.email;
    Ok(Json(user.clone()))
}

/// Deleting a user also deletes their posts.
async fn delete_user(db: Db, req: Request) -> Result<StatusCode, Error> {
    let id = id_param(&req)?;
    let mut store = write(&db)?;
    store.users.remove(&id).ok_or_else(|| not_found("user", id))?;
    store.posts.retain(|_, post| post.user_id != id);
    Ok(StatusCode::NO_CONTENT)
}

// ── Posts ─────────────────────────────────────────────────────────────────────

async fn list_posts(db: Db, req: Request) -> Result<Json<Vec<Post>>, Error> {
    let author = req.query_param("user_id").and_then(|id| id.parse::<u64>().ok());
    let store = read(&db)?;
    let posts = store.posts.values()
        .filter(|post| author.is_none_or(|id| post.user_id == id))
        .cloned()
        .collect();
    Ok(Json(posts))
}

async fn create_post(db: Db, req: Request) -> Result<(StatusCode, Json<Post>), Error> {
    let input: PostInput = req.json()?;
    let mut store = write(&db)?;
    if !store.users.contains_key(&input.user_id) {
        return Err(Error::status(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("user {} does not exist", input.user_id),
        ));
    }
    store.next_post += 1;
    let post = Post { id: store.next_post, user_id: input.user_id, title: input.title, body: input.body };
    store.posts.insert(post.id, post.clone());
    Ok((StatusCode::CREATED, Json(post)))
}
