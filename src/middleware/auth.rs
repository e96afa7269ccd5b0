//! Credential checks that short-circuit unauthenticated requests.

use http::StatusCode;

use super::{BoxFuture, Middleware, Next, Outcome};
use crate::context::Context;
use crate::response::Response;

/// Requires `authorization: Bearer <token>` with one of the configured
/// tokens. Anything else gets a `401` with a `www-authenticate` challenge
/// and the rest of the chain never runs.
#[derive(Clone, Debug)]
pub struct BearerAuth {
    tokens: Vec<String>,
    realm: String,
}

impl BearerAuth {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { tokens: tokens.into_iter().map(Into::into).collect(), realm: "api".to_owned() }
    }

    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    fn token<'r>(&self, ctx: &'r Context) -> Option<&'r str> {
        let value = ctx.request().header("authorization")?;
        let (scheme, token) = value.split_once(' ')?;
        scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
    }
}

impl Middleware for BearerAuth {
    fn name(&self) -> &'static str {
        "bearer_auth"
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, mut next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let authorized = self.token(ctx).is_some_and(|t| self.tokens.iter().any(|k| k == t));
            if !authorized {
                let mut res = Response::error(StatusCode::UNAUTHORIZED, "missing or invalid bearer token");
                res.insert_header("www-authenticate", format!(r#"Bearer realm="{}""#, self.realm));
                ctx.set_response(res);
                return Ok(());
            }
            next.run(ctx).await
        })
    }
}

/// Requires a known key in a header (`x-api-key` by default); `401`
/// otherwise.
#[derive(Clone, Debug)]
pub struct ApiKey {
    header: &'static str,
    keys: Vec<String>,
}

impl ApiKey {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { header: "x-api-key", keys: keys.into_iter().map(Into::into).collect() }
    }

    pub fn header(mut self, name: &'static str) -> Self {
        self.header = name;
        self
    }
}

impl Middleware for ApiKey {
    fn name(&self) -> &'static str {
        "api_key"
    }

    fn handle<'a>(&'a self, ctx: &'a mut Context, mut next: Next<'a>) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let presented = ctx.request().header(self.header);
            if !presented.is_some_and(|p| self.keys.iter().any(|k| k == p)) {
                ctx.set_response(Response::error(StatusCode::UNAUTHORIZED, "missing or invalid api key"));
                return Ok(());
            }
            next.run(ctx).await
        })
    }
}
