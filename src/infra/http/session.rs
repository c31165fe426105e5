//! Cookie session resolution and authentication extractors.
//!
//! A middleware resolves the session cookie once per request and stores the
//! user in request extensions; the extractors below only read from there.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::{Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use crate::domain::entities::UserRecord;

use super::public::HttpState;

pub const SESSION_COOKIE: &str = "yatube_session";

/// Build the login redirect for an unauthenticated request, carrying the
/// original URL in the `next` parameter.
pub fn login_redirect_target(next: &str) -> String {
    format!("/auth/login/?next={}", urlencoding::encode(next))
}

/// Resolve the session cookie to a user and stash it in request extensions.
///
/// Resolution failures are treated as "not signed in": the page still
/// renders, and the warning leaves a trail for the operator.
pub async fn resolve_session(
    State(state): State<HttpState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        match state.accounts.resolve_session(cookie.value()).await {
            Ok(Some(user)) => {
                request.extensions_mut().insert(user);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(
                    target = "yatube::http::session",
                    error = %err,
                    "failed to resolve session cookie"
                );
            }
        }
    }

    next.run(request).await
}

/// Authenticated user extractor; rejects with a redirect to the login page.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserRecord);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<UserRecord>() {
            Some(user) => Ok(Self(user.clone())),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str())
                    .unwrap_or("/");
                Err(Redirect::to(&login_redirect_target(next)))
            }
        }
    }
}

/// Optional authenticated user extractor.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<UserRecord>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<UserRecord>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_redirect_escapes_next() {
        assert_eq!(
            login_redirect_target("/new/"),
            "/auth/login/?next=%2Fnew%2F"
        );
        assert_eq!(
            login_redirect_target("/follow/?page=2"),
            "/auth/login/?next=%2Ffollow%2F%3Fpage%3D2"
        );
    }
}
