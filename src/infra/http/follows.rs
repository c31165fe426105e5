//! The followed-authors feed and follow/unfollow actions.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    application::{
        error::HttpError,
        follows::{FollowError, FollowOutcome},
        pagination::PageQuery,
    },
    domain::entities::UserRecord,
    presentation::views::{LayoutChrome, profile_href, render_not_found_response},
};

use super::{
    public::{HttpState, follow_feed_response},
    session::AuthUser,
};

pub(super) async fn follow_index(
    State(state): State<HttpState>,
    AuthUser(user): AuthUser,
    Query(query): Query<PageQuery>,
) -> Response {
    follow_feed_response(&state, &user, query.requested()).await
}

pub(super) async fn follow_author(
    State(state): State<HttpState>,
    AuthUser(user): AuthUser,
    Path(username): Path<String>,
) -> Response {
    let outcome = state.follows.follow(user.id, &username).await;
    follow_outcome_response(outcome, &user, &username, "infra::http::follows::follow")
}

pub(super) async fn unfollow_author(
    State(state): State<HttpState>,
    AuthUser(user): AuthUser,
    Path(username): Path<String>,
) -> Response {
    let outcome = state.follows.unfollow(user.id, &username).await;
    follow_outcome_response(outcome, &user, &username, "infra::http::follows::unfollow")
}

fn follow_outcome_response(
    outcome: Result<FollowOutcome, FollowError>,
    user: &UserRecord,
    username: &str,
    source: &'static str,
) -> Response {
    match outcome {
        // Self-follow is refused silently: the profile page simply reloads.
        Ok(FollowOutcome::Applied) | Ok(FollowOutcome::RefusedSelfFollow) => {
            Redirect::to(&profile_href(username)).into_response()
        }
        Ok(FollowOutcome::AuthorNotFound) => {
            let chrome = LayoutChrome::new(Some(user));
            render_not_found_response(chrome, Some(&profile_href(username)))
        }
        Err(err) => HttpError::new(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            err.to_string(),
        )
        .into_response(),
    }
}
