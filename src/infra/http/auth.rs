//! Signup, login and logout handlers.

use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;

use crate::{
    application::{
        accounts::{LoginOutcome, SignupInput, SignupOutcome},
        error::HttpError,
    },
    domain::entities::SessionRecord,
    presentation::views::{
        LayoutChrome, LayoutContext, LoginContext, LoginTemplate, SignupContext, SignupTemplate,
        render_template_response,
    },
};

use super::{
    public::HttpState,
    safe_redirect_target,
    session::{MaybeUser, SESSION_COOKIE},
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct NextQuery {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SignupForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    password_confirm: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    next: Option<String>,
}

fn session_cookie(session: &SessionRecord) -> Cookie<'static> {
    let max_age = session.expires_at - session.created_at;
    Cookie::build((SESSION_COOKIE, session.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(axum_extra::extract::cookie::SameSite::Lax)
        .max_age(max_age)
        .build()
}

fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .build()
}

pub(super) async fn signup_form(MaybeUser(user): MaybeUser) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }

    let view = LayoutContext::new(LayoutChrome::new(None), SignupContext::empty());
    render_template_response(SignupTemplate { view }, StatusCode::OK)
}

pub(super) async fn signup(
    State(state): State<HttpState>,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Response {
    let input = SignupInput {
        username: form.username.clone(),
        display_name: (!form.display_name.trim().is_empty())
            .then(|| form.display_name.trim().to_string()),
        password: form.password,
        password_confirm: form.password_confirm,
    };

    match state.accounts.signup(input).await {
        Ok(SignupOutcome::Created { session, .. }) => {
            let jar = jar.add(session_cookie(&session));
            (jar, Redirect::to("/")).into_response()
        }
        Ok(SignupOutcome::Invalid(issues)) => {
            let content = SignupContext {
                username: form.username,
                display_name: form.display_name,
                username_error: issues.username,
                password_error: issues.password,
            };
            let view = LayoutContext::new(LayoutChrome::new(None), content);
            render_template_response(SignupTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::new(
            "infra::http::auth::signup",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            err.to_string(),
        )
        .into_response(),
    }
}

pub(super) async fn login_form(
    MaybeUser(user): MaybeUser,
    Query(query): Query<NextQuery>,
) -> Response {
    if user.is_some() {
        let target = safe_redirect_target(query.next.as_deref(), "/").to_string();
        return Redirect::to(&target).into_response();
    }

    let view = LayoutContext::new(LayoutChrome::new(None), LoginContext::empty(query.next));
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}

pub(super) async fn login(
    State(state): State<HttpState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    match state.accounts.login(&form.username, &form.password).await {
        Ok(LoginOutcome::LoggedIn { session, .. }) => {
            let target = safe_redirect_target(form.next.as_deref(), "/").to_string();
            let jar = jar.add(session_cookie(&session));
            (jar, Redirect::to(&target)).into_response()
        }
        Ok(LoginOutcome::BadCredentials) => {
            let content = LoginContext {
                username: form.username,
                error: Some("Please enter a correct username and password."),
                next: form.next,
            };
            let view = LayoutContext::new(LayoutChrome::new(None), content);
            render_template_response(LoginTemplate { view }, StatusCode::OK)
        }
        Err(err) => HttpError::new(
            "infra::http::auth::login",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            err.to_string(),
        )
        .into_response(),
    }
}

pub(super) async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE)
        && let Err(err) = state.accounts.logout(cookie.value()).await
    {
        return HttpError::new(
            "infra::http::auth::logout",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            err.to_string(),
        )
        .into_response();
    }

    let jar = jar.remove(expired_session_cookie());
    (jar, Redirect::to("/")).into_response()
}
