use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, OriginalUri, Path, Query, State},
    http::{
        StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tracing::error;

use crate::{
    application::{
        accounts::AccountService,
        comments::CommentService,
        error::ErrorReport,
        feed::{FeedError, FeedService},
        follows::FollowService,
        groups::GroupService,
        pagination::PageQuery,
        posts::PostService,
    },
    cache::{CacheState, response_cache_layer},
    infra::uploads::{UploadStorage, UploadStorageError},
    presentation::views::{
        AboutAuthorTemplate, AboutTechTemplate, FollowContext, FollowTemplate, GroupContext,
        GroupTemplate, IndexContext, IndexTemplate, LayoutChrome, LayoutContext, PostDetailContext,
        PostDetailTemplate, PostListView, ProfileContext, ProfileTemplate,
        render_not_found_response, render_server_error_response, render_template_response,
    },
};

use super::{
    auth, follows,
    middleware::{log_responses, set_request_context},
    posts,
    session::{self, MaybeUser},
};

const STYLESHEET: &str = include_str!("../../../static/style.css");

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub follows: Arc<FollowService>,
    pub accounts: Arc<AccountService>,
    pub groups: Arc<GroupService>,
    pub uploads: Arc<UploadStorage>,
    pub upload_limit_bytes: usize,
    pub cache: Option<CacheState>,
}

pub fn build_router(state: HttpState) -> Router {
    // The home page is the only cached route; entries vary by cookie.
    let cached_home = Router::new().route("/", get(index));
    let cached_home = if let Some(cache_state) = state.cache.clone() {
        cached_home.layer(middleware::from_fn_with_state(
            cache_state,
            response_cache_layer,
        ))
    } else {
        cached_home
    };

    // Post forms accept multipart image uploads and get the larger body limit.
    let post_forms = Router::new()
        .route("/new/", get(posts::new_post_form).post(posts::create_post))
        .route(
            "/{username}/{post_id}/edit/",
            get(posts::edit_post_form).post(posts::update_post),
        )
        .layer(DefaultBodyLimit::max(state.upload_limit_bytes));

    let routes = Router::new()
        .route("/follow/", get(follows::follow_index))
        .route("/group/{slug}/", get(group_posts))
        .route("/about/author/", get(about_author))
        .route("/about/tech/", get(about_tech))
        .route("/auth/signup/", get(auth::signup_form).post(auth::signup))
        .route("/auth/login/", get(auth::login_form).post(auth::login))
        .route("/auth/logout/", post(auth::logout))
        .route("/media/{*path}", get(serve_media))
        .route("/static/style.css", get(stylesheet))
        .route("/{username}/", get(profile))
        .route(
            "/{username}/follow/",
            get(follows::follow_author).post(follows::follow_author),
        )
        .route(
            "/{username}/unfollow/",
            get(follows::unfollow_author).post(follows::unfollow_author),
        )
        .route("/{username}/{post_id}/", get(post_detail))
        .route("/{username}/{post_id}/delete/", post(posts::delete_post))
        .route("/{username}/{post_id}/comment/", post(posts::add_comment))
        .fallback(fallback);

    cached_home
        .merge(post_forms)
        .merge(routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::resolve_session,
        ))
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
        .with_state(state)
}

/// Parse the `{post_id}` path segment; non-numeric ids are a 404, not a 400.
pub(super) fn parse_post_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}

pub(super) fn feed_error_to_response(
    source: &'static str,
    err: FeedError,
    chrome: LayoutChrome,
    path: &str,
) -> Response {
    match err {
        FeedError::NotFound { .. } => render_not_found_response(chrome, Some(path)),
        other => {
            let report =
                ErrorReport::from_error(source, StatusCode::INTERNAL_SERVER_ERROR, &other);
            render_server_error_response(chrome, report)
        }
    }
}

async fn index(
    State(state): State<HttpState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = LayoutChrome::new(user.as_ref());

    match state.feed.index_page(query.requested()).await {
        Ok(page) => {
            let content = IndexContext {
                list: PostListView::build(&page, "/"),
            };
            let view = LayoutContext::new(chrome, content);
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response("infra::http::index", err, chrome, "/"),
    }
}

async fn group_posts(
    State(state): State<HttpState>,
    MaybeUser(user): MaybeUser,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = LayoutChrome::new(user.as_ref());
    let path = format!("/group/{slug}/");

    match state.feed.group_page(&slug, query.requested()).await {
        Ok((group, page)) => {
            let content = GroupContext::build(&group, &page);
            let view = LayoutContext::new(chrome, content);
            render_template_response(GroupTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response("infra::http::group_posts", err, chrome, &path),
    }
}

async fn profile(
    State(state): State<HttpState>,
    MaybeUser(user): MaybeUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let chrome = LayoutChrome::new(user.as_ref());
    let path = format!("/{username}/");
    let viewer = user.as_ref().map(|user| user.id);

    match state
        .feed
        .profile_page(&username, viewer, query.requested())
        .await
    {
        Ok(profile) => {
            let content = ProfileContext::build(&profile, viewer.is_some());
            let view = LayoutContext::new(chrome, content);
            render_template_response(ProfileTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response("infra::http::profile", err, chrome, &path),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    MaybeUser(user): MaybeUser,
    Path((username, post_id)): Path<(String, String)>,
) -> Response {
    let chrome = LayoutChrome::new(user.as_ref());
    let path = format!("/{username}/{post_id}/");

    let Some(post_id) = parse_post_id(&post_id) else {
        return render_not_found_response(chrome, Some(&path));
    };

    match state.feed.post_detail(&username, post_id).await {
        Ok(Some(detail)) => {
            let content = PostDetailContext::build(&detail, user.as_ref());
            let view = LayoutContext::new(chrome, content);
            render_template_response(PostDetailTemplate { view }, StatusCode::OK)
        }
        Ok(None) => render_not_found_response(chrome, Some(&path)),
        Err(err) => feed_error_to_response("infra::http::post_detail", err, chrome, &path),
    }
}

async fn serve_media(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::serve_media";

    match state.uploads.read(&path).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            (
                [
                    (CONTENT_TYPE, mime.as_ref().to_string()),
                    (CACHE_CONTROL, "public, max-age=3600".to_string()),
                ],
                bytes,
            )
                .into_response()
        }
        Err(UploadStorageError::InvalidPath) => {
            not_found_plain(SOURCE, "The requested file is not available")
        }
        Err(UploadStorageError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            not_found_plain(SOURCE, "The requested file is not available")
        }
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored upload"
            );
            let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
            ErrorReport::from_error(SOURCE, StatusCode::INTERNAL_SERVER_ERROR, &err)
                .attach(&mut response);
            response
        }
    }
}

fn not_found_plain(source: &'static str, detail: &'static str) -> Response {
    let mut response = StatusCode::NOT_FOUND.into_response();
    ErrorReport::from_message(source, StatusCode::NOT_FOUND, detail).attach(&mut response);
    response
}

async fn stylesheet() -> Response {
    (
        [
            (CONTENT_TYPE, "text/css; charset=utf-8"),
            (CACHE_CONTROL, "public, max-age=86400"),
        ],
        STYLESHEET,
    )
        .into_response()
}

async fn about_author(MaybeUser(user): MaybeUser) -> Response {
    let view = LayoutContext::new(LayoutChrome::new(user.as_ref()), ());
    render_template_response(AboutAuthorTemplate { view }, StatusCode::OK)
}

async fn about_tech(MaybeUser(user): MaybeUser) -> Response {
    let view = LayoutContext::new(LayoutChrome::new(user.as_ref()), ());
    render_template_response(AboutTechTemplate { view }, StatusCode::OK)
}

pub(super) async fn follow_feed_response(
    state: &HttpState,
    viewer: &crate::domain::entities::UserRecord,
    requested: u32,
) -> Response {
    let chrome = LayoutChrome::new(Some(viewer));

    match state.feed.follow_page(viewer.id, requested).await {
        Ok(page) => {
            let content = FollowContext {
                list: PostListView::build(&page, "/follow/"),
            };
            let view = LayoutContext::new(chrome, content);
            render_template_response(FollowTemplate { view }, StatusCode::OK)
        }
        Err(err) => feed_error_to_response("infra::http::follow_index", err, chrome, "/follow/"),
    }
}

async fn fallback(MaybeUser(user): MaybeUser, OriginalUri(uri): OriginalUri) -> Response {
    let chrome = LayoutChrome::new(user.as_ref());
    render_not_found_response(chrome, Some(uri.path()))
}
