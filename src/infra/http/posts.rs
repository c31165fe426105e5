//! Post create/edit/delete and comment handlers.

use axum::{
    extract::{Form, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::warn;

use crate::{
    application::{
        comments::AddCommentOutcome,
        error::HttpError,
        posts::{
            CreatePostOutcome, DeletePostOutcome, EditPostOutcome, PostFormIssues, PostInput,
        },
    },
    domain::entities::UserRecord,
    presentation::views::{
        GroupOptionView, LayoutChrome, LayoutContext, ManagePostTemplate, PostFormContext,
        post_detail_href, render_not_found_response, render_template_response,
    },
};

use super::{
    public::{HttpState, parse_post_id},
    safe_redirect_target,
    session::AuthUser,
};

#[derive(Debug, Deserialize)]
pub(super) struct DeletePostForm {
    pub(super) this_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CommentForm {
    #[serde(default)]
    pub(super) text: String,
}

/// Fields read out of the multipart post form.
struct PostFormData {
    input: PostInput,
    image: Option<(String, Bytes)>,
}

async fn read_post_form(mut multipart: Multipart) -> Result<PostFormData, HttpError> {
    const SOURCE: &str = "infra::http::posts::read_post_form";

    let mut input = PostInput::default();
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Malformed form submission",
            err.to_string(),
        )
    })? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("text") => {
                input.text = field.text().await.map_err(|err| {
                    HttpError::new(
                        SOURCE,
                        StatusCode::BAD_REQUEST,
                        "Malformed form submission",
                        err.to_string(),
                    )
                })?;
            }
            Some("group") => {
                let value = field.text().await.map_err(|err| {
                    HttpError::new(
                        SOURCE,
                        StatusCode::BAD_REQUEST,
                        "Malformed form submission",
                        err.to_string(),
                    )
                })?;
                let trimmed = value.trim();
                input.group_slug = if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                };
            }
            Some("image") => {
                let filename = field.file_name().map(str::to_string);
                let data = field.bytes().await.map_err(|err| {
                    HttpError::new(
                        SOURCE,
                        StatusCode::PAYLOAD_TOO_LARGE,
                        "Uploaded image is too large",
                        err.to_string(),
                    )
                })?;
                // Browsers submit an empty file part when nothing was chosen.
                if let Some(filename) = filename
                    && !data.is_empty()
                {
                    image = Some((filename, data));
                }
            }
            _ => {}
        }
    }

    Ok(PostFormData { input, image })
}

async fn store_image(
    state: &HttpState,
    image: Option<(String, Bytes)>,
) -> Result<Option<String>, HttpError> {
    const SOURCE: &str = "infra::http::posts::store_image";

    let Some((filename, data)) = image else {
        return Ok(None);
    };

    match state.uploads.store(&filename, data).await {
        Ok(stored_path) => Ok(Some(stored_path)),
        Err(err) => Err(HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Could not store the uploaded image",
            err.to_string(),
        )),
    }
}

async fn group_options(
    state: &HttpState,
    selected: Option<&str>,
) -> Result<Vec<GroupOptionView>, HttpError> {
    let groups = state.groups.list_all().await.map_err(|err| {
        HttpError::new(
            "infra::http::posts::group_options",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            err.to_string(),
        )
    })?;

    Ok(groups
        .into_iter()
        .map(|group| GroupOptionView {
            selected: selected == Some(group.slug.as_str()),
            slug: group.slug,
            title: group.title,
        })
        .collect())
}

struct PostFormRender<'a> {
    heading: &'static str,
    submit_label: &'static str,
    action: String,
    input: &'a PostInput,
    issues: &'a PostFormIssues,
    current_image: Option<String>,
}

async fn render_post_form(
    state: &HttpState,
    user: &UserRecord,
    render: PostFormRender<'_>,
) -> Response {
    let groups = match group_options(state, render.input.group_slug.as_deref()).await {
        Ok(groups) => groups,
        Err(err) => return err.into_response(),
    };

    let content = PostFormContext {
        heading: render.heading,
        submit_label: render.submit_label,
        action: render.action,
        text: render.input.text.clone(),
        groups,
        text_error: render.issues.text,
        group_error: render.issues.group,
        current_image: render.current_image,
    };

    let view = LayoutContext::new(LayoutChrome::new(Some(user)), content);
    render_template_response(ManagePostTemplate { view }, StatusCode::OK)
}

pub(super) async fn new_post_form(
    State(state): State<HttpState>,
    AuthUser(user): AuthUser,
) -> Response {
    render_post_form(
        &state,
        &user,
        PostFormRender {
            heading: "New post",
            submit_label: "Publish",
            action: "/new/".to_string(),
            input: &PostInput::default(),
            issues: &PostFormIssues::default(),
            current_image: None,
        },
    )
    .await
}

pub(super) async fn create_post(
    State(state): State<HttpState>,
    AuthUser(user): AuthUser,
    multipart: Multipart,
) -> Response {
    let form = match read_post_form(multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };

    let image = match store_image(&state, form.image).await {
        Ok(image) => image,
        Err(err) => return err.into_response(),
    };

    match state.posts.create_post(user.id, form.input.clone(), image).await {
        Ok(CreatePostOutcome::Created(_)) => Redirect::to("/").into_response(),
        Ok(CreatePostOutcome::Invalid(issues)) => {
            render_post_form(
                &state,
                &user,
                PostFormRender {
                    heading: "New post",
                    submit_label: "Publish",
                    action: "/new/".to_string(),
                    input: &form.input,
                    issues: &issues,
                    current_image: None,
                },
            )
            .await
        }
        Err(err) => HttpError::new(
            "infra::http::posts::create_post",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            err.to_string(),
        )
        .into_response(),
    }
}

pub(super) async fn edit_post_form(
    State(state): State<HttpState>,
    AuthUser(user): AuthUser,
    Path((username, post_id)): Path<(String, String)>,
) -> Response {
    let chrome = LayoutChrome::new(Some(&user));
    let path = format!("/{username}/{post_id}/edit/");

    let Some(post_id) = parse_post_id(&post_id) else {
        return render_not_found_response(chrome, Some(&path));
    };

    let existing = match state.posts.find_for_edit(&username, post_id).await {
        Ok(Some(existing)) => existing,
        Ok(None) => return render_not_found_response(chrome, Some(&path)),
        Err(err) => {
            return HttpError::new(
                "infra::http::posts::edit_post_form",
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                err.to_string(),
            )
            .into_response();
        }
    };

    // Only the author gets the form; everyone else lands on the post.
    if existing.post.author_id != user.id {
        return Redirect::to(&post_detail_href(&username, post_id)).into_response();
    }

    let input = PostInput {
        text: existing.post.text.clone(),
        group_slug: existing.group.as_ref().map(|group| group.slug.clone()),
    };

    render_post_form(
        &state,
        &user,
        PostFormRender {
            heading: "Edit post",
            submit_label: "Save",
            action: path,
            input: &input,
            issues: &PostFormIssues::default(),
            current_image: existing.post.image.clone(),
        },
    )
    .await
}

pub(super) async fn update_post(
    State(state): State<HttpState>,
    AuthUser(user): AuthUser,
    Path((username, post_id)): Path<(String, String)>,
    multipart: Multipart,
) -> Response {
    let chrome = LayoutChrome::new(Some(&user));
    let path = format!("/{username}/{post_id}/edit/");

    let Some(post_id) = parse_post_id(&post_id) else {
        return render_not_found_response(chrome, Some(&path));
    };

    let form = match read_post_form(multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };

    let new_image = match store_image(&state, form.image).await {
        Ok(image) => image,
        Err(err) => return err.into_response(),
    };

    match state
        .posts
        .edit_post(user.id, &username, post_id, form.input.clone(), new_image)
        .await
    {
        Ok(EditPostOutcome::Updated(_)) => {
            Redirect::to(&post_detail_href(&username, post_id)).into_response()
        }
        Ok(EditPostOutcome::Invalid(issues)) => {
            let current_image = state
                .posts
                .find_for_edit(&username, post_id)
                .await
                .ok()
                .flatten()
                .and_then(|existing| existing.post.image);

            render_post_form(
                &state,
                &user,
                PostFormRender {
                    heading: "Edit post",
                    submit_label: "Save",
                    action: path,
                    input: &form.input,
                    issues: &issues,
                    current_image,
                },
            )
            .await
        }
        Ok(EditPostOutcome::NotAuthor) => {
            Redirect::to(&post_detail_href(&username, post_id)).into_response()
        }
        Ok(EditPostOutcome::NotFound) => render_not_found_response(chrome, Some(&path)),
        Err(err) => HttpError::new(
            "infra::http::posts::update_post",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            err.to_string(),
        )
        .into_response(),
    }
}

pub(super) async fn delete_post(
    State(state): State<HttpState>,
    AuthUser(user): AuthUser,
    Path((username, post_id)): Path<(String, String)>,
    Form(form): Form<DeletePostForm>,
) -> Response {
    let chrome = LayoutChrome::new(Some(&user));
    let path = format!("/{username}/{post_id}/delete/");

    let Some(post_id) = parse_post_id(&post_id) else {
        return render_not_found_response(chrome, Some(&path));
    };

    match state.posts.delete_post(user.id, &username, post_id).await {
        Ok(DeletePostOutcome::Deleted { image }) => {
            if let Some(stored_path) = image
                && let Err(err) = state.uploads.delete(&stored_path).await
            {
                warn!(
                    target = "infra::http::posts::delete_post",
                    stored_path = %stored_path,
                    error = %err,
                    "post deleted but its image file could not be removed"
                );
            }

            let target = safe_redirect_target(form.this_url.as_deref(), "/");
            // The detail page of the deleted post is gone; send those home.
            let detail = post_detail_href(&username, post_id);
            let target = if target == detail { "/" } else { target };
            Redirect::to(target).into_response()
        }
        Ok(DeletePostOutcome::NotAuthor) => {
            Redirect::to(&post_detail_href(&username, post_id)).into_response()
        }
        Ok(DeletePostOutcome::NotFound) => render_not_found_response(chrome, Some(&path)),
        Err(err) => HttpError::new(
            "infra::http::posts::delete_post",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            err.to_string(),
        )
        .into_response(),
    }
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    AuthUser(user): AuthUser,
    Path((username, post_id)): Path<(String, String)>,
    Form(form): Form<CommentForm>,
) -> Response {
    let chrome = LayoutChrome::new(Some(&user));
    let path = format!("/{username}/{post_id}/comment/");

    let Some(post_id) = parse_post_id(&post_id) else {
        return render_not_found_response(chrome, Some(&path));
    };

    match state
        .comments
        .add_comment(user.id, &username, post_id, &form.text)
        .await
    {
        // Invalid input is not an error page: the comment form simply has no
        // effect and the reader lands back on the post.
        Ok(AddCommentOutcome::Added(_)) | Ok(AddCommentOutcome::Invalid) => {
            Redirect::to(&post_detail_href(&username, post_id)).into_response()
        }
        Ok(AddCommentOutcome::PostNotFound) => render_not_found_response(chrome, Some(&path)),
        Err(err) => HttpError::new(
            "infra::http::posts::add_comment",
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            err.to_string(),
        )
        .into_response(),
    }
}
