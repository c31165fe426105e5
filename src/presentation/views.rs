use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, macros::format_description};

use crate::application::error::{ErrorReport, HttpError};
use crate::application::feed::{PostDetail, PostPage, ProfilePage};
use crate::application::pagination::PageWindow;
use crate::domain::entities::{CommentWithAuthor, GroupRecord, PostWithMeta, UserRecord};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Render the 404 page, attaching a diagnostic report for the logger.
pub fn render_not_found_response(chrome: LayoutChrome, path: Option<&str>) -> Response {
    let content = ErrorPageView::not_found(path);
    let view = LayoutContext::new(chrome, content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// Render the 500 page, attaching the caller's diagnostic report.
pub fn render_server_error_response(chrome: LayoutChrome, report: ErrorReport) -> Response {
    let content = ErrorPageView::server_error();
    let view = LayoutContext::new(chrome, content);
    let mut response = render_template_response(
        ErrorTemplate { view },
        StatusCode::INTERNAL_SERVER_ERROR,
    );
    report.attach(&mut response);
    response
}

#[derive(Clone)]
pub struct CurrentUserView {
    pub username: String,
    pub label: String,
    pub profile_href: String,
}

impl CurrentUserView {
    pub fn from_record(user: &UserRecord) -> Self {
        Self {
            username: user.username.clone(),
            label: user.label().to_string(),
            profile_href: profile_href(&user.username),
        }
    }
}

/// Shared page furniture: brand, footer year and the signed-in user.
#[derive(Clone)]
pub struct LayoutChrome {
    pub brand_title: String,
    pub year: i32,
    pub current_user: Option<CurrentUserView>,
}

impl LayoutChrome {
    pub fn new(current_user: Option<&UserRecord>) -> Self {
        Self {
            brand_title: "Yatube".to_string(),
            year: OffsetDateTime::now_utc().year(),
            current_user: current_user.map(CurrentUserView::from_record),
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand_title: String,
    pub year: i32,
    pub current_user: Option<CurrentUserView>,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand_title: chrome.brand_title,
            year: chrome.year,
            current_user: chrome.current_user,
            content,
        }
    }
}

#[derive(Clone)]
pub struct PageLink {
    pub number: u32,
    pub href: String,
    pub is_current: bool,
}

/// Fully-resolved pagination links: first/last plus the window between them.
#[derive(Clone)]
pub struct PaginatorView {
    pub current: u32,
    pub total_pages: u32,
    pub multiple_pages: bool,
    pub first: PageLink,
    pub last: PageLink,
    pub windowed: Vec<PageLink>,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    pub gap_before: bool,
    pub gap_after: bool,
}

fn page_href(base_path: &str, number: u32) -> String {
    if number <= 1 {
        base_path.to_string()
    } else {
        format!("{base_path}?page={number}")
    }
}

impl PaginatorView {
    pub fn build(window: &PageWindow, base_path: &str) -> Self {
        let link = |number: u32| PageLink {
            number,
            href: page_href(base_path, number),
            is_current: number == window.number,
        };

        Self {
            current: window.number,
            total_pages: window.total_pages,
            multiple_pages: window.total_pages > 1,
            first: link(1),
            last: link(window.total_pages),
            windowed: window.pages().into_iter().map(link).collect(),
            previous_href: window
                .has_previous
                .then(|| page_href(base_path, window.number - 1)),
            next_href: window
                .has_next
                .then(|| page_href(base_path, window.number + 1)),
            gap_before: window.gap_before(),
            gap_after: window.gap_after(),
        }
    }
}

#[derive(Clone)]
pub struct GroupBadgeView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PostCardView {
    pub id: i64,
    pub detail_href: String,
    pub author_username: String,
    pub author_label: String,
    pub author_href: String,
    pub group: Option<GroupBadgeView>,
    pub text: String,
    pub published: String,
    pub image_src: Option<String>,
    pub comment_count: i64,
}

pub fn profile_href(username: &str) -> String {
    format!("/{username}/")
}

pub fn post_detail_href(username: &str, post_id: i64) -> String {
    format!("/{username}/{post_id}/")
}

fn format_published(at: OffsetDateTime) -> String {
    let format = format_description!("[day padding:none] [month repr:short] [year], [hour]:[minute]");
    at.format(&format).unwrap_or_default()
}

pub fn post_card(record: &PostWithMeta) -> PostCardView {
    PostCardView {
        id: record.post.id,
        detail_href: post_detail_href(&record.author_username, record.post.id),
        author_username: record.author_username.clone(),
        author_label: record.author_label().to_string(),
        author_href: profile_href(&record.author_username),
        group: record.group.as_ref().map(|group| GroupBadgeView {
            title: group.title.clone(),
            href: format!("/group/{}/", group.slug),
        }),
        text: record.post.text.clone(),
        published: format_published(record.post.created_at),
        image_src: record
            .post
            .image
            .as_ref()
            .map(|path| format!("/media/{path}")),
        comment_count: record.comment_count,
    }
}

/// A paginated list of posts plus its navigation links.
#[derive(Clone)]
pub struct PostListView {
    pub posts: Vec<PostCardView>,
    pub paginator: PaginatorView,
    pub total_posts: u64,
    pub has_posts: bool,
}

impl PostListView {
    pub fn build(page: &PostPage, base_path: &str) -> Self {
        let posts: Vec<PostCardView> = page.posts.iter().map(post_card).collect();
        Self {
            has_posts: !posts.is_empty(),
            posts,
            paginator: PaginatorView::build(&page.window, base_path),
            total_posts: page.total_posts,
        }
    }
}

pub struct IndexContext {
    pub list: PostListView,
}

pub struct GroupContext {
    pub title: String,
    pub description: Option<String>,
    pub list: PostListView,
}

impl GroupContext {
    pub fn build(group: &GroupRecord, page: &PostPage) -> Self {
        Self {
            title: group.title.clone(),
            description: group.description.clone(),
            list: PostListView::build(page, &format!("/group/{}/", group.slug)),
        }
    }
}

pub struct ProfileContext {
    pub username: String,
    pub author_label: String,
    pub post_count: u64,
    pub follower_count: u64,
    pub following_count: u64,
    pub viewer_follows: bool,
    pub show_follow_controls: bool,
    pub follow_action: String,
    pub unfollow_action: String,
    pub list: PostListView,
}

impl ProfileContext {
    pub fn build(profile: &ProfilePage, viewer_present: bool) -> Self {
        let username = profile.author.username.clone();
        Self {
            author_label: profile.author.label().to_string(),
            post_count: profile.page.total_posts,
            follower_count: profile.follower_count,
            following_count: profile.following_count,
            viewer_follows: profile.viewer_follows,
            show_follow_controls: viewer_present && !profile.viewer_is_author,
            follow_action: format!("/{username}/follow/"),
            unfollow_action: format!("/{username}/unfollow/"),
            list: PostListView::build(&profile.page, &profile_href(&username)),
            username,
        }
    }
}

pub struct FollowContext {
    pub list: PostListView,
}

#[derive(Clone)]
pub struct CommentView {
    pub author_label: String,
    pub author_href: String,
    pub text: String,
    pub published: String,
}

fn comment_view(record: &CommentWithAuthor) -> CommentView {
    CommentView {
        author_label: record.author_label().to_string(),
        author_href: profile_href(&record.author_username),
        text: record.comment.text.clone(),
        published: format_published(record.comment.created_at),
    }
}

pub struct PostDetailContext {
    pub card: PostCardView,
    pub comments: Vec<CommentView>,
    pub author_post_count: u64,
    pub viewer_signed_in: bool,
    pub viewer_is_author: bool,
    pub edit_href: String,
    pub delete_action: String,
    pub comment_action: String,
    pub this_url: String,
}

impl PostDetailContext {
    pub fn build(detail: &PostDetail, viewer: Option<&UserRecord>) -> Self {
        let username = &detail.post.author_username;
        let post_id = detail.post.post.id;
        Self {
            card: post_card(&detail.post),
            comments: detail.comments.iter().map(comment_view).collect(),
            author_post_count: detail.author_post_count,
            viewer_signed_in: viewer.is_some(),
            viewer_is_author: viewer.is_some_and(|user| user.id == detail.post.post.author_id),
            edit_href: format!("/{username}/{post_id}/edit/"),
            delete_action: format!("/{username}/{post_id}/delete/"),
            comment_action: format!("/{username}/{post_id}/comment/"),
            this_url: post_detail_href(username, post_id),
        }
    }
}

#[derive(Clone)]
pub struct GroupOptionView {
    pub slug: String,
    pub title: String,
    pub selected: bool,
}

/// Shared by the create and edit forms.
pub struct PostFormContext {
    pub heading: &'static str,
    pub submit_label: &'static str,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOptionView>,
    pub text_error: Option<&'static str>,
    pub group_error: Option<&'static str>,
    pub current_image: Option<String>,
}

pub struct SignupContext {
    pub username: String,
    pub display_name: String,
    pub username_error: Option<&'static str>,
    pub password_error: Option<&'static str>,
}

impl SignupContext {
    pub fn empty() -> Self {
        Self {
            username: String::new(),
            display_name: String::new(),
            username_error: None,
            password_error: None,
        }
    }
}

pub struct LoginContext {
    pub username: String,
    pub error: Option<&'static str>,
    pub next: Option<String>,
}

impl LoginContext {
    pub fn empty(next: Option<String>) -> Self {
        Self {
            username: String::new(),
            error: None,
            next,
        }
    }
}

pub struct ErrorPageView {
    pub status: u16,
    pub title: &'static str,
    pub message: &'static str,
    pub path: Option<String>,
}

impl ErrorPageView {
    pub fn not_found(path: Option<&str>) -> Self {
        Self {
            status: 404,
            title: "Page not found",
            message: "The page you requested does not exist.",
            path: path.map(str::to_string),
        }
    }

    pub fn server_error() -> Self {
        Self {
            status: 500,
            title: "Server error",
            message: "Something went wrong on our side. Please try again later.",
            path: None,
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<IndexContext>,
}

#[derive(Template)]
#[template(path = "group.html")]
pub struct GroupTemplate {
    pub view: LayoutContext<GroupContext>,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub view: LayoutContext<ProfileContext>,
}

#[derive(Template)]
#[template(path = "follow.html")]
pub struct FollowTemplate {
    pub view: LayoutContext<FollowContext>,
}

#[derive(Template)]
#[template(path = "post_detail.html")]
pub struct PostDetailTemplate {
    pub view: LayoutContext<PostDetailContext>,
}

#[derive(Template)]
#[template(path = "manage_post.html")]
pub struct ManagePostTemplate {
    pub view: LayoutContext<PostFormContext>,
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<SignupContext>,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginContext>,
}

#[derive(Template)]
#[template(path = "about_author.html")]
pub struct AboutAuthorTemplate {
    pub view: LayoutContext<()>,
}

#[derive(Template)]
#[template(path = "about_tech.html")]
pub struct AboutTechTemplate {
    pub view: LayoutContext<()>,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pagination::Paginator;

    fn window(total: u64, per_page: u32, page: u32, delta: u32) -> PageWindow {
        Paginator::new(total, per_page)
            .expect("paginator")
            .get_page(page)
            .window(delta)
    }

    #[test]
    fn paginator_view_builds_window_links() {
        let view = PaginatorView::build(&window(23, 10, 1, 1), "/");
        assert_eq!(view.first.href, "/");
        assert!(view.first.is_current);
        assert_eq!(view.last.number, 3);
        assert_eq!(view.last.href, "/?page=3");
        let numbers: Vec<u32> = view.windowed.iter().map(|link| link.number).collect();
        assert_eq!(numbers, vec![2]);
        assert!(view.previous_href.is_none());
        assert_eq!(view.next_href.as_deref(), Some("/?page=2"));
    }

    #[test]
    fn paginator_view_single_page_collapses() {
        let view = PaginatorView::build(&window(3, 10, 1, 5), "/group/rust/");
        assert!(!view.multiple_pages);
        assert!(view.windowed.is_empty());
        assert!(view.previous_href.is_none());
        assert!(view.next_href.is_none());
    }

    #[test]
    fn first_page_href_omits_query() {
        assert_eq!(page_href("/leo/", 1), "/leo/");
        assert_eq!(page_href("/leo/", 4), "/leo/?page=4");
    }
}
