//! Router-level tests over in-memory repository fakes.
//!
//! Each test builds the full axum router exactly as the binary does, with the
//! Postgres repositories swapped for a single in-memory store.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use time::OffsetDateTime;
use tower::util::ServiceExt;
use uuid::Uuid;

use yatube::application::accounts::AccountService;
use yatube::application::comments::CommentService;
use yatube::application::feed::{FeedPagination, FeedService};
use yatube::application::follows::FollowService;
use yatube::application::groups::GroupService;
use yatube::application::posts::PostService;
use yatube::application::repos::{
    CommentsRepo, CreateCommentParams, CreateGroupParams, CreatePostParams, CreateSessionParams,
    CreateUserParams, FollowsRepo, GroupsRepo, PostScope, PostsRepo, RepoError, SessionsRepo,
    UpdatePostParams, UsersRepo,
};
use yatube::cache::{CacheConfig, CacheState};
use yatube::domain::entities::{
    CommentRecord, CommentWithAuthor, GroupRecord, GroupRef, PostRecord, PostWithMeta,
    SessionRecord, UserRecord,
};
use yatube::infra::http::{HttpState, SESSION_COOKIE, build_router};
use yatube::infra::uploads::UploadStorage;

#[derive(Default)]
struct Inner {
    users: Vec<UserRecord>,
    groups: Vec<GroupRecord>,
    posts: Vec<PostRecord>,
    comments: Vec<CommentRecord>,
    follows: HashSet<(Uuid, Uuid)>,
    sessions: HashMap<String, SessionRecord>,
    next_post_id: i64,
    next_comment_id: i64,
}

#[derive(Default)]
struct MemoryRepo {
    inner: Mutex<Inner>,
}

impl MemoryRepo {
    fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory repo lock")
    }

    fn post_count(&self) -> usize {
        self.lock().posts.len()
    }

    fn comment_count(&self) -> usize {
        self.lock().comments.len()
    }

    fn follow_count(&self) -> usize {
        self.lock().follows.len()
    }

    fn post_text(&self, id: i64) -> Option<String> {
        self.lock()
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| post.text.clone())
    }

    fn with_meta(inner: &Inner, post: &PostRecord) -> PostWithMeta {
        let author = inner
            .users
            .iter()
            .find(|user| user.id == post.author_id)
            .expect("post author exists");
        let group = post.group_id.and_then(|group_id| {
            inner
                .groups
                .iter()
                .find(|group| group.id == group_id)
                .map(|group| GroupRef {
                    slug: group.slug.clone(),
                    title: group.title.clone(),
                })
        });
        let comment_count = inner
            .comments
            .iter()
            .filter(|comment| comment.post_id == post.id)
            .count() as i64;

        PostWithMeta {
            post: post.clone(),
            author_username: author.username.clone(),
            author_display_name: author.display_name.clone(),
            group,
            comment_count,
        }
    }

    fn scoped<'a>(inner: &'a Inner, scope: PostScope) -> Vec<&'a PostRecord> {
        let mut posts: Vec<&PostRecord> = inner
            .posts
            .iter()
            .filter(|post| match scope {
                PostScope::All => true,
                PostScope::Group(group_id) => post.group_id == Some(group_id),
                PostScope::Author(author_id) => post.author_id == author_id,
                PostScope::FollowedBy(user_id) => {
                    inner.follows.contains(&(user_id, post.author_id))
                }
            })
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        posts
    }
}

#[async_trait]
impl PostsRepo for MemoryRepo {
    async fn list_posts(
        &self,
        scope: PostScope,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<PostWithMeta>, RepoError> {
        let inner = self.lock();
        Ok(Self::scoped(&inner, scope)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|post| Self::with_meta(&inner, post))
            .collect())
    }

    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError> {
        let inner = self.lock();
        Ok(Self::scoped(&inner, scope).len() as u64)
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostWithMeta>, RepoError> {
        let inner = self.lock();
        Ok(inner
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| Self::with_meta(&inner, post)))
    }

    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut inner = self.lock();
        inner.next_post_id += 1;
        let record = PostRecord {
            id: inner.next_post_id,
            text: params.text,
            created_at: OffsetDateTime::now_utc(),
            author_id: params.author_id,
            group_id: params.group_id,
            image: params.image,
        };
        inner.posts.push(record.clone());
        Ok(record)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut inner = self.lock();
        let post = inner
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.text = params.text;
        post.group_id = params.group_id;
        post.image = params.image;
        Ok(post.clone())
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        let mut inner = self.lock();
        let before = inner.posts.len();
        inner.posts.retain(|post| post.id != id);
        if inner.posts.len() == before {
            return Err(RepoError::NotFound);
        }
        // Comments cascade with their post.
        inner.comments.retain(|comment| comment.post_id != id);
        Ok(())
    }
}

#[async_trait]
impl UsersRepo for MemoryRepo {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.lock().users.iter().find(|user| user.id == id).cloned())
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut inner = self.lock();
        if inner
            .users
            .iter()
            .any(|user| user.username == params.username)
        {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }
        let record = UserRecord {
            id: Uuid::new_v4(),
            username: params.username,
            password_hash: params.password_hash,
            display_name: params.display_name,
            joined_at: OffsetDateTime::now_utc(),
        };
        inner.users.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl GroupsRepo for MemoryRepo {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self
            .lock()
            .groups
            .iter()
            .find(|group| group.slug == slug)
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups = self.lock().groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut inner = self.lock();
        if inner
            .groups
            .iter()
            .any(|group| group.title == params.title || group.slug == params.slug)
        {
            return Err(RepoError::Duplicate {
                constraint: "groups_title_key".to_string(),
            });
        }
        let record = GroupRecord {
            id: Uuid::new_v4(),
            title: params.title,
            slug: params.slug,
            description: params.description,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.groups.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl CommentsRepo for MemoryRepo {
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>, RepoError> {
        let inner = self.lock();
        let mut comments: Vec<&CommentRecord> = inner
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(comments
            .into_iter()
            .map(|comment| {
                let author = inner
                    .users
                    .iter()
                    .find(|user| user.id == comment.author_id)
                    .expect("comment author exists");
                CommentWithAuthor {
                    comment: comment.clone(),
                    author_username: author.username.clone(),
                    author_display_name: author.display_name.clone(),
                }
            })
            .collect())
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut inner = self.lock();
        inner.next_comment_id += 1;
        let record = CommentRecord {
            id: inner.next_comment_id,
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.comments.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl FollowsRepo for MemoryRepo {
    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError> {
        Ok(self.lock().follows.contains(&(user_id, author_id)))
    }

    async fn follow(&self, user_id: Uuid, author_id: Uuid) -> Result<(), RepoError> {
        self.lock().follows.insert((user_id, author_id));
        Ok(())
    }

    async fn unfollow(&self, user_id: Uuid, author_id: Uuid) -> Result<(), RepoError> {
        self.lock().follows.remove(&(user_id, author_id));
        Ok(())
    }

    async fn follower_count(&self, author_id: Uuid) -> Result<u64, RepoError> {
        Ok(self
            .lock()
            .follows
            .iter()
            .filter(|(_, followed)| *followed == author_id)
            .count() as u64)
    }

    async fn following_count(&self, user_id: Uuid) -> Result<u64, RepoError> {
        Ok(self
            .lock()
            .follows
            .iter()
            .filter(|(follower, _)| *follower == user_id)
            .count() as u64)
    }
}

#[async_trait]
impl SessionsRepo for MemoryRepo {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let record = SessionRecord {
            token: params.token.clone(),
            user_id: params.user_id,
            created_at: OffsetDateTime::now_utc(),
            expires_at: params.expires_at,
        };
        self.lock().sessions.insert(params.token, record.clone());
        Ok(record)
    }

    async fn find_session(
        &self,
        token: &str,
    ) -> Result<Option<(SessionRecord, UserRecord)>, RepoError> {
        let inner = self.lock();
        Ok(inner.sessions.get(token).and_then(|session| {
            inner
                .users
                .iter()
                .find(|user| user.id == session.user_id)
                .map(|user| (session.clone(), user.clone()))
        }))
    }

    async fn delete_session(&self, token: &str) -> Result<(), RepoError> {
        self.lock().sessions.remove(token);
        Ok(())
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let mut inner = self.lock();
        let before = inner.sessions.len();
        inner.sessions.retain(|_, session| session.expires_at > now);
        Ok((before - inner.sessions.len()) as u64)
    }
}

struct App {
    router: Router,
    repo: Arc<MemoryRepo>,
    accounts: Arc<AccountService>,
    _uploads_dir: tempfile::TempDir,
}

fn build_app(per_page: u32, delta: u32, cache: bool) -> App {
    let repo = Arc::new(MemoryRepo::new());
    let posts_repo: Arc<dyn PostsRepo> = repo.clone();
    let users_repo: Arc<dyn UsersRepo> = repo.clone();
    let groups_repo: Arc<dyn GroupsRepo> = repo.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repo.clone();
    let follows_repo: Arc<dyn FollowsRepo> = repo.clone();
    let sessions_repo: Arc<dyn SessionsRepo> = repo.clone();

    let pagination = FeedPagination { per_page, delta };

    let feed = Arc::new(FeedService::new(
        posts_repo.clone(),
        users_repo.clone(),
        groups_repo.clone(),
        comments_repo.clone(),
        follows_repo.clone(),
        pagination,
    ));
    let posts = Arc::new(PostService::new(posts_repo.clone(), groups_repo.clone()));
    let comments = Arc::new(CommentService::new(posts_repo, comments_repo));
    let follows = Arc::new(FollowService::new(users_repo.clone(), follows_repo));
    let accounts = Arc::new(AccountService::new(
        users_repo,
        sessions_repo,
        time::Duration::hours(2),
    ));
    let groups = Arc::new(GroupService::new(groups_repo));

    let uploads_dir = tempfile::tempdir().expect("tempdir");
    let uploads =
        Arc::new(UploadStorage::new(uploads_dir.path().to_path_buf(), 1024 * 1024).expect("storage"));

    let state = HttpState {
        feed,
        posts,
        comments,
        follows,
        accounts: accounts.clone(),
        groups,
        uploads,
        upload_limit_bytes: 1024 * 1024,
        cache: cache.then(|| {
            CacheState::new(CacheConfig {
                enabled: true,
                ttl_seconds: 60,
                response_limit: 16,
            })
        }),
    };

    App {
        router: build_router(state),
        repo,
        accounts,
        _uploads_dir: uploads_dir,
    }
}

impl App {
    /// Create a user plus a live session, returning (user, session cookie).
    async fn signed_up(&self, username: &str) -> (UserRecord, String) {
        use yatube::application::accounts::{SignupInput, SignupOutcome};

        let outcome = self
            .accounts
            .signup(SignupInput {
                username: username.to_string(),
                display_name: None,
                password: "correct horse".to_string(),
                password_confirm: "correct horse".to_string(),
            })
            .await
            .expect("signup");

        match outcome {
            SignupOutcome::Created { user, session } => {
                (user, format!("{SESSION_COOKIE}={}", session.token))
            }
            SignupOutcome::Invalid(issues) => panic!("signup rejected: {issues:?}"),
        }
    }

    async fn get(&self, path: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = builder.body(Body::empty()).expect("request");
        self.router.clone().oneshot(request).await.expect("response")
    }

    async fn post_form(&self, path: &str, cookie: Option<&str>, body: &str) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = builder.body(Body::from(body.to_string())).expect("request");
        self.router.clone().oneshot(request).await.expect("response")
    }

    async fn post_multipart(&self, path: &str, cookie: Option<&str>, fields: &[(&str, &str)]) -> Response {
        const BOUNDARY: &str = "----yatube-test-boundary";

        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));

        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = builder.body(Body::from(body)).expect("request");
        self.router.clone().oneshot(request).await.expect("response")
    }
}

async fn body_string(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

#[tokio::test]
async fn anonymous_home_page_renders() {
    let app = build_app(10, 1, false);
    let response = app.get("/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("Latest posts"));
    assert!(body.contains("No posts yet."));
}

#[tokio::test]
async fn protected_routes_redirect_to_login_with_next() {
    let app = build_app(10, 1, false);

    let response = app.get("/new/", None).await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/auth/login/?next=%2Fnew%2F");

    let response = app.get("/follow/", None).await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/auth/login/?next=%2Ffollow%2F");

    // An unauthenticated comment POST performs no mutation.
    let response = app
        .post_form("/someone/1/comment/", None, "text=drive-by")
        .await;
    assert!(response.status().is_redirection());
    assert!(location(&response).starts_with("/auth/login/?next="));
    assert_eq!(app.repo.comment_count(), 0);
}

#[tokio::test]
async fn valid_post_creation_increments_count_and_redirects_home() {
    let app = build_app(10, 1, false);
    let (_, cookie) = app.signed_up("leo").await;

    let before = app.repo.post_count();
    let response = app
        .post_multipart("/new/", Some(&cookie), &[("text", "First!"), ("group", "")])
        .await;

    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/");
    assert_eq!(app.repo.post_count(), before + 1);
}

#[tokio::test]
async fn invalid_post_creation_rerenders_form_without_persisting() {
    let app = build_app(10, 1, false);
    let (_, cookie) = app.signed_up("leo").await;

    let response = app
        .post_multipart("/new/", Some(&cookie), &[("text", "   "), ("group", "")])
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("This field is required."));
    assert_eq!(app.repo.post_count(), 0);
}

#[tokio::test]
async fn only_the_author_can_edit_a_post() {
    let app = build_app(10, 1, false);
    let (_, author_cookie) = app.signed_up("leo").await;
    let (_, other_cookie) = app.signed_up("fyodor").await;

    app.post_multipart("/new/", Some(&author_cookie), &[("text", "original"), ("group", "")])
        .await;
    let post_id = 1;

    // A stranger lands on the detail view; the text is untouched.
    let response = app
        .post_multipart(
            &format!("/leo/{post_id}/edit/"),
            Some(&other_cookie),
            &[("text", "defaced"), ("group", "")],
        )
        .await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), format!("/leo/{post_id}/"));
    assert_eq!(app.repo.post_text(post_id).as_deref(), Some("original"));

    // The author edit goes through.
    let response = app
        .post_multipart(
            &format!("/leo/{post_id}/edit/"),
            Some(&author_cookie),
            &[("text", "edited"), ("group", "")],
        )
        .await;
    assert!(response.status().is_redirection());
    assert_eq!(app.repo.post_text(post_id).as_deref(), Some("edited"));
}

#[tokio::test]
async fn delete_requires_author_and_validates_redirect_target() {
    let app = build_app(10, 1, false);
    let (_, author_cookie) = app.signed_up("leo").await;
    let (_, other_cookie) = app.signed_up("fyodor").await;

    app.post_multipart("/new/", Some(&author_cookie), &[("text", "keep me"), ("group", "")])
        .await;

    let response = app
        .post_form("/leo/1/delete/", Some(&other_cookie), "this_url=/")
        .await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/leo/1/");
    assert_eq!(app.repo.post_count(), 1);

    // The author deletes, but the off-origin target is replaced by `/`.
    let response = app
        .post_form(
            "/leo/1/delete/",
            Some(&author_cookie),
            "this_url=https%3A%2F%2Fevil.test%2F",
        )
        .await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/");
    assert_eq!(app.repo.post_count(), 0);
}

#[tokio::test]
async fn comments_require_text_and_attach_to_the_post() {
    let app = build_app(10, 1, false);
    let (_, cookie) = app.signed_up("leo").await;

    app.post_multipart("/new/", Some(&cookie), &[("text", "a post"), ("group", "")])
        .await;

    let response = app
        .post_form("/leo/1/comment/", Some(&cookie), "text=")
        .await;
    assert!(response.status().is_redirection());
    assert_eq!(app.repo.comment_count(), 0);

    let response = app
        .post_form("/leo/1/comment/", Some(&cookie), "text=nice+one")
        .await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/leo/1/");
    assert_eq!(app.repo.comment_count(), 1);

    let body = body_string(app.get("/leo/1/", None).await).await;
    assert!(body.contains("nice one"));
}

#[tokio::test]
async fn follow_then_unfollow_restores_the_count() {
    let app = build_app(10, 1, false);
    let (_, follower_cookie) = app.signed_up("fyodor").await;
    let (_, author_cookie) = app.signed_up("leo").await;

    app.post_multipart("/new/", Some(&author_cookie), &[("text", "from leo"), ("group", "")])
        .await;

    let before = app.repo.follow_count();

    // The followed feed is empty until the edge exists.
    let body = body_string(app.get("/follow/", Some(&follower_cookie)).await).await;
    assert!(!body.contains("from leo"));

    let response = app.post_form("/leo/follow/", Some(&follower_cookie), "").await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/leo/");
    assert_eq!(app.repo.follow_count(), before + 1);

    // Following twice is a no-op.
    app.post_form("/leo/follow/", Some(&follower_cookie), "").await;
    assert_eq!(app.repo.follow_count(), before + 1);

    let body = body_string(app.get("/follow/", Some(&follower_cookie)).await).await;
    assert!(body.contains("from leo"));

    let response = app
        .post_form("/leo/unfollow/", Some(&follower_cookie), "")
        .await;
    assert!(response.status().is_redirection());
    assert_eq!(app.repo.follow_count(), before);

    // Unfollowing again is also a no-op, not an error.
    app.post_form("/leo/unfollow/", Some(&follower_cookie), "")
        .await;
    assert_eq!(app.repo.follow_count(), before);

    let body = body_string(app.get("/follow/", Some(&follower_cookie)).await).await;
    assert!(!body.contains("from leo"));
}

#[tokio::test]
async fn self_follow_is_refused_without_an_error_page() {
    let app = build_app(10, 1, false);
    let (_, cookie) = app.signed_up("leo").await;

    let response = app.post_form("/leo/follow/", Some(&cookie), "").await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/leo/");
    assert_eq!(app.repo.follow_count(), 0);
}

#[tokio::test]
async fn pagination_windows_across_twenty_three_posts() {
    let app = build_app(10, 1, false);
    let (_, cookie) = app.signed_up("leo").await;

    for index in 0..23 {
        let text = format!("post number {index}");
        app.post_multipart(
            "/new/",
            Some(&cookie),
            &[("text", text.as_str()), ("group", "")],
        )
        .await;
    }

    // Page 1 shows ten posts and links to pages 2 and 3.
    let body = body_string(app.get("/", None).await).await;
    assert_eq!(body.matches("post-card").count(), 10);
    assert!(body.contains("href=\"/?page=2\""));
    assert!(body.contains("href=\"/?page=3\""));
    assert!(!body.contains("?page=4"));

    // Page 3 holds exactly the remaining three posts.
    let body = body_string(app.get("/?page=3", None).await).await;
    assert_eq!(body.matches("post-card").count(), 3);

    // An out-of-range request clamps to the last page.
    let body = body_string(app.get("/?page=99", None).await).await;
    assert_eq!(body.matches("post-card").count(), 3);
}

#[tokio::test]
async fn group_and_profile_pages_filter_posts() {
    let app = build_app(10, 1, false);
    let (_, leo_cookie) = app.signed_up("leo").await;
    let (_, fyodor_cookie) = app.signed_up("fyodor").await;

    app.repo
        .create_group(CreateGroupParams {
            title: "Novels".to_string(),
            slug: "novels".to_string(),
            description: Some("Long-form writing".to_string()),
        })
        .await
        .expect("group");

    app.post_multipart("/new/", Some(&leo_cookie), &[("text", "war and peace"), ("group", "novels")])
        .await;
    app.post_multipart("/new/", Some(&fyodor_cookie), &[("text", "white nights"), ("group", "")])
        .await;

    let body = body_string(app.get("/group/novels/", None).await).await;
    assert!(body.contains("war and peace"));
    assert!(!body.contains("white nights"));

    let body = body_string(app.get("/fyodor/", None).await).await;
    assert!(body.contains("white nights"));
    assert!(!body.contains("war and peace"));

    let response = app.get("/group/unknown/", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_pages_render_the_not_found_template() {
    let app = build_app(10, 1, false);

    let response = app.get("/no-such-user/", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get("/leo/not-a-number/", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_string(response).await;
    assert!(body.contains("Page not found"));
}

#[tokio::test]
async fn home_page_cache_serves_stale_content_per_cookie() {
    let app = build_app(10, 1, true);
    let (_, cookie) = app.signed_up("leo").await;

    // Prime the cache for the anonymous bucket.
    let body = body_string(app.get("/", None).await).await;
    assert!(body.contains("No posts yet."));

    app.post_multipart("/new/", Some(&cookie), &[("text", "fresh post"), ("group", "")])
        .await;

    // Within the TTL the anonymous bucket replays the stale page.
    let body = body_string(app.get("/", None).await).await;
    assert!(body.contains("No posts yet."));
    assert!(!body.contains("fresh post"));

    // A different cookie misses the cache and sees the new post.
    let body = body_string(app.get("/", Some(&cookie)).await).await;
    assert!(body.contains("fresh post"));
}

#[tokio::test]
async fn signup_login_logout_round_trip() {
    let app = build_app(10, 1, false);

    let response = app
        .post_form(
            "/auth/signup/",
            None,
            "username=anna&password=longenough&password_confirm=longenough",
        )
        .await;
    assert!(response.status().is_redirection());
    assert!(
        response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with(SESSION_COOKIE))
    );

    // Duplicate usernames re-render the form.
    let response = app
        .post_form(
            "/auth/signup/",
            None,
            "username=anna&password=longenough&password_confirm=longenough",
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("already taken"));

    // Wrong password is rejected without saying which field was wrong.
    let response = app
        .post_form("/auth/login/", None, "username=anna&password=wrongwrong")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("correct username and password"));

    let response = app
        .post_form("/auth/login/", None, "username=anna&password=longenough")
        .await;
    assert!(response.status().is_redirection());
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
        .expect("session cookie");

    let response = app.post_form("/auth/logout/", Some(&cookie), "").await;
    assert!(response.status().is_redirection());

    // The session is gone server-side; the old cookie no longer signs in.
    let response = app.get("/new/", Some(&cookie)).await;
    assert!(response.status().is_redirection());
    assert!(location(&response).starts_with("/auth/login/"));
}

#[tokio::test]
async fn login_next_parameter_is_validated() {
    let app = build_app(10, 1, false);
    app.signed_up("anna").await;

    let response = app
        .post_form(
            "/auth/login/",
            None,
            "username=anna&password=correct+horse&next=https%3A%2F%2Fevil.test%2F",
        )
        .await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/");

    let response = app
        .post_form(
            "/auth/login/",
            None,
            "username=anna&password=correct+horse&next=%2Ffollow%2F",
        )
        .await;
    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/follow/");
}
