//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{
    CommentRecord, CommentWithAuthor, GroupRecord, PostRecord, PostWithMeta, SessionRecord,
    UserRecord,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Which posts a list view is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostScope {
    /// Every post, newest first (the home page).
    All,
    /// Posts attached to one group.
    Group(Uuid),
    /// Posts written by one author.
    Author(Uuid),
    /// Posts written by authors the given user follows.
    FollowedBy(Uuid),
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub text: String,
    pub author_id: Uuid,
    pub group_id: Option<Uuid>,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: i64,
    pub text: String,
    pub group_id: Option<Uuid>,
    pub image: Option<String>,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// Page of posts in `scope`, ordered by creation time descending.
    async fn list_posts(
        &self,
        scope: PostScope,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<PostWithMeta>, RepoError>;

    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError>;

    async fn find_post(&self, id: i64) -> Result<Option<PostWithMeta>, RepoError>;

    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    /// Updates text, group and image; `created_at` and author never change.
    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;

    async fn delete_post(&self, id: i64) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateGroupParams {
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
}

#[async_trait]
pub trait GroupsRepo: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError>;

    /// All groups ordered by title, for the post form's group selector.
    async fn list_all(&self) -> Result<Vec<GroupRecord>, RepoError>;

    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub username: String,
    pub password_hash: String,
    pub display_name: Option<String>,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: i64,
    pub author_id: Uuid,
    pub text: String,
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    /// Comments for a post, newest first.
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentWithAuthor>, RepoError>;

    async fn create_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;
}

#[async_trait]
pub trait FollowsRepo: Send + Sync {
    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, RepoError>;

    /// Insert the edge; inserting an existing pair is a no-op.
    async fn follow(&self, user_id: Uuid, author_id: Uuid) -> Result<(), RepoError>;

    /// Remove the edge; removing a missing pair is a no-op.
    async fn unfollow(&self, user_id: Uuid, author_id: Uuid) -> Result<(), RepoError>;

    /// How many users follow `author_id`.
    async fn follower_count(&self, author_id: Uuid) -> Result<u64, RepoError>;

    /// How many authors `user_id` follows.
    async fn following_count(&self, user_id: Uuid) -> Result<u64, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateSessionParams {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: OffsetDateTime,
}

#[async_trait]
pub trait SessionsRepo: Send + Sync {
    async fn create_session(&self, params: CreateSessionParams)
    -> Result<SessionRecord, RepoError>;

    /// Resolve a token to its session and user; `None` for unknown tokens.
    async fn find_session(
        &self,
        token: &str,
    ) -> Result<Option<(SessionRecord, UserRecord)>, RepoError>;

    async fn delete_session(&self, token: &str) -> Result<(), RepoError>;

    /// Drop sessions whose expiry has passed; returns how many were removed.
    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError>;
}
