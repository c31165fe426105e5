//! Comment creation against an existing post.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{CommentsRepo, CreateCommentParams, PostsRepo, RepoError};
use crate::domain::entities::CommentRecord;

#[derive(Debug, Error)]
pub enum CommentError {
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug)]
pub enum AddCommentOutcome {
    Added(CommentRecord),
    /// Blank text; nothing was persisted. The caller redirects back to the
    /// detail view either way.
    Invalid,
    PostNotFound,
}

#[derive(Clone)]
pub struct CommentService {
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
}

impl CommentService {
    pub fn new(posts: Arc<dyn PostsRepo>, comments: Arc<dyn CommentsRepo>) -> Self {
        Self { posts, comments }
    }

    pub async fn add_comment(
        &self,
        author_id: Uuid,
        username: &str,
        post_id: i64,
        text: &str,
    ) -> Result<AddCommentOutcome, CommentError> {
        let Some(post) = self.posts.find_post(post_id).await? else {
            return Ok(AddCommentOutcome::PostNotFound);
        };
        if post.author_username != username {
            return Ok(AddCommentOutcome::PostNotFound);
        }

        let text = text.trim();
        if text.is_empty() {
            return Ok(AddCommentOutcome::Invalid);
        }

        let record = self
            .comments
            .create_comment(CreateCommentParams {
                post_id,
                author_id,
                text: text.to_string(),
            })
            .await?;

        Ok(AddCommentOutcome::Added(record))
    }
}
