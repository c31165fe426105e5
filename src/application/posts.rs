//! Write side for posts: create, edit and delete with author-only access.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{
    CreatePostParams, GroupsRepo, PostsRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{PostRecord, PostWithMeta};

#[derive(Debug, Error)]
pub enum PostError {
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Normalized post form input. `group_slug` is `None` for the blank
/// "no group" option; the image travels separately because it is only
/// present on multipart submissions.
#[derive(Debug, Clone, Default)]
pub struct PostInput {
    pub text: String,
    pub group_slug: Option<String>,
}

/// Field-level issues reported back on the re-rendered form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFormIssues {
    pub text: Option<&'static str>,
    pub group: Option<&'static str>,
}

impl PostFormIssues {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.group.is_none()
    }
}

#[derive(Debug)]
pub enum CreatePostOutcome {
    Created(PostRecord),
    Invalid(PostFormIssues),
}

#[derive(Debug)]
pub enum EditPostOutcome {
    Updated(PostRecord),
    Invalid(PostFormIssues),
    /// The acting user is not the author; the caller redirects to the
    /// canonical detail view without touching the post.
    NotAuthor,
    NotFound,
}

#[derive(Debug)]
pub enum DeletePostOutcome {
    /// Deleted; carries the stored image path so the caller can remove
    /// the file after the row is gone.
    Deleted { image: Option<String> },
    NotAuthor,
    NotFound,
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
}

impl PostService {
    pub fn new(posts: Arc<dyn PostsRepo>, groups: Arc<dyn GroupsRepo>) -> Self {
        Self { posts, groups }
    }

    async fn resolve_group(
        &self,
        input: &PostInput,
        issues: &mut PostFormIssues,
    ) -> Result<Option<Uuid>, PostError> {
        let Some(slug) = input.group_slug.as_deref() else {
            return Ok(None);
        };

        match self.groups.find_by_slug(slug).await? {
            Some(group) => Ok(Some(group.id)),
            None => {
                issues.group = Some("Select a valid group.");
                Ok(None)
            }
        }
    }

    fn validate_text(input: &PostInput, issues: &mut PostFormIssues) {
        if input.text.trim().is_empty() {
            issues.text = Some("This field is required.");
        }
    }

    pub async fn create_post(
        &self,
        author_id: Uuid,
        input: PostInput,
        image: Option<String>,
    ) -> Result<CreatePostOutcome, PostError> {
        let mut issues = PostFormIssues::default();
        Self::validate_text(&input, &mut issues);
        let group_id = self.resolve_group(&input, &mut issues).await?;

        if !issues.is_empty() {
            return Ok(CreatePostOutcome::Invalid(issues));
        }

        let record = self
            .posts
            .create_post(CreatePostParams {
                text: input.text.trim().to_string(),
                author_id,
                group_id,
                image,
            })
            .await?;

        Ok(CreatePostOutcome::Created(record))
    }

    /// Load a post for the edit form, enforcing the URL's author segment.
    pub async fn find_for_edit(
        &self,
        username: &str,
        post_id: i64,
    ) -> Result<Option<PostWithMeta>, PostError> {
        let Some(post) = self.posts.find_post(post_id).await? else {
            return Ok(None);
        };
        if post.author_username != username {
            return Ok(None);
        }
        Ok(Some(post))
    }

    pub async fn edit_post(
        &self,
        actor_id: Uuid,
        username: &str,
        post_id: i64,
        input: PostInput,
        new_image: Option<String>,
    ) -> Result<EditPostOutcome, PostError> {
        let Some(existing) = self.find_for_edit(username, post_id).await? else {
            return Ok(EditPostOutcome::NotFound);
        };

        if existing.post.author_id != actor_id {
            return Ok(EditPostOutcome::NotAuthor);
        }

        let mut issues = PostFormIssues::default();
        Self::validate_text(&input, &mut issues);
        let group_id = self.resolve_group(&input, &mut issues).await?;

        if !issues.is_empty() {
            return Ok(EditPostOutcome::Invalid(issues));
        }

        let image = new_image.or(existing.post.image);

        let record = self
            .posts
            .update_post(UpdatePostParams {
                id: post_id,
                text: input.text.trim().to_string(),
                group_id,
                image,
            })
            .await?;

        Ok(EditPostOutcome::Updated(record))
    }

    pub async fn delete_post(
        &self,
        actor_id: Uuid,
        username: &str,
        post_id: i64,
    ) -> Result<DeletePostOutcome, PostError> {
        let Some(existing) = self.find_for_edit(username, post_id).await? else {
            return Ok(DeletePostOutcome::NotFound);
        };

        if existing.post.author_id != actor_id {
            return Ok(DeletePostOutcome::NotAuthor);
        }

        self.posts.delete_post(post_id).await?;

        Ok(DeletePostOutcome::Deleted {
            image: existing.post.image,
        })
    }
}
