//! Follow and unfollow, both idempotent.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{FollowsRepo, RepoError, UsersRepo};

#[derive(Debug, Error)]
pub enum FollowError {
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, PartialEq, Eq)]
pub enum FollowOutcome {
    /// The edge now has the requested state (whether or not it changed).
    Applied,
    /// A user may not follow themselves; nothing happens and no error is
    /// surfaced to the end user.
    RefusedSelfFollow,
    AuthorNotFound,
}

#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UsersRepo>,
    follows: Arc<dyn FollowsRepo>,
}

impl FollowService {
    pub fn new(users: Arc<dyn UsersRepo>, follows: Arc<dyn FollowsRepo>) -> Self {
        Self { users, follows }
    }

    pub async fn follow(
        &self,
        user_id: Uuid,
        author_username: &str,
    ) -> Result<FollowOutcome, FollowError> {
        let Some(author) = self.users.find_by_username(author_username).await? else {
            return Ok(FollowOutcome::AuthorNotFound);
        };

        if author.id == user_id {
            return Ok(FollowOutcome::RefusedSelfFollow);
        }

        self.follows.follow(user_id, author.id).await?;
        Ok(FollowOutcome::Applied)
    }

    pub async fn unfollow(
        &self,
        user_id: Uuid,
        author_username: &str,
    ) -> Result<FollowOutcome, FollowError> {
        let Some(author) = self.users.find_by_username(author_username).await? else {
            return Ok(FollowOutcome::AuthorNotFound);
        };

        self.follows.unfollow(user_id, author.id).await?;
        Ok(FollowOutcome::Applied)
    }
}
