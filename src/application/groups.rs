//! Group management.
//!
//! Groups have no public creation route; administrators create them with the
//! `create-group` CLI subcommand.

use std::sync::Arc;

use thiserror::Error;

use crate::application::repos::{CreateGroupParams, GroupsRepo, RepoError};
use crate::domain::entities::GroupRecord;
use crate::domain::slug::{SlugAsyncError, SlugError, generate_unique_slug_async};

#[derive(Debug, Error)]
pub enum GroupError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Slug(#[from] SlugError),
    #[error("a group titled `{title}` already exists")]
    DuplicateTitle { title: String },
}

#[derive(Clone)]
pub struct GroupService {
    groups: Arc<dyn GroupsRepo>,
}

impl GroupService {
    pub fn new(groups: Arc<dyn GroupsRepo>) -> Self {
        Self { groups }
    }

    pub async fn list_all(&self) -> Result<Vec<GroupRecord>, GroupError> {
        self.groups.list_all().await.map_err(GroupError::from)
    }

    /// Create a group, deriving a unique slug from the title.
    pub async fn create_group(
        &self,
        title: &str,
        description: Option<&str>,
    ) -> Result<GroupRecord, GroupError> {
        let title = title.trim();
        let slug = generate_unique_slug_async(title, |candidate| {
            let groups = self.groups.clone();
            let candidate = candidate.to_string();
            async move { Ok::<_, RepoError>(groups.find_by_slug(&candidate).await?.is_none()) }
        })
        .await
        .map_err(|err| match err {
            SlugAsyncError::Slug(err) => GroupError::Slug(err),
            SlugAsyncError::Predicate(err) => GroupError::Repo(err),
        })?;

        let description = description
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string);

        match self
            .groups
            .create_group(CreateGroupParams {
                title: title.to_string(),
                slug,
                description,
            })
            .await
        {
            Ok(group) => Ok(group),
            Err(RepoError::Duplicate { .. }) => Err(GroupError::DuplicateTitle {
                title: title.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }
}
