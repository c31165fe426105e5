//! Read side of the application: paginated post feeds and the post detail.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::{PageWindow, PaginationError, Paginator};
use crate::application::repos::{
    CommentsRepo, FollowsRepo, GroupsRepo, PostScope, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{CommentWithAuthor, GroupRecord, PostWithMeta, UserRecord};

/// Page size and navigation window radius shared by every list view.
#[derive(Debug, Clone, Copy)]
pub struct FeedPagination {
    pub per_page: u32,
    pub delta: u32,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("`{entity}` not found")]
    NotFound { entity: &'static str },
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// One page of posts plus the navigation window that goes with it.
#[derive(Debug, Clone)]
pub struct PostPage {
    pub posts: Vec<PostWithMeta>,
    pub window: PageWindow,
    pub total_posts: u64,
}

/// Everything the profile view needs beyond the post page itself.
#[derive(Debug, Clone)]
pub struct ProfilePage {
    pub author: UserRecord,
    pub page: PostPage,
    pub follower_count: u64,
    pub following_count: u64,
    /// Whether the signed-in viewer follows this author; `false` when
    /// anonymous or viewing their own profile.
    pub viewer_follows: bool,
    pub viewer_is_author: bool,
}

#[derive(Debug, Clone)]
pub struct PostDetail {
    pub post: PostWithMeta,
    pub comments: Vec<CommentWithAuthor>,
    pub author_post_count: u64,
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    users: Arc<dyn UsersRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments: Arc<dyn CommentsRepo>,
    follows: Arc<dyn FollowsRepo>,
    pagination: FeedPagination,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        users: Arc<dyn UsersRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments: Arc<dyn CommentsRepo>,
        follows: Arc<dyn FollowsRepo>,
        pagination: FeedPagination,
    ) -> Self {
        Self {
            posts,
            users,
            groups,
            comments,
            follows,
            pagination,
        }
    }

    pub fn pagination(&self) -> FeedPagination {
        self.pagination
    }

    async fn page(&self, scope: PostScope, requested: u32) -> Result<PostPage, FeedError> {
        let total = self.posts.count_posts(scope).await?;
        let paginator = Paginator::new(total, self.pagination.per_page)?;
        let page = paginator.get_page(requested);

        let posts = self
            .posts
            .list_posts(scope, page.limit(), page.offset())
            .await?;

        Ok(PostPage {
            posts,
            window: page.window(self.pagination.delta),
            total_posts: total,
        })
    }

    /// The home page feed: every post, newest first.
    pub async fn index_page(&self, requested: u32) -> Result<PostPage, FeedError> {
        self.page(PostScope::All, requested).await
    }

    /// Posts of one group; `NotFound` for an unknown slug.
    pub async fn group_page(
        &self,
        slug: &str,
        requested: u32,
    ) -> Result<(GroupRecord, PostPage), FeedError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or(FeedError::NotFound { entity: "group" })?;

        let page = self.page(PostScope::Group(group.id), requested).await?;
        Ok((group, page))
    }

    /// An author's profile with their posts and follow counters.
    pub async fn profile_page(
        &self,
        username: &str,
        viewer: Option<Uuid>,
        requested: u32,
    ) -> Result<ProfilePage, FeedError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(FeedError::NotFound { entity: "user" })?;

        let page = self.page(PostScope::Author(author.id), requested).await?;
        let follower_count = self.follows.follower_count(author.id).await?;
        let following_count = self.follows.following_count(author.id).await?;

        let viewer_is_author = viewer == Some(author.id);
        let viewer_follows = match viewer {
            Some(viewer_id) if !viewer_is_author => {
                self.follows.is_following(viewer_id, author.id).await?
            }
            _ => false,
        };

        Ok(ProfilePage {
            author,
            page,
            follower_count,
            following_count,
            viewer_follows,
            viewer_is_author,
        })
    }

    /// Posts by the authors the viewer follows.
    pub async fn follow_page(&self, viewer: Uuid, requested: u32) -> Result<PostPage, FeedError> {
        self.page(PostScope::FollowedBy(viewer), requested).await
    }

    /// A single post addressed by author username and post id.
    ///
    /// Returns `None` when the post does not exist or belongs to a different
    /// author, matching the URL scheme where both parts must agree.
    pub async fn post_detail(
        &self,
        username: &str,
        post_id: i64,
    ) -> Result<Option<PostDetail>, FeedError> {
        let Some(post) = self.posts.find_post(post_id).await? else {
            return Ok(None);
        };

        if post.author_username != username {
            return Ok(None);
        }

        let comments = self.comments.list_for_post(post_id).await?;
        let author_post_count = self
            .posts
            .count_posts(PostScope::Author(post.post.author_id))
            .await?;

        Ok(Some(PostDetail {
            post,
            comments,
            author_post_count,
        }))
    }
}
