use async_trait::async_trait;
use sqlx::QueryBuilder;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CreatePostParams, PostScope, PostsRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{GroupRef, PostRecord, PostWithMeta};

use super::PostgresRepositories;
use super::util::map_sqlx_error;

/// Columns selected for a post joined with its display context.
const POST_META_COLUMNS: &str = "p.id, p.text, p.created_at, p.author_id, p.group_id, p.image, \
     u.username AS author_username, u.display_name AS author_display_name, \
     g.slug AS group_slug, g.title AS group_title, \
     (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count";

const POST_META_JOINS: &str = " FROM posts p \
     INNER JOIN users u ON u.id = p.author_id \
     LEFT JOIN groups g ON g.id = p.group_id ";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    text: String,
    created_at: OffsetDateTime,
    author_id: Uuid,
    group_id: Option<Uuid>,
    image: Option<String>,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            text: row.text,
            created_at: row.created_at,
            author_id: row.author_id,
            group_id: row.group_id,
            image: row.image,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PostMetaRow {
    id: i64,
    text: String,
    created_at: OffsetDateTime,
    author_id: Uuid,
    group_id: Option<Uuid>,
    image: Option<String>,
    author_username: String,
    author_display_name: Option<String>,
    group_slug: Option<String>,
    group_title: Option<String>,
    comment_count: i64,
}

impl From<PostMetaRow> for PostWithMeta {
    fn from(row: PostMetaRow) -> Self {
        let group = match (row.group_slug, row.group_title) {
            (Some(slug), Some(title)) => Some(GroupRef { slug, title }),
            _ => None,
        };

        Self {
            post: PostRecord {
                id: row.id,
                text: row.text,
                created_at: row.created_at,
                author_id: row.author_id,
                group_id: row.group_id,
                image: row.image,
            },
            author_username: row.author_username,
            author_display_name: row.author_display_name,
            group,
            comment_count: row.comment_count,
        }
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_posts(
        &self,
        scope: PostScope,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<PostWithMeta>, RepoError> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(POST_META_COLUMNS);
        qb.push(POST_META_JOINS);
        qb.push(" WHERE 1=1 ");
        Self::apply_post_scope(&mut qb, scope);
        qb.push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ");
        qb.push_bind(i64::from(limit.min(100)));
        qb.push(" OFFSET ");
        qb.push_bind(i64::try_from(offset).unwrap_or(i64::MAX));

        let rows = qb
            .build_query_as::<PostMetaRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostWithMeta::from).collect())
    }

    async fn count_posts(&self, scope: PostScope) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM posts p WHERE 1=1 ");
        Self::apply_post_scope(&mut qb, scope);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn find_post(&self, id: i64) -> Result<Option<PostWithMeta>, RepoError> {
        let sql = format!("SELECT {POST_META_COLUMNS}{POST_META_JOINS} WHERE p.id = $1");

        let row = sqlx::query_as::<_, PostMetaRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostWithMeta::from))
    }

    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            "INSERT INTO posts (text, author_id, group_id, image) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, text, created_at, author_id, group_id, image",
        )
        .bind(&params.text)
        .bind(params.author_id)
        .bind(params.group_id)
        .bind(&params.image)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(PostRecord::from(row))
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            "UPDATE posts SET text = $2, group_id = $3, image = $4 \
             WHERE id = $1 \
             RETURNING id, text, created_at, author_id, group_id, image",
        )
        .bind(params.id)
        .bind(&params.text)
        .bind(params.group_id)
        .bind(&params.image)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Ok(PostRecord::from(row))
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        Ok(())
    }
}
