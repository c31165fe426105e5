use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CreateSessionParams, RepoError, SessionsRepo};
use crate::domain::entities::{SessionRecord, UserRecord};

use super::PostgresRepositories;
use super::util::map_sqlx_error;

#[derive(sqlx::FromRow)]
struct SessionRow {
    token: String,
    user_id: Uuid,
    created_at: OffsetDateTime,
    expires_at: OffsetDateTime,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        Self {
            token: row.token,
            user_id: row.user_id,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionUserRow {
    token: String,
    user_id: Uuid,
    session_created_at: OffsetDateTime,
    expires_at: OffsetDateTime,
    username: String,
    password_hash: String,
    display_name: Option<String>,
    joined_at: OffsetDateTime,
}

#[async_trait]
impl SessionsRepo for PostgresRepositories {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let row = sqlx::query_as::<_, SessionRow>(
            "INSERT INTO sessions (token, user_id, expires_at) \
             VALUES ($1, $2, $3) \
             RETURNING token, user_id, created_at, expires_at",
        )
        .bind(&params.token)
        .bind(params.user_id)
        .bind(params.expires_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(SessionRecord::from(row))
    }

    async fn find_session(
        &self,
        token: &str,
    ) -> Result<Option<(SessionRecord, UserRecord)>, RepoError> {
        let row = sqlx::query_as::<_, SessionUserRow>(
            "SELECT s.token, s.user_id, s.created_at AS session_created_at, s.expires_at, \
                    u.username, u.password_hash, u.display_name, u.joined_at \
             FROM sessions s \
             INNER JOIN users u ON u.id = s.user_id \
             WHERE s.token = $1",
        )
        .bind(token)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|row| {
            (
                SessionRecord {
                    token: row.token,
                    user_id: row.user_id,
                    created_at: row.session_created_at,
                    expires_at: row.expires_at,
                },
                UserRecord {
                    id: row.user_id,
                    username: row.username,
                    password_hash: row.password_hash,
                    display_name: row.display_name,
                    joined_at: row.joined_at,
                },
            )
        }))
    }

    async fn delete_session(&self, token: &str) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
