//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub joined_at: OffsetDateTime,
}

impl UserRecord {
    /// Name shown in templates: the display name when set, otherwise the username.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRecord {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: i64,
    pub text: String,
    pub created_at: OffsetDateTime,
    pub author_id: Uuid,
    pub group_id: Option<Uuid>,
    pub image: Option<String>,
}

/// A post joined with the context every list and detail view needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostWithMeta {
    pub post: PostRecord,
    pub author_username: String,
    pub author_display_name: Option<String>,
    pub group: Option<GroupRef>,
    pub comment_count: i64,
}

impl PostWithMeta {
    pub fn author_label(&self) -> &str {
        self.author_display_name
            .as_deref()
            .unwrap_or(&self.author_username)
    }
}

/// Slimmed group reference attached to posts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRef {
    pub slug: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub author_id: Uuid,
    pub text: String,
    pub created_at: OffsetDateTime,
}

/// A comment joined with its author's names for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentWithAuthor {
    pub comment: CommentRecord,
    pub author_username: String,
    pub author_display_name: Option<String>,
}

impl CommentWithAuthor {
    pub fn author_label(&self) -> &str {
        self.author_display_name
            .as_deref()
            .unwrap_or(&self.author_username)
    }
}

/// One-directional subscription edge from `user_id` to `author_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FollowRecord {
    pub user_id: Uuid,
    pub author_id: Uuid,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl SessionRecord {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn sample_user(display_name: Option<&str>) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            username: "leo".to_string(),
            password_hash: String::new(),
            display_name: display_name.map(str::to_string),
            joined_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn user_label_prefers_display_name() {
        assert_eq!(sample_user(Some("Leo Tolstoy")).label(), "Leo Tolstoy");
        assert_eq!(sample_user(None).label(), "leo");
    }

    #[test]
    fn session_expiry_is_inclusive() {
        let now = OffsetDateTime::now_utc();
        let session = SessionRecord {
            token: "t".to_string(),
            user_id: Uuid::new_v4(),
            created_at: now - Duration::hours(1),
            expires_at: now,
        };
        assert!(session.is_expired(now));
        assert!(!session.is_expired(now - Duration::seconds(1)));
    }
}
