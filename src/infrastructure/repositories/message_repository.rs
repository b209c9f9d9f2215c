//! Message Repository Implementation
//!
//! PostgreSQL implementation of message operations with offset/limit
//! pagination and per-side soft-delete updates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{DeleteSide, Message, MessageRepository};
use crate::shared::error::ChatError;

/// PostgreSQL message repository implementation.
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    /// Creates a new PgMessageRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for message queries.
/// Maps to the messages table schema defined in the migration.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    group_id: i64,
    sender_id: i64,
    text: Option<String>,
    media_url: Option<String>,
    sticker: Option<String>,
    reply_to_id: Option<i64>,
    seen: bool,
    last_seen: Option<DateTime<Utc>>,
    sender_deleted: bool,
    recipient_deleted: bool,
    edited_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MessageRow {
    /// Converts database row to domain Message entity.
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            group_id: self.group_id,
            sender_id: self.sender_id,
            text: self.text,
            media_url: self.media_url,
            sticker: self.sticker,
            reply_to_id: self.reply_to_id,
            seen: self.seen,
            last_seen: self.last_seen,
            sender_deleted: self.sender_deleted,
            recipient_deleted: self.recipient_deleted,
            edited_at: self.edited_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const MESSAGE_COLUMNS: &str = "id, group_id, sender_id, text, media_url, sticker, reply_to_id, \
     seen, last_seen, sender_deleted, recipient_deleted, edited_at, created_at, updated_at";

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, ChatError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {} FROM messages WHERE id = $1",
            MESSAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_message()))
    }

    /// Persist a new message.
    ///
    /// The ID is a pre-generated snowflake from the application layer;
    /// persisted ID order is what defines in-group message order.
    async fn create(&self, message: &Message) -> Result<Message, ChatError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            INSERT INTO messages (id, group_id, sender_id, text, media_url, sticker, reply_to_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(message.id)
        .bind(message.group_id)
        .bind(message.sender_id)
        .bind(&message.text)
        .bind(&message.media_url)
        .bind(&message.sticker)
        .bind(message.reply_to_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_message())
    }

    async fn update_text(&self, id: i64, text: &str) -> Result<Message, ChatError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            UPDATE messages
            SET text = $2, edited_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ChatError::NotFound(format!("Message {} not found", id)))?;

        Ok(row.into_message())
    }

    /// Single-row flag update; no cross-row locking needed.
    async fn set_deleted(&self, id: i64, side: DeleteSide) -> Result<Message, ChatError> {
        let column = match side {
            DeleteSide::Sender => "sender_deleted",
            DeleteSide::Recipient => "recipient_deleted",
        };

        let row = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            UPDATE messages
            SET {} = TRUE, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            column, MESSAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ChatError::NotFound(format!("Message {} not found", id)))?;

        Ok(row.into_message())
    }

    async fn mark_seen(&self, id: i64) -> Result<Message, ChatError> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            UPDATE messages
            SET seen = TRUE, last_seen = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ChatError::NotFound(format!("Message {} not found", id)))?;

        Ok(row.into_message())
    }

    async fn page_by_group(
        &self,
        group_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Message>, ChatError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            SELECT {} FROM messages
            WHERE group_id = $1
            ORDER BY id DESC
            OFFSET $2 LIMIT $3
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(group_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_message()).collect())
    }

    async fn page_by_member(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Message>, ChatError> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            SELECT {} FROM messages
            WHERE group_id IN (SELECT group_id FROM group_members WHERE user_id = $1)
            ORDER BY id DESC
            OFFSET $2 LIMIT $3
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(user_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_message()).collect())
    }
}
