//! Message entity and repository trait.
//!
//! Maps to the `messages` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::ChatError;

/// Which side of a conversation requested a soft delete.
///
/// A message row is never removed over the real-time path; deletion
/// only hides it from one participant's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteSide {
    /// The original sender hid the message from their own view.
    Sender,
    /// Another member of the group hid the message from theirs.
    Recipient,
}

/// Represents a message in a group conversation.
///
/// Maps to the `messages` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - group_id: BIGINT NOT NULL REFERENCES groups(id)
/// - sender_id: BIGINT NOT NULL
/// - text: TEXT NULL
/// - media_url: VARCHAR(255) NULL
/// - sticker: VARCHAR(140) NULL
/// - reply_to_id: BIGINT NULL REFERENCES messages(id)
/// - seen: BOOLEAN NOT NULL DEFAULT FALSE
/// - last_seen: TIMESTAMPTZ NULL
/// - sender_deleted: BOOLEAN NOT NULL DEFAULT FALSE
/// - recipient_deleted: BOOLEAN NOT NULL DEFAULT FALSE
/// - edited_at: TIMESTAMPTZ NULL
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// - updated_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
///
/// A CHECK constraint guarantees at least one of text/media_url/sticker
/// is non-null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Owning group
    pub group_id: i64,

    /// Sender identity
    pub sender_id: i64,

    /// Text content
    pub text: Option<String>,

    /// Media reference
    pub media_url: Option<String>,

    /// Sticker reference
    pub sticker: Option<String>,

    /// ID of the message being replied to (same group)
    pub reply_to_id: Option<i64>,

    /// Whether the message has been seen
    pub seen: bool,

    /// When the message was last seen
    pub last_seen: Option<DateTime<Utc>>,

    /// Soft-delete flag, sender side
    pub sender_deleted: bool,

    /// Soft-delete flag, recipient side
    pub recipient_deleted: bool,

    /// When the text was last edited (None if never)
    pub edited_at: Option<DateTime<Utc>>,

    /// Timestamp when the message was persisted
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// A message must carry content: at least one of text, media,
    /// sticker.
    pub fn has_content(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty())
            || self.media_url.is_some()
            || self.sticker.is_some()
    }

    /// Check if this message has been edited.
    pub fn is_edited(&self) -> bool {
        self.edited_at.is_some()
    }

    /// Check if this is a reply message.
    pub fn is_reply(&self) -> bool {
        self.reply_to_id.is_some()
    }

    /// Whether a viewer still sees this message. The sender's view is
    /// governed by the sender-side flag, every other member's by the
    /// recipient-side flag.
    pub fn visible_to(&self, viewer_id: i64) -> bool {
        if self.sender_id == viewer_id {
            !self.sender_deleted
        } else {
            !self.recipient_deleted
        }
    }
}

/// Repository trait for Message data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Find a message by its Snowflake ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, ChatError>;

    /// Persist a new message.
    async fn create(&self, message: &Message) -> Result<Message, ChatError>;

    /// Update message text and stamp `edited_at`.
    async fn update_text(&self, id: i64, text: &str) -> Result<Message, ChatError>;

    /// Set a per-side soft-delete flag. The row is never removed.
    async fn set_deleted(&self, id: i64, side: DeleteSide) -> Result<Message, ChatError>;

    /// Mark a message seen and stamp `last_seen`.
    async fn mark_seen(&self, id: i64) -> Result<Message, ChatError>;

    /// Page messages of a group, newest first (`ORDER BY id DESC`),
    /// offset/limit based. Deterministic and restartable.
    async fn page_by_group(
        &self,
        group_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Message>, ChatError>;

    /// Page messages across every group the user belongs to, same
    /// ordering contract as `page_by_group`.
    async fn page_by_member(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Message>, ChatError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_message() -> Message {
        let now = Utc::now();
        Message {
            id: 1,
            group_id: 1,
            sender_id: 1,
            text: None,
            media_url: None,
            sticker: None,
            reply_to_id: None,
            seen: false,
            last_seen: None,
            sender_deleted: false,
            recipient_deleted: false,
            edited_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_has_content_requires_some_content() {
        let mut msg = blank_message();
        assert!(!msg.has_content());

        msg.text = Some("  ".into());
        assert!(!msg.has_content(), "whitespace-only text is not content");

        msg.text = Some("hi".into());
        assert!(msg.has_content());

        msg.text = None;
        msg.sticker = Some("wave".into());
        assert!(msg.has_content());

        msg.sticker = None;
        msg.media_url = Some("https://cdn.example.com/img.png".into());
        assert!(msg.has_content());
    }

    #[test]
    fn test_visibility_tracks_the_deleting_side() {
        let mut msg = blank_message();
        msg.sender_id = 7;
        assert!(msg.visible_to(7));
        assert!(msg.visible_to(8));

        msg.sender_deleted = true;
        assert!(!msg.visible_to(7), "hidden from the sender only");
        assert!(msg.visible_to(8));

        msg.sender_deleted = false;
        msg.recipient_deleted = true;
        assert!(msg.visible_to(7));
        assert!(!msg.visible_to(8), "hidden from the other side only");
    }
}
