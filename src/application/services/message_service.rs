//! Message Service
//!
//! Validates and persists messages, enforces per-side soft-delete and
//! edit rules, and serves paginated chronological reads.

use std::sync::Arc;

use chrono::Utc;

use crate::config::ChatSettings;
use crate::domain::{DeleteSide, GroupRepository, Message, MessageRepository};
use crate::shared::error::ChatError;
use crate::shared::snowflake::SnowflakeGenerator;

/// A message draft as received from a sender.
#[derive(Debug, Clone, Default)]
pub struct MessageDraft {
    pub text: Option<String>,
    pub media_url: Option<String>,
    pub sticker: Option<String>,
    pub reply_to: Option<i64>,
}

/// Message persistence and retrieval.
pub struct MessageService<M, G>
where
    M: MessageRepository,
    G: GroupRepository,
{
    message_repo: Arc<M>,
    group_repo: Arc<G>,
    id_generator: Arc<SnowflakeGenerator>,
    settings: ChatSettings,
}

impl<M, G> MessageService<M, G>
where
    M: MessageRepository,
    G: GroupRepository,
{
    pub fn new(
        message_repo: Arc<M>,
        group_repo: Arc<G>,
        id_generator: Arc<SnowflakeGenerator>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            message_repo,
            group_repo,
            id_generator,
            settings,
        }
    }

    /// Validate and persist a message; bumps the owning group's
    /// last-activity marker.
    pub async fn create(
        &self,
        group_id: i64,
        sender_id: i64,
        draft: MessageDraft,
    ) -> Result<Message, ChatError> {
        if let Some(text) = &draft.text {
            if text.chars().count() > self.settings.max_text_length {
                return Err(ChatError::Validation(format!(
                    "text exceeds {} characters",
                    self.settings.max_text_length
                )));
            }
        }

        let group = self
            .group_repo
            .find_by_id(group_id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("Group {} not found", group_id)))?;

        if !self.group_repo.is_member(group.id, sender_id).await? {
            return Err(ChatError::Forbidden(
                "sender is not a member of this group".into(),
            ));
        }

        // A reply must reference a message in the same group.
        if let Some(reply_to) = draft.reply_to {
            let parent = self
                .message_repo
                .find_by_id(reply_to)
                .await?
                .ok_or_else(|| {
                    ChatError::NotFound(format!("Replied-to message {} not found", reply_to))
                })?;
            if parent.group_id != group.id {
                return Err(ChatError::Validation(
                    "replied-to message belongs to a different group".into(),
                ));
            }
        }

        let now = Utc::now();
        let message = Message {
            id: self.id_generator.generate(),
            group_id: group.id,
            sender_id,
            text: draft.text,
            media_url: draft.media_url,
            sticker: draft.sticker,
            reply_to_id: draft.reply_to,
            seen: false,
            last_seen: None,
            sender_deleted: false,
            recipient_deleted: false,
            edited_at: None,
            created_at: now,
            updated_at: now,
        };

        if !message.has_content() {
            return Err(ChatError::Validation(
                "a message needs text, media, or a sticker".into(),
            ));
        }

        let created = self.message_repo.create(&message).await?;
        self.group_repo.touch(group.id).await?;

        Ok(created)
    }

    /// Hide a message from the requesting side's view. The row itself
    /// is never removed over this path.
    pub async fn soft_delete(
        &self,
        message_id: i64,
        requester_id: i64,
    ) -> Result<Message, ChatError> {
        let message = self.get(message_id).await?;

        let side = if message.sender_id == requester_id {
            DeleteSide::Sender
        } else if self
            .group_repo
            .is_member(message.group_id, requester_id)
            .await?
        {
            DeleteSide::Recipient
        } else {
            return Err(ChatError::Forbidden(
                "only the sender or a group member may remove a message".into(),
            ));
        };

        self.message_repo.set_deleted(message_id, side).await
    }

    /// Edit message text. Only the original sender may edit.
    pub async fn edit(
        &self,
        message_id: i64,
        requester_id: i64,
        new_text: &str,
    ) -> Result<Message, ChatError> {
        if new_text.trim().is_empty() {
            return Err(ChatError::Validation("edited text cannot be empty".into()));
        }
        if new_text.chars().count() > self.settings.max_text_length {
            return Err(ChatError::Validation(format!(
                "text exceeds {} characters",
                self.settings.max_text_length
            )));
        }

        let message = self.get(message_id).await?;

        if message.sender_id != requester_id {
            return Err(ChatError::Forbidden(
                "only the sender may edit a message".into(),
            ));
        }

        self.message_repo.update_text(message_id, new_text).await
    }

    /// Mark a message seen. The requester must be a member of the
    /// owning group.
    pub async fn mark_seen(
        &self,
        message_id: i64,
        requester_id: i64,
    ) -> Result<Message, ChatError> {
        let message = self.get(message_id).await?;

        if !self
            .group_repo
            .is_member(message.group_id, requester_id)
            .await?
        {
            return Err(ChatError::Forbidden(
                "only a group member may mark a message seen".into(),
            ));
        }

        self.message_repo.mark_seen(message_id).await
    }

    /// Page one group's messages, newest first, as seen by `viewer_id`:
    /// rows the viewer soft-deleted on their side are dropped from the
    /// page. Re-issuing the same call yields the same ordered list
    /// while no new messages land.
    pub async fn page_by_group(
        &self,
        group_id: i64,
        viewer_id: i64,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<Message>, ChatError> {
        if self.group_repo.find_by_id(group_id).await?.is_none() {
            return Err(ChatError::NotFound(format!("Group {} not found", group_id)));
        }

        let (offset, limit) = self.page_window(page, page_size)?;
        let messages = self.message_repo.page_by_group(group_id, offset, limit).await?;
        Ok(messages
            .into_iter()
            .filter(|m| m.visible_to(viewer_id))
            .collect())
    }

    /// Page messages across every group the user belongs to, with the
    /// same per-side visibility rules.
    pub async fn page_by_member(
        &self,
        user_id: i64,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<Message>, ChatError> {
        let (offset, limit) = self.page_window(page, page_size)?;
        let messages = self.message_repo.page_by_member(user_id, offset, limit).await?;
        Ok(messages
            .into_iter()
            .filter(|m| m.visible_to(user_id))
            .collect())
    }

    async fn get(&self, message_id: i64) -> Result<Message, ChatError> {
        self.message_repo
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("Message {} not found", message_id)))
    }

    /// Translate 1-based page/page_size to an offset/limit window,
    /// clamping page_size to the configured maximum.
    fn page_window(&self, page: i64, page_size: i64) -> Result<(i64, i64), ChatError> {
        if page < 1 || page_size < 1 {
            return Err(ChatError::Validation(
                "page and page_size must be positive".into(),
            ));
        }
        let limit = page_size.min(self.settings.max_page_size);
        Ok(((page - 1) * limit, limit))
    }
}
