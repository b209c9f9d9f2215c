//! Response DTOs
//!
//! Wire representations of domain entities. IDs are serialized as
//! strings since snowflakes overflow JavaScript number precision.

use serde::Serialize;

use crate::domain::{Group, Message};

/// Group response
#[derive(Debug, Clone, Serialize)]
pub struct GroupDto {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub kind: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Group> for GroupDto {
    fn from(group: Group) -> Self {
        Self {
            id: group.id.to_string(),
            name: group.name,
            description: group.description,
            kind: group.kind.as_str().to_string(),
            created_at: group.created_at.to_rfc3339(),
            updated_at: group.updated_at.to_rfc3339(),
        }
    }
}

/// Message response
#[derive(Debug, Clone, Serialize)]
pub struct MessageDto {
    pub id: String,
    pub group_id: String,
    pub sender_id: String,
    pub text: Option<String>,
    pub media_url: Option<String>,
    pub sticker: Option<String>,
    pub reply_to_id: Option<String>,
    pub seen: bool,
    pub last_seen: Option<String>,
    pub sender_deleted: bool,
    pub recipient_deleted: bool,
    pub edited_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Message> for MessageDto {
    fn from(message: Message) -> Self {
        Self {
            id: message.id.to_string(),
            group_id: message.group_id.to_string(),
            sender_id: message.sender_id.to_string(),
            text: message.text,
            media_url: message.media_url,
            sticker: message.sticker,
            reply_to_id: message.reply_to_id.map(|id| id.to_string()),
            seen: message.seen,
            last_seen: message.last_seen.map(|t| t.to_rfc3339()),
            sender_deleted: message.sender_deleted,
            recipient_deleted: message.recipient_deleted,
            edited_at: message.edited_at.map(|t| t.to_rfc3339()),
            created_at: message.created_at.to_rfc3339(),
            updated_at: message.updated_at.to_rfc3339(),
        }
    }
}

/// Paginated message listing
#[derive(Debug, Clone, Serialize)]
pub struct MessagePageDto {
    pub messages: Vec<MessageDto>,
    pub page: i64,
    pub page_size: i64,
}
