//! Inbound event payloads.
//!
//! One declared shape per event name. Payloads are deserialized with
//! serde and then field-checked with validator; anything that fails
//! either step is rejected at the dispatcher boundary before a handler
//! runs.

use serde::Deserialize;
use validator::Validate;

/// `typing` — ephemeral indicator, no persistence.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TypingPayload {
    /// Recipient user, for one-on-one conversations
    pub to_user: Option<i64>,
    /// Recipient group
    pub to_group: Option<i64>,
}

/// `send_message` — persist and fan out.
///
/// Exactly one of `to_user` / `group_id` selects the conversation; at
/// least one of text/media/sticker must be present (checked by the
/// message store, mirrored in the database CHECK constraint).
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendMessagePayload {
    /// Direct recipient; the direct group is resolved or created
    pub to_user: Option<i64>,
    /// Existing group to post into
    pub group_id: Option<i64>,
    #[validate(length(max = 4000, message = "text too long"))]
    pub text: Option<String>,
    #[validate(length(max = 255, message = "media reference too long"))]
    pub media_url: Option<String>,
    #[validate(length(max = 140, message = "sticker reference too long"))]
    pub sticker: Option<String>,
    /// Message being replied to (must live in the same group)
    pub reply_to: Option<i64>,
}

/// `fetch_messages` — paginated read, no notification.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FetchMessagesPayload {
    pub group_id: i64,
    #[validate(range(min = 1, message = "page starts at 1"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, message = "page_size starts at 1"))]
    pub page_size: Option<i64>,
}

/// `fetch_inbox` — same pagination contract across all of the
/// requester's groups.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FetchInboxPayload {
    #[validate(range(min = 1, message = "page starts at 1"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, message = "page_size starts at 1"))]
    pub page_size: Option<i64>,
}

/// `edit_message` — text edit by the original sender.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EditMessagePayload {
    pub message_id: i64,
    #[validate(length(min = 1, max = 4000, message = "text must be 1-4000 characters"))]
    pub text: String,
}

/// `remove_message` — per-side soft delete.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RemoveMessagePayload {
    pub message_id: i64,
}

/// `mark_seen` — seen flag + last_seen stamp.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MarkSeenPayload {
    pub message_id: i64,
}

/// `create_group` — explicit multi-party group creation.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateGroupPayload {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(max = 255, message = "description too long"))]
    pub description: Option<String>,
    #[serde(default)]
    pub member_ids: Vec<i64>,
}

/// `add_member` — grow a multi-party group.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddMemberPayload {
    pub group_id: i64,
    pub user_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_send_message_payload_parses() {
        let payload: SendMessagePayload = serde_json::from_value(json!({
            "to_user": 7,
            "text": "hi"
        }))
        .unwrap();
        assert_eq!(payload.to_user, Some(7));
        assert_eq!(payload.text.as_deref(), Some("hi"));
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_fetch_messages_rejects_zero_page() {
        let payload: FetchMessagesPayload = serde_json::from_value(json!({
            "group_id": 1,
            "page": 0
        }))
        .unwrap();
        assert!(payload.validate().is_err());
    }

    #[test]
    fn test_edit_message_rejects_empty_text() {
        let payload: EditMessagePayload = serde_json::from_value(json!({
            "message_id": 1,
            "text": ""
        }))
        .unwrap();
        assert!(payload.validate().is_err());
    }
}
