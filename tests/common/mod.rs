//! Common Test Fixtures

use chrono::Utc;

use chatme_server::domain::{Group, GroupKind, Message};

/// A minimal persisted-looking group.
pub fn sample_group(id: i64, name: &str, kind: GroupKind) -> Group {
    let now = Utc::now();
    Group {
        id,
        name: name.to_string(),
        description: None,
        kind,
        created_at: now,
        updated_at: now,
    }
}

/// A minimal persisted-looking text message.
pub fn sample_message(id: i64, group_id: i64, sender_id: i64, text: &str) -> Message {
    let now = Utc::now();
    Message {
        id,
        group_id,
        sender_id,
        text: Some(text.to_string()),
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
