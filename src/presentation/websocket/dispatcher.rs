//! Event Dispatcher
//!
//! Routes named wire events to their handlers. Every event has one
//! declared payload shape; anything that fails to parse or validate is
//! rejected before a handler runs. Handler outcomes are wrapped in the
//! uniform envelope and sent back to the originating connection as
//! `{event}_response`; they are never broadcast.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::application::dto::{
    AddMemberPayload, CreateGroupPayload, EditMessagePayload, Envelope, FetchInboxPayload,
    FetchMessagesPayload, GroupDto, MarkSeenPayload, MessageDto, MessagePageDto,
    RemoveMessagePayload, SendMessagePayload, TypingPayload,
};
use crate::application::services::{
    ConnectionSink, GroupService, MessageDraft, MessageService, NotificationRouter,
};
use crate::config::ChatSettings;
use crate::domain::{GroupRepository, MessageRepository};
use crate::infrastructure::cache::{Identity, PresenceRegistry};
use crate::shared::error::ChatError;

use super::connection::OutboundFrame;

/// Per-connection context the dispatcher needs to route an event.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    /// Connection handle, also the presence registry value.
    pub session_id: String,
    /// Verified user, if the connection presented a valid token.
    pub user_id: Option<i64>,
    /// Peer address, basis of the anonymous identity fallback.
    pub remote_addr: String,
}

impl ConnectionContext {
    /// The identity this connection acts as. Unauthenticated
    /// connections fall back to an address-derived identity, which is
    /// enough for presence and typing but for nothing content-producing.
    pub fn identity(&self) -> Identity {
        match self.user_id {
            Some(id) => Identity::User(id),
            None => Identity::Anonymous(self.remote_addr.clone()),
        }
    }

    fn authenticated_user(&self) -> Result<i64, ChatError> {
        self.user_id
            .ok_or_else(|| ChatError::Unauthorized("this event requires authentication".into()))
    }
}

/// Routes inbound events to group, message, and notification services.
pub struct EventDispatcher<G, M, P, S>
where
    G: GroupRepository,
    M: MessageRepository,
    P: PresenceRegistry,
    S: ConnectionSink,
{
    groups: GroupService<G>,
    messages: MessageService<M, G>,
    router: NotificationRouter<P, S, G>,
    presence: Arc<P>,
    settings: ChatSettings,
}

impl<G, M, P, S> EventDispatcher<G, M, P, S>
where
    G: GroupRepository,
    M: MessageRepository,
    P: PresenceRegistry,
    S: ConnectionSink,
{
    pub fn new(
        groups: GroupService<G>,
        messages: MessageService<M, G>,
        router: NotificationRouter<P, S, G>,
        presence: Arc<P>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            groups,
            messages,
            router,
            presence,
            settings,
        }
    }

    /// Dispatch one inbound event and produce the response frame for
    /// the originating connection.
    pub async fn dispatch(&self, event: &str, data: Value, ctx: &ConnectionContext) -> OutboundFrame {
        let envelope = match self.route(event, data, ctx).await {
            Ok(envelope) => envelope,
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(event = %event, session_id = %ctx.session_id, error = %e, "Event failed");
                } else {
                    tracing::debug!(event = %event, session_id = %ctx.session_id, error = %e, "Event rejected");
                }
                Envelope::from(&e)
            }
        };

        response_frame(event, &envelope)
    }

    async fn route(
        &self,
        event: &str,
        data: Value,
        ctx: &ConnectionContext,
    ) -> Result<Envelope, ChatError> {
        match event {
            "connect" => self.on_connect(ctx).await,
            "disconnect" => self.on_disconnect(ctx).await,
            "typing" => self.on_typing(data, ctx).await,
            "send_message" => self.on_send_message(data, ctx).await,
            "fetch_messages" => self.on_fetch_messages(data, ctx).await,
            "fetch_inbox" => self.on_fetch_inbox(data, ctx).await,
            "edit_message" => self.on_edit_message(data, ctx).await,
            "remove_message" => self.on_remove_message(data, ctx).await,
            "mark_seen" => self.on_mark_seen(data, ctx).await,
            "create_group" => self.on_create_group(data, ctx).await,
            "add_member" => self.on_add_member(data, ctx).await,
            unknown => Err(ChatError::UnknownEvent(unknown.to_string())),
        }
    }

    async fn on_connect(&self, ctx: &ConnectionContext) -> Result<Envelope, ChatError> {
        let identity = ctx.identity();
        self.presence.connect(&identity, &ctx.session_id).await?;
        Ok(Envelope::ok(
            "connected",
            json!({"identity": identity.key()}),
        ))
    }

    async fn on_disconnect(&self, ctx: &ConnectionContext) -> Result<Envelope, ChatError> {
        self.presence.disconnect(&ctx.identity()).await?;
        Ok(Envelope::ok_empty("disconnected"))
    }

    /// Ephemeral typing indicator; nothing is persisted, an offline
    /// recipient is a silent no-op.
    async fn on_typing(&self, data: Value, ctx: &ConnectionContext) -> Result<Envelope, ChatError> {
        let payload: TypingPayload = parse_payload(data)?;
        let identity = ctx.identity();
        let indicator = json!({"from": identity.key()});

        match (payload.to_user, payload.to_group) {
            (Some(user_id), None) => {
                self.router.notify_user(user_id, "typing", &indicator).await?;
            }
            (None, Some(group_id)) => {
                let exclude: Vec<i64> = ctx.user_id.into_iter().collect();
                self.router
                    .notify_group(group_id, &exclude, "typing", &indicator)
                    .await?;
            }
            _ => {
                return Err(ChatError::Validation(
                    "exactly one of to_user or to_group is required".into(),
                ))
            }
        }

        Ok(Envelope::ok_empty("typing sent"))
    }

    async fn on_send_message(
        &self,
        data: Value,
        ctx: &ConnectionContext,
    ) -> Result<Envelope, ChatError> {
        let sender = ctx.authenticated_user()?;
        let payload: SendMessagePayload = parse_payload(data)?;

        let group = match (payload.to_user, payload.group_id) {
            (Some(to_user), None) => self.groups.resolve_or_create_direct(sender, to_user).await?,
            (None, Some(group_id)) => self.groups.resolve_group(group_id).await?,
            _ => {
                return Err(ChatError::Validation(
                    "exactly one of to_user or group_id is required".into(),
                ))
            }
        };

        let draft = MessageDraft {
            text: payload.text,
            media_url: payload.media_url,
            sticker: payload.sticker,
            reply_to: payload.reply_to,
        };
        let message = self.messages.create(group.id, sender, draft).await?;
        let data = to_data(&MessageDto::from(message))?;

        // Every member's connection gets the message, the sender's
        // included; the message is persisted, so a failed fan-out must
        // not undo that.
        if let Err(e) = self
            .router
            .notify_group(group.id, &[], "receive_message", &data)
            .await
        {
            tracing::warn!(group_id = %group.id, error = %e, "Fan-out failed after persist");
        }

        Ok(Envelope::ok("Message sent", data))
    }

    async fn on_fetch_messages(
        &self,
        data: Value,
        ctx: &ConnectionContext,
    ) -> Result<Envelope, ChatError> {
        let user = ctx.authenticated_user()?;
        let payload: FetchMessagesPayload = parse_payload(data)?;

        self.groups.resolve_group(payload.group_id).await?;
        if !self.groups.members(payload.group_id).await?.contains(&user) {
            return Err(ChatError::Forbidden(
                "only group members may read its messages".into(),
            ));
        }

        let page = payload.page.unwrap_or(1);
        let page_size = payload.page_size.unwrap_or(self.settings.default_page_size);
        let messages = self
            .messages
            .page_by_group(payload.group_id, user, page, page_size)
            .await?;

        let dto = MessagePageDto {
            messages: messages.into_iter().map(MessageDto::from).collect(),
            page,
            page_size,
        };
        Ok(Envelope::ok("Messages fetched", to_data(&dto)?))
    }

    async fn on_fetch_inbox(
        &self,
        data: Value,
        ctx: &ConnectionContext,
    ) -> Result<Envelope, ChatError> {
        let user = ctx.authenticated_user()?;
        let payload: FetchInboxPayload = parse_payload(data)?;

        let page = payload.page.unwrap_or(1);
        let page_size = payload.page_size.unwrap_or(self.settings.default_page_size);
        let messages = self.messages.page_by_member(user, page, page_size).await?;

        let dto = MessagePageDto {
            messages: messages.into_iter().map(MessageDto::from).collect(),
            page,
            page_size,
        };
        Ok(Envelope::ok("Inbox fetched", to_data(&dto)?))
    }

    async fn on_edit_message(
        &self,
        data: Value,
        ctx: &ConnectionContext,
    ) -> Result<Envelope, ChatError> {
        let user = ctx.authenticated_user()?;
        let payload: EditMessagePayload = parse_payload(data)?;

        let edited = self.messages.edit(payload.message_id, user, &payload.text).await?;
        let group_id = edited.group_id;
        let data = to_data(&MessageDto::from(edited))?;

        if let Err(e) = self
            .router
            .notify_group(group_id, &[user], "message_edited", &data)
            .await
        {
            tracing::warn!(group_id = %group_id, error = %e, "Fan-out failed after edit");
        }

        Ok(Envelope::ok("Message edited", data))
    }

    /// Hides the message from the requester's side only, so the other
    /// side is not notified.
    async fn on_remove_message(
        &self,
        data: Value,
        ctx: &ConnectionContext,
    ) -> Result<Envelope, ChatError> {
        let user = ctx.authenticated_user()?;
        let payload: RemoveMessagePayload = parse_payload(data)?;

        let deleted = self.messages.soft_delete(payload.message_id, user).await?;
        Ok(Envelope::ok(
            "Message removed",
            to_data(&MessageDto::from(deleted))?,
        ))
    }

    async fn on_mark_seen(
        &self,
        data: Value,
        ctx: &ConnectionContext,
    ) -> Result<Envelope, ChatError> {
        let user = ctx.authenticated_user()?;
        let payload: MarkSeenPayload = parse_payload(data)?;

        let seen = self.messages.mark_seen(payload.message_id, user).await?;
        let sender_id = seen.sender_id;
        let data = to_data(&MessageDto::from(seen))?;

        // Tell the sender their message was read, unless they read it
        // themselves.
        if sender_id != user {
            if let Err(e) = self.router.notify_user(sender_id, "message_seen", &data).await {
                tracing::warn!(sender_id = %sender_id, error = %e, "Seen notification failed");
            }
        }

        Ok(Envelope::ok("Message marked seen", data))
    }

    async fn on_create_group(
        &self,
        data: Value,
        ctx: &ConnectionContext,
    ) -> Result<Envelope, ChatError> {
        let user = ctx.authenticated_user()?;
        let payload: CreateGroupPayload = parse_payload(data)?;

        let group = self
            .groups
            .create_multi_party(user, &payload.name, payload.description, &payload.member_ids)
            .await?;
        let group_id = group.id;
        let data = to_data(&GroupDto::from(group))?;

        if let Err(e) = self
            .router
            .notify_group(group_id, &[user], "group_created", &data)
            .await
        {
            tracing::warn!(group_id = %group_id, error = %e, "Fan-out failed after group creation");
        }

        Ok(Envelope::ok("Group created", data))
    }

    async fn on_add_member(
        &self,
        data: Value,
        ctx: &ConnectionContext,
    ) -> Result<Envelope, ChatError> {
        let user = ctx.authenticated_user()?;
        let payload: AddMemberPayload = parse_payload(data)?;

        if !self.groups.members(payload.group_id).await?.contains(&user) {
            return Err(ChatError::Forbidden(
                "only group members may add members".into(),
            ));
        }

        let group = self.groups.add_member(payload.group_id, payload.user_id).await?;
        let data = to_data(&GroupDto::from(group))?;

        if let Err(e) = self
            .router
            .notify_user(payload.user_id, "added_to_group", &data)
            .await
        {
            tracing::warn!(user_id = %payload.user_id, error = %e, "Membership notification failed");
        }

        Ok(Envelope::ok("Member added", data))
    }
}

/// Parse and field-validate an event payload against its declared shape.
fn parse_payload<T>(data: Value) -> Result<T, ChatError>
where
    T: DeserializeOwned + Validate,
{
    let payload: T = serde_json::from_value(data)
        .map_err(|e| ChatError::Validation(format!("malformed payload: {}", e)))?;
    payload
        .validate()
        .map_err(|e| ChatError::Validation(e.to_string()))?;
    Ok(payload)
}

fn to_data<T: Serialize>(value: &T) -> Result<Value, ChatError> {
    serde_json::to_value(value)
        .map_err(|e| ChatError::Infrastructure(format!("serialization: {}", e)))
}

fn response_frame(event: &str, envelope: &Envelope) -> OutboundFrame {
    let data = serde_json::to_value(envelope).unwrap_or_else(|_| {
        json!({"success": false, "message": "internal serialization failure"})
    });
    OutboundFrame::new(format!("{}_response", event), data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::MockConnectionSink;
    use crate::config::ChatSettings;
    use crate::domain::{Group, GroupKind, Message, MockGroupRepository, MockMessageRepository};
    use crate::infrastructure::cache::MockPresenceRegistry;
    use crate::shared::snowflake::SnowflakeGenerator;
    use chrono::Utc;
    use mockall::predicate::*;

    fn settings() -> ChatSettings {
        ChatSettings {
            default_page_size: 10,
            max_page_size: 100,
            max_text_length: 4000,
        }
    }

    fn dispatcher(
        groups: MockGroupRepository,
        messages: MockMessageRepository,
        presence: MockPresenceRegistry,
        sink: MockConnectionSink,
    ) -> EventDispatcher<
        MockGroupRepository,
        MockMessageRepository,
        MockPresenceRegistry,
        MockConnectionSink,
    > {
        let groups = Arc::new(groups);
        let messages = Arc::new(messages);
        let presence = Arc::new(presence);
        let sink = Arc::new(sink);
        let id_generator = Arc::new(SnowflakeGenerator::new(1, 1));

        EventDispatcher::new(
            GroupService::new(groups.clone(), id_generator.clone()),
            MessageService::new(messages, groups.clone(), id_generator, settings()),
            NotificationRouter::new(presence.clone(), sink, groups),
            presence,
            settings(),
        )
    }

    fn user_ctx(user_id: i64) -> ConnectionContext {
        ConnectionContext {
            session_id: "sess-1".into(),
            user_id: Some(user_id),
            remote_addr: "203.0.113.9".into(),
        }
    }

    fn anon_ctx() -> ConnectionContext {
        ConnectionContext {
            session_id: "sess-anon".into(),
            user_id: None,
            remote_addr: "203.0.113.9".into(),
        }
    }

    fn make_group(id: i64, name: &str, kind: GroupKind) -> Group {
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

    fn make_message(id: i64, group_id: i64, sender_id: i64) -> Message {
        let now = Utc::now();
        Message {
            id,
            group_id,
            sender_id,
            text: Some("hi".into()),
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

    #[tokio::test]
    async fn test_unknown_event_is_rejected() {
        let d = dispatcher(
            MockGroupRepository::new(),
            MockMessageRepository::new(),
            MockPresenceRegistry::new(),
            MockConnectionSink::new(),
        );

        let frame = d.dispatch("bogus", json!({}), &user_ctx(1)).await;
        assert_eq!(frame.event, "bogus_response");
        assert_eq!(frame.data["success"], false);
        assert!(frame.data["message"].as_str().unwrap().contains("bogus"));
    }

    #[tokio::test]
    async fn test_connect_registers_presence_for_anonymous() {
        let mut presence = MockPresenceRegistry::new();
        presence
            .expect_connect()
            .withf(|identity, handle| {
                identity == &Identity::Anonymous("203.0.113.9".into()) && handle == "sess-anon"
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let d = dispatcher(
            MockGroupRepository::new(),
            MockMessageRepository::new(),
            presence,
            MockConnectionSink::new(),
        );

        let frame = d.dispatch("connect", json!({}), &anon_ctx()).await;
        assert_eq!(frame.event, "connect_response");
        assert_eq!(frame.data["success"], true);
        assert_eq!(frame.data["data"]["identity"], "anon:203.0.113.9");
    }

    #[tokio::test]
    async fn test_send_message_requires_authentication() {
        let d = dispatcher(
            MockGroupRepository::new(),
            MockMessageRepository::new(),
            MockPresenceRegistry::new(),
            MockConnectionSink::new(),
        );

        let frame = d
            .dispatch("send_message", json!({"to_user": 2, "text": "hi"}), &anon_ctx())
            .await;
        assert_eq!(frame.data["success"], false);
        assert!(frame.data["message"]
            .as_str()
            .unwrap()
            .contains("authentication"));
    }

    // First direct message: the group does not exist yet, gets created
    // with both members, the message lands, and both members' live
    // connections receive the message event.
    #[tokio::test]
    async fn test_first_direct_message_creates_group_and_notifies_recipient() {
        let mut groups = MockGroupRepository::new();
        groups.expect_find_by_name().returning(|_| Ok(None));
        groups
            .expect_create_with_members()
            .withf(|group, members| group.name == "dm:1:2" && members == [1, 2])
            .times(1)
            .returning(|group, _| Ok(group.clone()));
        groups.expect_find_by_id().returning(|id| {
            Ok(Some(make_group(id, "dm:1:2", GroupKind::Direct)))
        });
        groups.expect_is_member().returning(|_, _| Ok(true));
        groups.expect_touch().returning(|_| Ok(()));
        groups.expect_members().returning(|_| Ok(vec![1, 2]));

        let mut messages = MockMessageRepository::new();
        messages
            .expect_create()
            .times(1)
            .returning(|m| Ok(m.clone()));

        let mut presence = MockPresenceRegistry::new();
        presence
            .expect_lookup()
            .with(eq(Identity::User(1)))
            .times(1)
            .returning(|_| Ok(Some("conn-1".into())));
        presence
            .expect_lookup()
            .with(eq(Identity::User(2)))
            .times(1)
            .returning(|_| Ok(Some("conn-2".into())));

        let mut sink = MockConnectionSink::new();
        sink.expect_deliver()
            .withf(|handle, event, payload| {
                (handle == "conn-1" || handle == "conn-2")
                    && event == "receive_message"
                    && payload["text"] == "hi"
            })
            .times(2)
            .returning(|_, _, _| true);

        let d = dispatcher(groups, messages, presence, sink);
        let frame = d
            .dispatch("send_message", json!({"to_user": 2, "text": "hi"}), &user_ctx(1))
            .await;

        assert_eq!(frame.event, "send_message_response");
        assert_eq!(frame.data["success"], true);
        assert_eq!(frame.data["data"]["text"], "hi");
    }

    // Offline recipient: the message still persists and the response is
    // still a success; offline is not an error.
    #[tokio::test]
    async fn test_send_message_succeeds_when_recipient_offline() {
        let mut groups = MockGroupRepository::new();
        let existing = make_group(10, "dm:1:2", GroupKind::Direct);
        groups
            .expect_find_by_name()
            .returning(move |_| Ok(Some(existing.clone())));
        groups.expect_find_by_id().returning(|id| {
            Ok(Some(make_group(id, "dm:1:2", GroupKind::Direct)))
        });
        groups.expect_is_member().returning(|_, _| Ok(true));
        groups.expect_touch().returning(|_| Ok(()));
        groups.expect_members().returning(|_| Ok(vec![1, 2]));

        let mut messages = MockMessageRepository::new();
        messages.expect_create().returning(|m| Ok(m.clone()));

        let mut presence = MockPresenceRegistry::new();
        presence.expect_lookup().returning(|_| Ok(None));

        let mut sink = MockConnectionSink::new();
        sink.expect_deliver().times(0);

        let d = dispatcher(groups, messages, presence, sink);
        let frame = d
            .dispatch("send_message", json!({"to_user": 2, "text": "hi"}), &user_ctx(1))
            .await;

        assert_eq!(frame.data["success"], true);
    }

    // A message each way lands in the same direct group; the second
    // send finds the canonical name instead of creating a twin.
    #[tokio::test]
    async fn test_reply_direction_reuses_the_same_group() {
        let mut groups = MockGroupRepository::new();
        let mut created = false;
        groups.expect_find_by_name().returning(move |name| {
            assert_eq!(name, "dm:1:2");
            if created {
                Ok(Some(make_group(10, "dm:1:2", GroupKind::Direct)))
            } else {
                created = true;
                Ok(None)
            }
        });
        groups
            .expect_create_with_members()
            .times(1)
            .returning(|group, _| Ok(group.clone()));
        groups.expect_find_by_id().returning(|id| {
            Ok(Some(make_group(id, "dm:1:2", GroupKind::Direct)))
        });
        groups.expect_is_member().returning(|_, _| Ok(true));
        groups.expect_touch().returning(|_| Ok(()));
        groups.expect_members().returning(|_| Ok(vec![1, 2]));

        let mut messages = MockMessageRepository::new();
        messages
            .expect_create()
            .times(2)
            .returning(|m| Ok(m.clone()));

        let mut presence = MockPresenceRegistry::new();
        presence.expect_lookup().returning(|_| Ok(None));

        let d = dispatcher(groups, messages, presence, MockConnectionSink::new());

        let first = d
            .dispatch("send_message", json!({"to_user": 2, "text": "hi"}), &user_ctx(1))
            .await;
        let second = d
            .dispatch("send_message", json!({"to_user": 1, "text": "hey"}), &user_ctx(2))
            .await;

        assert_eq!(first.data["success"], true);
        assert_eq!(second.data["success"], true);
    }

    #[tokio::test]
    async fn test_send_message_rejects_ambiguous_target() {
        let d = dispatcher(
            MockGroupRepository::new(),
            MockMessageRepository::new(),
            MockPresenceRegistry::new(),
            MockConnectionSink::new(),
        );

        let frame = d
            .dispatch(
                "send_message",
                json!({"to_user": 2, "group_id": 9, "text": "hi"}),
                &user_ctx(1),
            )
            .await;
        assert_eq!(frame.data["success"], false);
    }

    #[tokio::test]
    async fn test_infrastructure_failure_is_not_reported_as_offline() {
        let mut presence = MockPresenceRegistry::new();
        presence
            .expect_connect()
            .returning(|_, _| Err(ChatError::Infrastructure("redis refused".into())));

        let d = dispatcher(
            MockGroupRepository::new(),
            MockMessageRepository::new(),
            presence,
            MockConnectionSink::new(),
        );

        let frame = d.dispatch("connect", json!({}), &user_ctx(1)).await;
        assert_eq!(frame.data["success"], false);
        let message = frame.data["message"].as_str().unwrap();
        assert!(message.contains("retry"));
        assert!(!message.contains("redis"), "backend detail must not leak");
    }

    #[tokio::test]
    async fn test_typing_from_anonymous_connection_is_delivered() {
        let mut presence = MockPresenceRegistry::new();
        presence
            .expect_lookup()
            .with(eq(Identity::User(2)))
            .returning(|_| Ok(Some("conn-2".into())));

        let mut sink = MockConnectionSink::new();
        sink.expect_deliver()
            .withf(|handle, event, payload| {
                handle == "conn-2"
                    && event == "typing"
                    && payload["from"] == "anon:203.0.113.9"
            })
            .times(1)
            .returning(|_, _, _| true);

        let d = dispatcher(
            MockGroupRepository::new(),
            MockMessageRepository::new(),
            presence,
            sink,
        );

        let frame = d.dispatch("typing", json!({"to_user": 2}), &anon_ctx()).await;
        assert_eq!(frame.data["success"], true);
    }

    #[tokio::test]
    async fn test_fetch_messages_forbidden_for_non_member() {
        let mut groups = MockGroupRepository::new();
        groups.expect_find_by_id().returning(|id| {
            Ok(Some(make_group(id, "market-talk", GroupKind::MultiParty)))
        });
        groups.expect_members().returning(|_| Ok(vec![2, 3]));

        let d = dispatcher(
            groups,
            MockMessageRepository::new(),
            MockPresenceRegistry::new(),
            MockConnectionSink::new(),
        );

        let frame = d
            .dispatch("fetch_messages", json!({"group_id": 9}), &user_ctx(1))
            .await;
        assert_eq!(frame.data["success"], false);
        assert!(frame.data["message"].as_str().unwrap().contains("Forbidden"));
    }

    #[tokio::test]
    async fn test_fetch_messages_defaults_pagination() {
        let mut groups = MockGroupRepository::new();
        groups.expect_find_by_id().returning(|id| {
            Ok(Some(make_group(id, "market-talk", GroupKind::MultiParty)))
        });
        groups.expect_members().returning(|_| Ok(vec![1, 2]));

        let mut messages = MockMessageRepository::new();
        messages
            .expect_page_by_group()
            .with(eq(9), eq(0), eq(10))
            .times(1)
            .returning(|_, _, _| Ok(vec![make_message(2, 9, 2), make_message(1, 9, 1)]));

        let d = dispatcher(
            groups,
            messages,
            MockPresenceRegistry::new(),
            MockConnectionSink::new(),
        );

        let frame = d
            .dispatch("fetch_messages", json!({"group_id": 9}), &user_ctx(1))
            .await;
        assert_eq!(frame.data["success"], true);
        assert_eq!(frame.data["data"]["page"], 1);
        assert_eq!(frame.data["data"]["page_size"], 10);
        assert_eq!(frame.data["data"]["messages"][0]["id"], "2");
    }

    #[tokio::test]
    async fn test_mark_seen_notifies_the_sender() {
        let mut messages = MockMessageRepository::new();
        messages
            .expect_find_by_id()
            .returning(|id| Ok(Some(make_message(id, 9, 1))));
        messages.expect_mark_seen().returning(|id| {
            let mut m = make_message(id, 9, 1);
            m.seen = true;
            m.last_seen = Some(Utc::now());
            Ok(m)
        });

        let mut groups = MockGroupRepository::new();
        groups.expect_is_member().returning(|_, _| Ok(true));

        let mut presence = MockPresenceRegistry::new();
        presence
            .expect_lookup()
            .with(eq(Identity::User(1)))
            .times(1)
            .returning(|_| Ok(Some("conn-1".into())));

        let mut sink = MockConnectionSink::new();
        sink.expect_deliver()
            .withf(|handle, event, _| handle == "conn-1" && event == "message_seen")
            .times(1)
            .returning(|_, _, _| true);

        let d = dispatcher(groups, messages, presence, sink);
        let frame = d
            .dispatch("mark_seen", json!({"message_id": 5}), &user_ctx(2))
            .await;
        assert_eq!(frame.data["success"], true);
        assert_eq!(frame.data["data"]["seen"], true);
    }

    #[tokio::test]
    async fn test_add_member_requires_existing_membership() {
        let mut groups = MockGroupRepository::new();
        groups.expect_members().returning(|_| Ok(vec![2, 3]));
        groups.expect_add_member().times(0);

        let d = dispatcher(
            groups,
            MockMessageRepository::new(),
            MockPresenceRegistry::new(),
            MockConnectionSink::new(),
        );

        let frame = d
            .dispatch("add_member", json!({"group_id": 9, "user_id": 4}), &user_ctx(1))
            .await;
        assert_eq!(frame.data["success"], false);
    }
}
