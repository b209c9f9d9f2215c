//! Data transfer objects: the envelope, inbound event payloads, and
//! outbound entity representations.

mod envelope;
mod events;
mod response;

pub use envelope::Envelope;
pub use events::{
    AddMemberPayload, CreateGroupPayload, EditMessagePayload, FetchInboxPayload,
    FetchMessagesPayload, MarkSeenPayload, RemoveMessagePayload, SendMessagePayload,
    TypingPayload,
};
pub use response::{GroupDto, MessageDto, MessagePageDto};
