//! Application services: conversation resolution, message persistence,
//! and delivery routing.

mod group_service;
mod message_service;
mod notification;

pub use group_service::GroupService;
pub use message_service::{MessageDraft, MessageService};
pub use notification::{ConnectionSink, Delivery, DeliveryReport, NotificationRouter};

#[cfg(test)]
pub use notification::MockConnectionSink;
