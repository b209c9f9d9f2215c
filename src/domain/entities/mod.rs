//! Domain entities and repository traits.

mod group;
mod message;

pub use group::{direct_group_name, Group, GroupKind, GroupRepository};
pub use message::{DeleteSide, Message, MessageRepository};

#[cfg(test)]
pub use group::MockGroupRepository;
#[cfg(test)]
pub use message::MockMessageRepository;
