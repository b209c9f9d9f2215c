//! Notification Router
//!
//! Delivers events to the live connections of online recipients.
//! An offline recipient is a normal outcome, not a failure; delivery is
//! fire-and-forget and never gates the operation that triggered it.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::GroupRepository;
use crate::infrastructure::cache::{Identity, PresenceRegistry};
use crate::shared::error::ChatError;

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Offline,
}

/// Aggregated outcome of a group fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub offline: usize,
}

impl DeliveryReport {
    fn record(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Sent => self.sent += 1,
            Delivery::Offline => self.offline += 1,
        }
    }
}

/// Local delivery surface: pushes a frame onto one connection's
/// outbound queue. Returns false when the handle no longer maps to a
/// live connection on this process.
#[cfg_attr(test, mockall::automock)]
pub trait ConnectionSink: Send + Sync {
    fn deliver(&self, handle: &str, event: &str, payload: &Value) -> bool;
}

/// Routes events to users and groups via the presence registry.
pub struct NotificationRouter<P, S, G>
where
    P: PresenceRegistry,
    S: ConnectionSink,
    G: GroupRepository,
{
    presence: Arc<P>,
    sink: Arc<S>,
    group_repo: Arc<G>,
}

impl<P, S, G> NotificationRouter<P, S, G>
where
    P: PresenceRegistry,
    S: ConnectionSink,
    G: GroupRepository,
{
    pub fn new(presence: Arc<P>, sink: Arc<S>, group_repo: Arc<G>) -> Self {
        Self {
            presence,
            sink,
            group_repo,
        }
    }

    /// Deliver an event to one identity's live connection, if any.
    ///
    /// A missing presence entry or a stale handle is `Offline`. An
    /// unreachable registry is an `Infrastructure` error and propagates;
    /// it must not masquerade as the recipient being away.
    pub async fn notify_identity(
        &self,
        identity: &Identity,
        event: &str,
        payload: &Value,
    ) -> Result<Delivery, ChatError> {
        let Some(handle) = self.presence.lookup(identity).await? else {
            tracing::debug!(identity = %identity, event = %event, "Recipient offline");
            return Ok(Delivery::Offline);
        };

        // The presence entry can outlive the socket briefly; a dead
        // handle counts as offline.
        if self.sink.deliver(&handle, event, payload) {
            Ok(Delivery::Sent)
        } else {
            tracing::debug!(
                identity = %identity,
                handle = %handle,
                event = %event,
                "Presence entry points at a dead connection"
            );
            Ok(Delivery::Offline)
        }
    }

    /// Deliver an event to one user's live connection, if any.
    pub async fn notify_user(
        &self,
        user_id: i64,
        event: &str,
        payload: &Value,
    ) -> Result<Delivery, ChatError> {
        self.notify_identity(&Identity::User(user_id), event, payload)
            .await
    }

    /// Fan an event out to every group member except the ones listed in
    /// `exclude` (typically the sender, who gets a response envelope
    /// instead). Each recipient is attempted independently.
    pub async fn notify_group(
        &self,
        group_id: i64,
        exclude: &[i64],
        event: &str,
        payload: &Value,
    ) -> Result<DeliveryReport, ChatError> {
        let members = self.group_repo.members(group_id).await?;

        let mut report = DeliveryReport::default();
        for member in members {
            if exclude.contains(&member) {
                continue;
            }
            match self.notify_user(member, event, payload).await {
                Ok(delivery) => report.record(delivery),
                // One recipient's lookup failing must not stop the rest.
                Err(e) => {
                    tracing::warn!(
                        group_id = %group_id,
                        member = %member,
                        event = %event,
                        error = %e,
                        "Delivery attempt failed, continuing fan-out"
                    );
                    report.record(Delivery::Offline);
                }
            }
        }

        tracing::debug!(
            group_id = %group_id,
            event = %event,
            sent = report.sent,
            offline = report.offline,
            "Group fan-out complete"
        );
        Ok(report)
    }
}
