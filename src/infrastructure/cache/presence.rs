//! Presence Registry
//!
//! Redis-backed mapping from user identity to the connection handle that
//! currently represents it. The registry is shared between server
//! processes; every mutation is a single atomic Redis command, never a
//! read-modify-write pair at the application layer.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::shared::error::ChatError;

use super::keys;

/// A user identity as the presence registry sees it.
///
/// Authenticated users key their entry by user ID. Connections without a
/// verified identity (presence/typing only) fall back to an identity
/// derived from their network address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    User(i64),
    Anonymous(String),
}

impl Identity {
    /// Stable key fragment for the presence store.
    pub fn key(&self) -> String {
        match self {
            Identity::User(id) => id.to_string(),
            Identity::Anonymous(addr) => format!("anon:{}", addr),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::User(_))
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Registry of which connection handle currently represents each identity.
///
/// Absence of an entry means "currently unreachable" and is never an
/// error; an unreachable backing store is `ChatError::Infrastructure`
/// and is never reported as offline.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PresenceRegistry: Send + Sync {
    /// Atomically associate an identity with a connection handle and
    /// set/refresh its TTL. Replaces any previous handle for the same
    /// identity, so a reconnect never leaves two live mappings.
    async fn connect(&self, identity: &Identity, handle: &str) -> Result<(), ChatError>;

    /// Remove the mapping; idempotent, absent entries are fine.
    async fn disconnect(&self, identity: &Identity) -> Result<(), ChatError>;

    /// Refresh the TTL on activity.
    async fn refresh(&self, identity: &Identity) -> Result<(), ChatError>;

    /// Pure read; `None` signals "currently unreachable".
    async fn lookup(&self, identity: &Identity) -> Result<Option<String>, ChatError>;

    /// Snapshot of all live identity-to-handle mappings, for
    /// diagnostics and fan-out enumeration.
    async fn active_connections(&self) -> Result<Vec<(String, String)>, ChatError>;
}

/// Redis implementation of the presence registry.
#[derive(Clone)]
pub struct RedisPresenceRegistry {
    redis: ConnectionManager,
    ttl_secs: u64,
}

impl RedisPresenceRegistry {
    /// Create a registry with the configured liveness window.
    pub fn new(redis: ConnectionManager, ttl_secs: u64) -> Self {
        Self { redis, ttl_secs }
    }

    fn key_for(identity: &Identity) -> String {
        format!("{}{}", keys::PRESENCE, identity.key())
    }
}

#[async_trait]
impl PresenceRegistry for RedisPresenceRegistry {
    async fn connect(&self, identity: &Identity, handle: &str) -> Result<(), ChatError> {
        let key = Self::key_for(identity);

        let mut conn = self.redis.clone();
        // SET .. EX is one atomic upsert: value and TTL land together.
        conn.set_ex::<_, _, ()>(&key, handle, self.ttl_secs).await?;

        tracing::debug!(identity = %identity, handle = %handle, "Presence registered");
        Ok(())
    }

    async fn disconnect(&self, identity: &Identity) -> Result<(), ChatError> {
        let key = Self::key_for(identity);

        let mut conn = self.redis.clone();
        let _: i64 = conn.del(&key).await?;

        tracing::debug!(identity = %identity, "Presence removed");
        Ok(())
    }

    async fn refresh(&self, identity: &Identity) -> Result<(), ChatError> {
        let key = Self::key_for(identity);

        let mut conn = self.redis.clone();
        let _: bool = conn.expire(&key, self.ttl_secs as i64).await?;

        Ok(())
    }

    async fn lookup(&self, identity: &Identity) -> Result<Option<String>, ChatError> {
        let key = Self::key_for(identity);

        let mut conn = self.redis.clone();
        let handle: Option<String> = conn.get(&key).await?;

        Ok(handle)
    }

    async fn active_connections(&self) -> Result<Vec<(String, String)>, ChatError> {
        let mut conn = self.redis.clone();

        let pattern = format!("{}*", keys::PRESENCE);
        let keys: Vec<String> = {
            let mut iter = conn.scan_match::<_, String>(&pattern).await?;
            let mut found = Vec::new();
            while let Some(key) = iter.next_item().await {
                found.push(key?);
            }
            found
        };

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            // Entry may expire between SCAN and GET; skip, not an error.
            if let Some(handle) = conn.get::<_, Option<String>>(&key).await? {
                let identity = key
                    .strip_prefix(keys::PRESENCE)
                    .unwrap_or(&key)
                    .to_string();
                entries.push((identity, handle));
            }
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_keys() {
        assert_eq!(Identity::User(42).key(), "42");
        assert_eq!(
            Identity::Anonymous("203.0.113.9".into()).key(),
            "anon:203.0.113.9"
        );
    }

    #[test]
    fn test_identity_authentication() {
        assert!(Identity::User(1).is_authenticated());
        assert!(!Identity::Anonymous("127.0.0.1".into()).is_authenticated());
    }
}
