//! Group (conversation) entity and repository trait.
//!
//! Maps to the `groups` and `group_members` tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::ChatError;

/// Conversation kinds matching the PostgreSQL ENUM `group_kind`.
///
/// The kind is an explicit tag, not inferred from membership count:
/// the two variants carry different invariants.
///
/// Database definition:
/// ```sql
/// CREATE TYPE group_kind AS ENUM (
///     'direct',      -- exactly two fixed members, canonical name
///     'multi_party'  -- grower-only member set, user-supplied name
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    /// A conversation between exactly two fixed members.
    Direct,
    /// A conversation whose member set grows by explicit add.
    MultiParty,
}

impl GroupKind {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s {
            "direct" => Self::Direct,
            _ => Self::MultiParty,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::MultiParty => "multi_party",
        }
    }
}

impl std::fmt::Display for GroupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical natural key for a direct group.
///
/// Derived from the sorted member pair so that `(a, b)` and `(b, a)`
/// name the same group. The UNIQUE constraint on `groups.name` makes
/// this key the arbiter of concurrent first-message races.
pub fn direct_group_name(a: i64, b: i64) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("dm:{}:{}", lo, hi)
}

/// Represents a conversation.
///
/// Maps to the `groups` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - name: VARCHAR(100) UNIQUE NOT NULL
/// - description: TEXT NULL
/// - kind: group_kind NOT NULL
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// - updated_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
///
/// `updated_at` doubles as the "last activity" marker: persisting a
/// message bumps it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Unique name; canonical `dm:{min}:{max}` for direct groups,
    /// user-supplied for multi-party groups
    pub name: String,

    /// Optional description
    pub description: Option<String>,

    /// Conversation kind
    pub kind: GroupKind,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub updated_at: DateTime<Utc>,
}

impl Group {
    /// Direct groups are fixed at two members for their lifetime.
    pub fn is_direct(&self) -> bool {
        self.kind == GroupKind::Direct
    }
}

/// Repository trait for Group data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Find a group by its Snowflake ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<Group>, ChatError>;

    /// Find a group by its unique name (canonical-key lookup for
    /// direct groups).
    async fn find_by_name(&self, name: &str) -> Result<Option<Group>, ChatError>;

    /// Create a group together with its initial member set, in one
    /// transaction. A unique violation on the name surfaces as
    /// `ChatError::Conflict` for the caller to resolve by re-fetch.
    async fn create_with_members(
        &self,
        group: &Group,
        member_ids: &[i64],
    ) -> Result<Group, ChatError>;

    /// Add a member; no-op if already present.
    async fn add_member(&self, group_id: i64, user_id: i64) -> Result<(), ChatError>;

    /// List member identities of a group.
    async fn members(&self, group_id: i64) -> Result<Vec<i64>, ChatError>;

    /// Check membership.
    async fn is_member(&self, group_id: i64, user_id: i64) -> Result<bool, ChatError>;

    /// List all groups a user belongs to.
    async fn find_by_member(&self, user_id: i64) -> Result<Vec<Group>, ChatError>;

    /// Bump the group's last-activity timestamp.
    async fn touch(&self, group_id: i64) -> Result<(), ChatError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_group_name_is_order_independent() {
        assert_eq!(direct_group_name(42, 7), direct_group_name(7, 42));
        assert_eq!(direct_group_name(7, 42), "dm:7:42");
    }

    #[test]
    fn test_group_kind_roundtrip() {
        assert_eq!(GroupKind::from_str("direct"), GroupKind::Direct);
        assert_eq!(GroupKind::from_str("multi_party"), GroupKind::MultiParty);
        assert_eq!(GroupKind::Direct.as_str(), "direct");
        assert_eq!(GroupKind::MultiParty.as_str(), "multi_party");
    }
}
