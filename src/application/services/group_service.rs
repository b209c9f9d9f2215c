//! Group Service
//!
//! Resolves or creates the conversation a message belongs to.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

use crate::domain::{direct_group_name, Group, GroupKind, GroupRepository};
use crate::shared::error::ChatError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Group resolution and creation.
///
/// Direct-group creation is an insert-or-fetch: the canonical name's
/// UNIQUE constraint resolves concurrent first-message races, and the
/// resulting `Conflict` is consumed here by re-fetching. It never
/// reaches a caller.
pub struct GroupService<G>
where
    G: GroupRepository,
{
    group_repo: Arc<G>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<G> GroupService<G>
where
    G: GroupRepository,
{
    pub fn new(group_repo: Arc<G>, id_generator: Arc<SnowflakeGenerator>) -> Self {
        Self {
            group_repo,
            id_generator,
        }
    }

    /// Find or idempotently create the direct group for an unordered
    /// pair of members.
    pub async fn resolve_or_create_direct(&self, a: i64, b: i64) -> Result<Group, ChatError> {
        if a == b {
            return Err(ChatError::Validation(
                "a direct conversation needs two distinct members".into(),
            ));
        }

        let name = direct_group_name(a, b);

        if let Some(existing) = self.group_repo.find_by_name(&name).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let group = Group {
            id: self.id_generator.generate(),
            name: name.clone(),
            description: None,
            kind: GroupKind::Direct,
            created_at: now,
            updated_at: now,
        };

        match self.group_repo.create_with_members(&group, &[a, b]).await {
            Ok(created) => Ok(created),
            // Lost the creation race; the winner's group is the group.
            Err(ChatError::Conflict(_)) => {
                tracing::debug!(name = %name, "Direct group created concurrently, re-fetching");
                self.group_repo
                    .find_by_name(&name)
                    .await?
                    .ok_or_else(|| {
                        ChatError::Infrastructure(format!(
                            "group {} vanished after unique violation",
                            name
                        ))
                    })
            }
            Err(e) => Err(e),
        }
    }

    /// Look up a group by ID.
    pub async fn resolve_group(&self, id: i64) -> Result<Group, ChatError> {
        self.group_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("Group {} not found", id)))
    }

    /// Create a multi-party group. The creator is always a member even
    /// if omitted from the initial list; duplicates are collapsed.
    pub async fn create_multi_party(
        &self,
        creator: i64,
        name: &str,
        description: Option<String>,
        initial_members: &[i64],
    ) -> Result<Group, ChatError> {
        let mut seen = HashSet::new();
        let mut members: Vec<i64> = Vec::with_capacity(initial_members.len() + 1);
        for &id in std::iter::once(&creator).chain(initial_members) {
            if seen.insert(id) {
                members.push(id);
            }
        }

        let now = Utc::now();
        let group = Group {
            id: self.id_generator.generate(),
            name: name.to_string(),
            description,
            kind: GroupKind::MultiParty,
            created_at: now,
            updated_at: now,
        };

        match self.group_repo.create_with_members(&group, &members).await {
            Ok(created) => Ok(created),
            Err(ChatError::Conflict(_)) => Err(ChatError::Validation(format!(
                "a group named <{}> already exists",
                name
            ))),
            Err(e) => Err(e),
        }
    }

    /// Add a member to a multi-party group; no-op if already present.
    /// Direct groups are fixed at two members for their lifetime.
    pub async fn add_member(&self, group_id: i64, user_id: i64) -> Result<Group, ChatError> {
        let group = self.resolve_group(group_id).await?;

        if group.is_direct() {
            return Err(ChatError::Validation(
                "cannot add members to a direct conversation".into(),
            ));
        }

        self.group_repo.add_member(group_id, user_id).await?;
        Ok(group)
    }

    /// List the member identities of a group.
    pub async fn members(&self, group_id: i64) -> Result<Vec<i64>, ChatError> {
        self.group_repo.members(group_id).await
    }

    /// All groups the user belongs to.
    pub async fn groups_for_member(&self, user_id: i64) -> Result<Vec<Group>, ChatError> {
        self.group_repo.find_by_member(user_id).await
    }
}
