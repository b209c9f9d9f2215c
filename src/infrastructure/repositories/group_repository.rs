//! Group Repository Implementation
//!
//! PostgreSQL implementation of group (conversation) operations.
//! Group creation inserts the group and its initial member set in one
//! transaction so a half-created group is never observable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Group, GroupKind, GroupRepository};
use crate::shared::error::ChatError;

/// PostgreSQL group repository implementation.
#[derive(Clone)]
pub struct PgGroupRepository {
    pool: PgPool,
}

impl PgGroupRepository {
    /// Creates a new PgGroupRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for group queries.
#[derive(Debug, sqlx::FromRow)]
struct GroupRow {
    id: i64,
    name: String,
    description: Option<String>,
    kind: String, // PostgreSQL enum maps to string
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupRow {
    /// Converts database row to domain Group entity.
    fn into_group(self) -> Group {
        Group {
            id: self.id,
            name: self.name,
            description: self.description,
            kind: GroupKind::from_str(&self.kind),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const GROUP_COLUMNS: &str = "id, name, description, kind::text as kind, created_at, updated_at";

#[async_trait]
impl GroupRepository for PgGroupRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Group>, ChatError> {
        let row = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {} FROM groups WHERE id = $1",
            GROUP_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_group()))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Group>, ChatError> {
        let row = sqlx::query_as::<_, GroupRow>(&format!(
            "SELECT {} FROM groups WHERE name = $1",
            GROUP_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_group()))
    }

    /// Insert the group row and its initial members atomically.
    ///
    /// A concurrent insert of the same name trips the UNIQUE constraint
    /// on `groups.name`; the resulting `ChatError::Conflict` is the
    /// signal for the caller's re-fetch branch.
    async fn create_with_members(
        &self,
        group: &Group,
        member_ids: &[i64],
    ) -> Result<Group, ChatError> {
        let mut tx = self.pool.begin().await.map_err(ChatError::from)?;

        let row = sqlx::query_as::<_, GroupRow>(&format!(
            r#"
            INSERT INTO groups (id, name, description, kind)
            VALUES ($1, $2, $3, $4::group_kind)
            RETURNING {}
            "#,
            GROUP_COLUMNS
        ))
        .bind(group.id)
        .bind(&group.name)
        .bind(&group.description)
        .bind(group.kind.as_str())
        .fetch_one(&mut *tx)
        .await?;

        for user_id in member_ids {
            sqlx::query(
                r#"
                INSERT INTO group_members (group_id, user_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(group.id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await.map_err(ChatError::from)?;

        Ok(row.into_group())
    }

    /// Idempotent membership insert; the composite primary key on
    /// (group_id, user_id) makes duplicates structurally impossible.
    async fn add_member(&self, group_id: i64, user_id: i64) -> Result<(), ChatError> {
        sqlx::query(
            r#"
            INSERT INTO group_members (group_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn members(&self, group_id: i64) -> Result<Vec<i64>, ChatError> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM group_members WHERE group_id = $1 ORDER BY user_id",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn is_member(&self, group_id: i64, user_id: i64) -> Result<bool, ChatError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM group_members WHERE group_id = $1 AND user_id = $2)",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn find_by_member(&self, user_id: i64) -> Result<Vec<Group>, ChatError> {
        let rows = sqlx::query_as::<_, GroupRow>(&format!(
            r#"
            SELECT {} FROM groups g
            JOIN group_members gm ON gm.group_id = g.id
            WHERE gm.user_id = $1
            ORDER BY g.updated_at DESC
            "#,
            GROUP_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_group()).collect())
    }

    async fn touch(&self, group_id: i64) -> Result<(), ChatError> {
        let result = sqlx::query("UPDATE groups SET updated_at = NOW() WHERE id = $1")
            .bind(group_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ChatError::NotFound(format!("Group {} not found", group_id)));
        }

        Ok(())
    }
}
