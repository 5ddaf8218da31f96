//! Group and membership repository.

use anyhow::{Context, Result};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, instrument};

use super::models::{Group, GroupKind, GroupListItem};
use crate::db::timestamp_now;
use crate::user::UserProfile;

/// Repository for groups and the `user_groups` membership table.
#[derive(Debug, Clone)]
pub struct GroupRepository {
    pool: SqlitePool,
}

impl GroupRepository {
    /// Create a new group repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Generate a new group ID.
    fn generate_id() -> String {
        format!("grp_{}", nanoid::nanoid!(12))
    }

    /// Create a group with the given members.
    #[instrument(skip(self))]
    pub async fn create(&self, name: &str, kind: GroupKind, members: &[&str]) -> Result<Group> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin group creation")?;
        let group = Self::create_in(&mut *tx, name, kind, members).await?;
        tx.commit()
            .await
            .context("Failed to commit group creation")?;
        Ok(group)
    }

    /// Create a group with the given members on an open connection.
    pub(crate) async fn create_in(
        conn: &mut SqliteConnection,
        name: &str,
        kind: GroupKind,
        members: &[&str],
    ) -> Result<Group> {
        let group = Group {
            id: Self::generate_id(),
            name: name.to_string(),
            kind,
            last_message: timestamp_now(),
        };
        debug!("Creating {} group {} ({})", kind, group.name, group.id);

        sqlx::query("INSERT INTO groups (id, name, type, last_message) VALUES (?, ?, ?, ?)")
            .bind(&group.id)
            .bind(&group.name)
            .bind(group.kind)
            .bind(&group.last_message)
            .execute(&mut *conn)
            .await
            .context("Failed to insert group")?;

        for member in members {
            sqlx::query("INSERT INTO user_groups (user_id, group_id) VALUES (?, ?)")
                .bind(*member)
                .bind(&group.id)
                .execute(&mut *conn)
                .await
                .context("Failed to insert membership")?;
        }

        Ok(group)
    }

    /// Get a group by ID.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<Group>> {
        let group = sqlx::query_as::<_, Group>(
            "SELECT id, name, type, last_message FROM groups WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch group")?;

        Ok(group)
    }

    /// Rename a group.
    #[instrument(skip(self))]
    pub async fn rename(&self, id: &str, name: &str) -> Result<()> {
        sqlx::query("UPDATE groups SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to rename group")?;

        Ok(())
    }

    /// Record activity in a group.
    #[instrument(skip(self))]
    pub async fn touch(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE groups SET last_message = ? WHERE id = ?")
            .bind(timestamp_now())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update group activity")?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn is_member(&self, user_id: &str, group_id: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_groups WHERE user_id = ? AND group_id = ?",
        )
        .bind(user_id)
        .bind(group_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check membership")?;

        Ok(count > 0)
    }

    /// IDs of every member, removed accounts included.
    #[instrument(skip(self))]
    pub async fn member_ids(&self, group_id: &str) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM user_groups WHERE group_id = ? ORDER BY user_id",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list group members")?;

        Ok(ids)
    }

    /// Members with a usable account.
    #[instrument(skip(self))]
    pub async fn active_members(&self, group_id: &str) -> Result<Vec<UserProfile>> {
        let users = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT u.id, u.login, u.public_key
            FROM user_groups ug
            JOIN users u ON u.id = ug.user_id
            WHERE ug.group_id = ? AND u.password != '' AND u.public_key != ''
            ORDER BY u.login
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list active group members")?;

        Ok(users)
    }

    /// Login of the member of `group_id` other than `user_id`.
    #[instrument(skip(self))]
    pub async fn other_member_login(&self, group_id: &str, user_id: &str) -> Result<Option<String>> {
        let login = sqlx::query_scalar::<_, String>(
            r#"
            SELECT u.login
            FROM users u
            JOIN user_groups ug ON ug.user_id = u.id
            WHERE ug.group_id = ? AND ug.user_id != ?
            LIMIT 1
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch other member login")?;

        Ok(login)
    }

    #[instrument(skip(self))]
    pub async fn add_member(&self, user_id: &str, group_id: &str) -> Result<()> {
        sqlx::query("INSERT INTO user_groups (user_id, group_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(group_id)
            .execute(&self.pool)
            .await
            .context("Failed to add group member")?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_member(&self, user_id: &str, group_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_groups WHERE user_id = ? AND group_id = ?")
            .bind(user_id)
            .bind(group_id)
            .execute(&self.pool)
            .await
            .context("Failed to remove group member")?;

        Ok(result.rows_affected() > 0)
    }

    /// The private group whose membership rows for the pair number exactly
    /// two, if any.
    pub(crate) async fn find_private_between(
        conn: &mut SqliteConnection,
        a: &str,
        b: &str,
    ) -> Result<Option<Group>> {
        let group = sqlx::query_as::<_, Group>(
            r#"
            SELECT id, name, type, last_message
            FROM groups
            WHERE type = ?
              AND id IN (
                SELECT group_id FROM user_groups
                WHERE user_id IN (?, ?)
                GROUP BY group_id
                HAVING COUNT(*) = 2
              )
            ORDER BY last_message
            LIMIT 1
            "#,
        )
        .bind(GroupKind::Private)
        .bind(a)
        .bind(b)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to look up private group")?;

        Ok(group)
    }

    /// Groups of a user, most recently active first, with raw names and
    /// unread counts.
    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<GroupListItem>> {
        let rows = sqlx::query_as::<_, (String, String, GroupKind, i64)>(
            r#"
            SELECT g.id, g.name, g.type,
                   (SELECT COUNT(*) FROM messages m
                    WHERE m."group" = g.id AND m.to_user = ug.user_id AND m.is_read = FALSE)
            FROM user_groups ug
            JOIN groups g ON g.id = ug.group_id
            WHERE ug.user_id = ?
            ORDER BY g.last_message DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list groups of user")?;

        Ok(rows
            .into_iter()
            .map(|(id, name, kind, new_messages)| GroupListItem {
                id,
                name,
                kind,
                new_messages,
            })
            .collect())
    }
}
