//! Message repository.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::models::{Message, MessageKind, MessageRow};
use crate::db::timestamp_now;

const MESSAGE_ROW_SELECT: &str = r#"
    SELECT m.id, m."group" AS group_id, g.name AS group_name,
           m.from_user, u.login AS from_login, m.to_user,
           m.message, m.type, m.is_read, m.date
    FROM messages m
    JOIN groups g ON g.id = m."group"
    LEFT JOIN users u ON u.id = m.from_user
"#;

/// Repository for per-recipient message rows.
#[derive(Debug, Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn generate_id() -> String {
        format!("msg_{}", nanoid::nanoid!(16))
    }

    /// Store one delivery of a message. `from_user` is `None` for service
    /// messages.
    #[instrument(skip(self, body))]
    pub async fn insert(
        &self,
        group_id: &str,
        from_user: Option<&str>,
        to_user: &str,
        body: &str,
        kind: MessageKind,
    ) -> Result<Message> {
        let message = Message {
            id: Self::generate_id(),
            group_id: group_id.to_string(),
            from_user: from_user.map(str::to_string),
            to_user: to_user.to_string(),
            message: body.to_string(),
            kind,
            is_read: false,
            date: timestamp_now(),
        };

        sqlx::query(
            r#"
            INSERT INTO messages (id, "group", from_user, to_user, message, type, is_read, date)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.group_id)
        .bind(&message.from_user)
        .bind(&message.to_user)
        .bind(&message.message)
        .bind(message.kind)
        .bind(message.is_read)
        .bind(&message.date)
        .execute(&self.pool)
        .await
        .context("Failed to insert message")?;

        Ok(message)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<Message>> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, "group", from_user, to_user, message, type, is_read, date
            FROM messages WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch message")?;

        Ok(message)
    }

    /// Mark every row addressed to `user_id` in `group_id` up to and including
    /// `upto` as read. Returns the number of rows that changed.
    #[instrument(skip(self))]
    pub async fn mark_read(&self, user_id: &str, group_id: &str, upto: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET is_read = TRUE
            WHERE to_user = ? AND "group" = ? AND date <= ? AND is_read = FALSE
            "#,
        )
        .bind(user_id)
        .bind(group_id)
        .bind(upto)
        .execute(&self.pool)
        .await
        .context("Failed to mark messages as read")?;

        debug!("Marked {} message(s) read", result.rows_affected());
        Ok(result.rows_affected())
    }

    /// Newest `limit` rows addressed to `user_id` in `group_id`, newest first.
    #[instrument(skip(self))]
    pub(crate) async fn latest(
        &self,
        user_id: &str,
        group_id: &str,
        limit: i64,
    ) -> Result<Vec<MessageRow>> {
        let sql = format!(
            r#"{MESSAGE_ROW_SELECT}
            WHERE m.to_user = ? AND m."group" = ?
            ORDER BY m.date DESC
            LIMIT ?"#
        );
        let rows = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(user_id)
            .bind(group_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch latest messages")?;

        Ok(rows)
    }

    /// Newest `limit` rows strictly older than `before`, newest first.
    #[instrument(skip(self))]
    pub(crate) async fn before(
        &self,
        user_id: &str,
        group_id: &str,
        before: &str,
        limit: i64,
    ) -> Result<Vec<MessageRow>> {
        let sql = format!(
            r#"{MESSAGE_ROW_SELECT}
            WHERE m.to_user = ? AND m."group" = ? AND m.date < ?
            ORDER BY m.date DESC
            LIMIT ?"#
        );
        let rows = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(user_id)
            .bind(group_id)
            .bind(before)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch older messages")?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::group::{GroupKind, GroupRepository};
    use crate::user::UserRepository;

    async fn setup() -> (Database, MessageRepository, String, String, String) {
        let db = Database::in_memory().await.unwrap();
        let users = UserRepository::new(db.pool().clone());
        let groups = GroupRepository::new(db.pool().clone());
        let alice = users.create("alice", "h", "ka").await.unwrap().id;
        let bob = users.create("bob", "h", "kb").await.unwrap().id;
        let group = groups
            .create("team", GroupKind::Group, &[alice.as_str(), bob.as_str()])
            .await
            .unwrap()
            .id;
        let repo = MessageRepository::new(db.pool().clone());
        (db, repo, alice, bob, group)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let (_db, repo, alice, bob, group) = setup().await;

        let msg = repo
            .insert(&group, Some(&alice), &bob, "hello", MessageKind::Message)
            .await
            .unwrap();
        let fetched = repo.get(&msg.id).await.unwrap().unwrap();

        assert_eq!(fetched.group_id, group);
        assert_eq!(fetched.from_user.as_deref(), Some(alice.as_str()));
        assert_eq!(fetched.to_user, bob);
        assert_eq!(fetched.kind, MessageKind::Message);
        assert!(!fetched.is_read);
        assert_eq!(fetched.date, msg.date);
    }

    #[tokio::test]
    async fn test_rows_join_sender_login() {
        let (_db, repo, alice, bob, group) = setup().await;
        repo.insert(&group, Some(&alice), &bob, "hi", MessageKind::Message)
            .await
            .unwrap();
        repo.insert(&group, None, &bob, "notice", MessageKind::Service)
            .await
            .unwrap();

        let rows = repo.latest(&bob, &group, 25).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].kind, MessageKind::Service);
        assert!(rows[0].from_login.is_none());
        assert_eq!(rows[1].from_login.as_deref(), Some("alice"));
        assert_eq!(rows[1].group_name, "team");

        assert!(repo.latest(&alice, &group, 25).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_read_respects_cutoff() {
        let (_db, repo, alice, bob, group) = setup().await;
        let first = repo
            .insert(&group, Some(&alice), &bob, "1", MessageKind::Message)
            .await
            .unwrap();
        let second = repo
            .insert(&group, Some(&alice), &bob, "2", MessageKind::Message)
            .await
            .unwrap();

        assert_eq!(repo.mark_read(&bob, &group, &first.date).await.unwrap(), 1);
        assert!(repo.get(&first.id).await.unwrap().unwrap().is_read);
        assert!(!repo.get(&second.id).await.unwrap().unwrap().is_read);
    }
}
