//! User repository for database operations.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use super::models::{User, UserProfile};
use crate::error::{ChatError, ChatResult};
use crate::group::Group;

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Generate a new user ID.
    fn generate_id() -> String {
        format!("usr_{}", nanoid::nanoid!(12))
    }

    /// Create a new user. `password` must already be hashed.
    ///
    /// Fails with `Conflict` when an active account already holds the login
    /// or the public key.
    #[instrument(skip(self, password, public_key))]
    pub async fn create(&self, login: &str, password: &str, public_key: &str) -> ChatResult<User> {
        let id = Self::generate_id();
        debug!("Creating user: {} ({})", login, id);

        let inserted =
            sqlx::query("INSERT INTO users (id, login, password, public_key) VALUES (?, ?, ?, ?)")
                .bind(&id)
                .bind(login)
                .bind(password)
                .bind(public_key)
                .execute(&self.pool)
                .await;

        match inserted {
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(ChatError::conflict("login or public key is already in use"));
            }
            other => {
                other.context("Failed to insert user")?;
            }
        }

        let user = self
            .get(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after creation"))?;
        Ok(user)
    }

    /// Get a user by ID, including removed accounts.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, login, password, public_key FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user")?;

        Ok(user)
    }

    /// Get an active user by ID.
    #[instrument(skip(self))]
    pub async fn get_active(&self, id: &str) -> Result<Option<User>> {
        Ok(self.get(id).await?.filter(User::is_active))
    }

    /// Get the active user holding `login`.
    #[instrument(skip(self))]
    pub async fn get_active_by_login(&self, login: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, login, password, public_key
            FROM users
            WHERE login = ? AND password != '' AND public_key != ''
            LIMIT 1
            "#,
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by login")?;

        Ok(user)
    }

    /// Whether an active account already uses `login`.
    #[instrument(skip(self))]
    pub async fn is_login_in_use(&self, login: &str) -> Result<bool> {
        Ok(self.get_active_by_login(login).await?.is_some())
    }

    /// Whether an active account already uses `public_key`.
    #[instrument(skip(self, public_key))]
    pub async fn is_public_key_in_use(&self, public_key: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE public_key = ? AND password != '' AND public_key != ''",
        )
        .bind(public_key)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check public key usage")?;

        Ok(count > 0)
    }

    /// Replace a user's password hash.
    #[instrument(skip(self, password))]
    pub async fn update_password(&self, id: &str, password: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password = ? WHERE id = ?")
            .bind(password)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update password")?;

        Ok(())
    }

    /// Active users other than `exclude_id`, optionally filtered by a
    /// case-insensitive login substring.
    #[instrument(skip(self))]
    pub async fn find_active(
        &self,
        exclude_id: &str,
        login_filter: Option<&str>,
    ) -> Result<Vec<UserProfile>> {
        let pattern = like_pattern(login_filter.unwrap_or(""));

        let users = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, login, public_key
            FROM users
            WHERE id != ?
              AND password != '' AND public_key != ''
              AND LOWER(login) LIKE LOWER(?) ESCAPE '\'
            ORDER BY login
            "#,
        )
        .bind(exclude_id)
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await
        .context("Failed to find users")?;

        Ok(users)
    }

    /// Active users outside `group_id` whose login contains `query`.
    #[instrument(skip(self))]
    pub async fn find_active_outside_group(
        &self,
        group_id: &str,
        query: &str,
    ) -> Result<Vec<UserProfile>> {
        let pattern = like_pattern(query);

        let users = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, login, public_key
            FROM users
            WHERE id NOT IN (SELECT user_id FROM user_groups WHERE group_id = ?)
              AND password != '' AND public_key != ''
              AND LOWER(login) LIKE LOWER(?) ESCAPE '\'
            ORDER BY login
            "#,
        )
        .bind(group_id)
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await
        .context("Failed to find users outside group")?;

        Ok(users)
    }

    /// Remove an account in one transaction.
    ///
    /// Drops the user's non-private memberships and the inbox rows in those
    /// groups, then blanks the credentials. Private memberships and history
    /// stay. Returns every group the user belonged to beforehand.
    #[instrument(skip(self))]
    pub async fn remove_account(&self, id: &str) -> Result<Vec<Group>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin account removal")?;

        let groups = sqlx::query_as::<_, Group>(
            r#"
            SELECT g.id, g.name, g.type, g.last_message
            FROM groups g
            JOIN user_groups ug ON ug.group_id = g.id
            WHERE ug.user_id = ?
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .context("Failed to list groups of removed user")?;

        sqlx::query(
            r#"
            DELETE FROM messages
            WHERE to_user = ?
              AND "group" IN (
                SELECT ug.group_id FROM user_groups ug
                JOIN groups g ON g.id = ug.group_id
                WHERE ug.user_id = ? AND g.type != 'private'
              )
            "#,
        )
        .bind(id)
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete inbox of removed user")?;

        sqlx::query(
            r#"
            DELETE FROM user_groups
            WHERE user_id = ?
              AND group_id IN (SELECT id FROM groups WHERE type != 'private')
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete memberships of removed user")?;

        sqlx::query("UPDATE users SET password = '', public_key = '' WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to blank credentials of removed user")?;

        tx.commit()
            .await
            .context("Failed to commit account removal")?;

        debug!("Removed account {} ({} groups)", id, groups.len());
        Ok(groups)
    }
}

/// Build a `LIKE` pattern matching `query` as a literal substring.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup_test_db() -> (Database, UserRepository) {
        let db = Database::in_memory().await.unwrap();
        let repo = UserRepository::new(db.pool().clone());
        (db, repo)
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(""), "%%");
        assert_eq!(like_pattern("al"), "%al%");
        assert_eq!(like_pattern("a_b%"), "%a\\_b\\%%");
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let (_db, repo) = setup_test_db().await;

        let user = repo.create("alice", "hash", "key-a").await.unwrap();
        assert!(user.id.starts_with("usr_"));
        assert_eq!(user.login, "alice");
        assert!(user.is_active());

        let fetched = repo.get(&user.id).await.unwrap().unwrap();
        assert_eq!(fetched.login, "alice");

        let by_login = repo.get_active_by_login("alice").await.unwrap().unwrap();
        assert_eq!(by_login.id, user.id);
        assert!(repo.get_active_by_login("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_usage_checks_ignore_removed_accounts() {
        let (_db, repo) = setup_test_db().await;
        let user = repo.create("alice", "hash", "key-a").await.unwrap();

        assert!(repo.is_login_in_use("alice").await.unwrap());
        assert!(repo.is_public_key_in_use("key-a").await.unwrap());

        repo.remove_account(&user.id).await.unwrap();

        assert!(!repo.is_login_in_use("alice").await.unwrap());
        assert!(!repo.is_public_key_in_use("key-a").await.unwrap());
        assert!(repo.get_active(&user.id).await.unwrap().is_none());
        assert!(repo.get(&user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_rejects_active_duplicates() {
        let (_db, repo) = setup_test_db().await;
        let alice = repo.create("alice", "hash", "key-a").await.unwrap();

        let err = repo.create("alice", "hash", "key-b").await.unwrap_err();
        assert!(matches!(err, ChatError::Conflict(_)));
        let err = repo.create("alfred", "hash", "key-a").await.unwrap_err();
        assert!(matches!(err, ChatError::Conflict(_)));

        repo.remove_account(&alice.id).await.unwrap();
        let again = repo.create("alice", "hash", "key-a").await.unwrap();
        assert_ne!(again.id, alice.id);
    }

    #[tokio::test]
    async fn test_find_active_filters_case_insensitively() {
        let (_db, repo) = setup_test_db().await;
        let alice = repo.create("Alice", "hash", "key-a").await.unwrap();
        repo.create("albert", "hash", "key-b").await.unwrap();
        repo.create("bob", "hash", "key-c").await.unwrap();

        let found = repo.find_active(&alice.id, Some("AL")).await.unwrap();
        let logins: Vec<_> = found.iter().map(|u| u.login.as_str()).collect();
        assert_eq!(logins, vec!["albert"]);

        let all = repo.find_active(&alice.id, None).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_update_password() {
        let (_db, repo) = setup_test_db().await;
        let user = repo.create("alice", "old", "key-a").await.unwrap();

        repo.update_password(&user.id, "new").await.unwrap();
        let fetched = repo.get(&user.id).await.unwrap().unwrap();
        assert_eq!(fetched.password, "new");
    }
}
