//! User service: registration, login and account lifecycle.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, instrument, warn};

use super::models::{
    ChangePasswordRequest, LoginOutcome, LoginRequest, RegisterRequest, UserInfo, UserProfile,
};
use super::repository::UserRepository;
use crate::crypto::{CryptoError, NoticeKey};
use crate::error::{ChatError, ChatResult};
use crate::message::MessageRelay;
use crate::session::SessionRegistry;

/// Logins and passwords must be longer than this many characters.
const MIN_CREDENTIAL_CHARS: usize = 3;

/// Service for user accounts and sessions.
#[derive(Debug, Clone)]
pub struct UserService {
    repo: UserRepository,
    registry: Arc<SessionRegistry>,
    relay: MessageRelay,
    bcrypt_cost: u32,
}

impl UserService {
    pub fn new(
        repo: UserRepository,
        registry: Arc<SessionRegistry>,
        relay: MessageRelay,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            repo,
            registry,
            relay,
            bcrypt_cost,
        }
    }

    /// Create an account.
    #[instrument(skip(self, request), fields(login = %request.login))]
    pub async fn register(&self, request: RegisterRequest) -> ChatResult<UserProfile> {
        let login = request.login.trim();
        if login.chars().count() <= MIN_CREDENTIAL_CHARS {
            return Err(ChatError::validation("login must be longer than 3 characters"));
        }
        if request.password.chars().count() <= MIN_CREDENTIAL_CHARS {
            return Err(ChatError::validation(
                "password must be longer than 3 characters",
            ));
        }
        let public_key = request.public_key.trim();
        NoticeKey::parse(public_key)?;

        if self.repo.is_login_in_use(login).await? {
            return Err(ChatError::conflict("login is already taken"));
        }
        if self.repo.is_public_key_in_use(public_key).await? {
            return Err(ChatError::conflict(
                "public key is already in use, generate a new one",
            ));
        }

        let hash = hash_password(request.password, self.bcrypt_cost).await?;
        let user = self.repo.create(login, &hash, public_key).await?;
        info!(user_id = %user.id, "Registered user {}", user.login);

        Ok(user.profile())
    }

    /// Verify credentials and start a session.
    ///
    /// Unknown logins, removed accounts and wrong passwords all fail the same
    /// way. A correct password with a different key is reported as a key
    /// problem.
    #[instrument(skip(self, request), fields(login = %request.login))]
    pub async fn login(&self, request: LoginRequest) -> ChatResult<LoginOutcome> {
        if request.login.is_empty() || request.password.is_empty() {
            return Err(ChatError::validation("login and password are required"));
        }
        let public_key = request.public_key.trim();
        NoticeKey::parse(public_key)?;

        let user = self
            .repo
            .get_active_by_login(request.login.trim())
            .await?
            .ok_or(ChatError::InvalidCredentials)?;

        if !verify_password(request.password, user.password.clone()).await? {
            return Err(ChatError::InvalidCredentials);
        }
        if user.public_key.trim() != public_key {
            return Err(CryptoError::InvalidKey("key does not match this account".to_string()).into());
        }

        let (token, expires_at) = self.registry.create_session(&user.id, &user.login);
        info!(user_id = %user.id, "User logged in");

        Ok(LoginOutcome {
            user: user.profile(),
            token,
            expires_at,
        })
    }

    /// End a session. Returns whether it existed.
    pub fn logout(&self, token: &str) -> bool {
        self.registry.logout(token)
    }

    /// Change the password after verifying the current one. New passwords of
    /// three characters or fewer are ignored.
    #[instrument(skip(self, request))]
    pub async fn change_password(
        &self,
        user_id: &str,
        request: ChangePasswordRequest,
    ) -> ChatResult<UserProfile> {
        if request.old_password.is_empty() || request.password.is_empty() {
            return Err(ChatError::validation(
                "current and new password are required",
            ));
        }
        let user = self
            .repo
            .get_active(user_id)
            .await?
            .ok_or_else(|| ChatError::not_found("user"))?;

        if !verify_password(request.old_password, user.password.clone()).await? {
            return Err(ChatError::InvalidCredentials);
        }

        if request.password.chars().count() > MIN_CREDENTIAL_CHARS {
            let hash = hash_password(request.password, self.bcrypt_cost).await?;
            self.repo.update_password(&user.id, &hash).await?;
            info!(user_id = %user.id, "Password changed");
        }

        Ok(user.profile())
    }

    /// Remove an account after verifying its password.
    ///
    /// Open-group memberships and their inbox rows go away, credentials are
    /// blanked and every session ends. Private conversations keep their
    /// history. Former groups receive a service notice.
    #[instrument(skip(self, password))]
    pub async fn remove(&self, user_id: &str, password: &str) -> ChatResult<()> {
        if password.is_empty() {
            return Err(ChatError::validation("password is required"));
        }
        let user = self
            .repo
            .get_active(user_id)
            .await?
            .ok_or_else(|| ChatError::not_found("user"))?;

        if !verify_password(password.to_string(), user.password.clone()).await? {
            return Err(ChatError::InvalidCredentials);
        }

        let groups = self.repo.remove_account(&user.id).await?;
        let expired = self.registry.expire_user(&user.id);
        info!(user_id = %user.id, sessions = expired, "Account removed");

        let notice = format!("User {} left the conversation.", user.login);
        for group in &groups {
            if let Err(e) = self.relay.broadcast_service_notice(group, &notice).await {
                warn!(group_id = %group.id, "Failed to notify group of removal: {}", e);
            }
        }

        Ok(())
    }

    /// Active users other than the actor, optionally filtered by login.
    #[instrument(skip(self))]
    pub async fn find(&self, actor_id: &str, query: Option<&str>) -> ChatResult<Vec<UserProfile>> {
        let query = query.map(str::trim).filter(|q| !q.is_empty());
        Ok(self.repo.find_active(actor_id, query).await?)
    }

    /// Identity of the caller; all nulls when anonymous or removed.
    #[instrument(skip(self))]
    pub async fn info(&self, user_id: Option<&str>) -> ChatResult<UserInfo> {
        let Some(user_id) = user_id else {
            return Ok(UserInfo::default());
        };
        Ok(self
            .repo
            .get_active(user_id)
            .await?
            .map(|user| user.profile().into())
            .unwrap_or_default())
    }
}

/// Hash a password with bcrypt off the async runtime.
async fn hash_password(password: String, cost: u32) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .context("Password hashing task failed")?
        .context("Failed to hash password")
}

/// Verify a password against a bcrypt hash. Malformed hashes never match.
async fn verify_password(password: String, hash: String) -> anyhow::Result<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .context("Password verification task failed")
}
