//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::Database;
use crate::group::{GroupRepository, GroupService, MembershipResolver};
use crate::message::{MessageRelay, MessageRepository};
use crate::session::SessionRegistry;
use crate::user::{UserRepository, UserService};
use crate::ws::Broadcaster;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub broadcaster: Broadcaster,
    pub resolver: MembershipResolver,
    pub relay: MessageRelay,
    pub users: UserService,
    pub groups: GroupService,
    /// Append `Secure` to the session cookie.
    pub secure_cookie: bool,
}

impl AppState {
    /// Wire every service over one database and a fresh session registry.
    pub fn new(db: &Database, config: &AppConfig) -> Self {
        let registry = Arc::new(SessionRegistry::new(config.session_lifetime()));
        let broadcaster = Broadcaster::new(registry.clone());

        let user_repo = UserRepository::new(db.pool().clone());
        let group_repo = GroupRepository::new(db.pool().clone());
        let message_repo = MessageRepository::new(db.pool().clone());

        let resolver = MembershipResolver::new(group_repo.clone());
        let relay = MessageRelay::new(
            message_repo,
            group_repo.clone(),
            user_repo.clone(),
            resolver.clone(),
            broadcaster.clone(),
        );
        let users = UserService::new(
            user_repo.clone(),
            registry.clone(),
            relay.clone(),
            config.auth.bcrypt_cost,
        );
        let groups = GroupService::new(
            group_repo,
            user_repo,
            resolver.clone(),
            relay.clone(),
            broadcaster.clone(),
        );

        Self {
            registry,
            broadcaster,
            resolver,
            relay,
            users,
            groups,
            secure_cookie: config.auth.secure_cookie,
        }
    }

    /// `Set-Cookie` value carrying a session token.
    pub fn session_cookie(&self, token: &str) -> String {
        let secure = if self.secure_cookie { " Secure;" } else { "" };
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax;{} Max-Age={}",
            crate::auth::SESSION_COOKIE,
            token,
            secure,
            self.registry.lifetime().num_seconds()
        )
    }

    /// `Set-Cookie` value that clears the session cookie.
    pub fn cleared_session_cookie(&self) -> String {
        format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
            crate::auth::SESSION_COOKIE
        )
    }
}
