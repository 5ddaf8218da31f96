//! Process-wide table of authenticated sessions and their live connections.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use log::{debug, info};
use rand::RngCore;

use super::models::{Session, SessionInfo};
use crate::ws::{ConnectionHandle, ConnectionId};

/// Default session lifetime (three hours).
pub const DEFAULT_SESSION_LIFETIME_SECS: i64 = 3 * 60 * 60;

/// Number of random bytes in a session token.
const TOKEN_BYTES: usize = 32;

/// Session registry.
///
/// Sessions are keyed by token, with a secondary index from user id to that
/// user's tokens. Expired sessions are evicted whenever they are touched, so
/// an expired session is never reported as valid even if no sweep has run.
/// DashMap guards are always released before another entry is touched.
#[derive(Debug)]
pub struct SessionRegistry {
    /// Token -> session
    sessions: DashMap<String, Session>,

    /// User ID -> tokens of that user's sessions
    by_user: DashMap<String, Vec<String>>,

    lifetime: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_SESSION_LIFETIME_SECS))
    }
}

impl SessionRegistry {
    /// Create a registry whose sessions live for `lifetime`.
    pub fn new(lifetime: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            by_user: DashMap::new(),
            lifetime,
        }
    }

    /// Session lifetime.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Start a new session for a user. Returns the token and its expiry.
    pub fn create_session(&self, user_id: &str, login: &str) -> (String, DateTime<Utc>) {
        let token = generate_token();
        let created_at = Utc::now();
        let expires_at = created_at + self.lifetime;

        self.sessions.insert(
            token.clone(),
            Session {
                token: token.clone(),
                user_id: user_id.to_string(),
                login: login.to_string(),
                created_at,
                expires_at,
                connections: Vec::new(),
            },
        );
        self.by_user
            .entry(user_id.to_string())
            .or_default()
            .push(token.clone());

        info!("Created session for user {}", user_id);
        (token, expires_at)
    }

    /// Attach a live connection to the session identified by `token`.
    ///
    /// Returns false if the token is unknown or expired; the caller should
    /// close the connection.
    pub fn attach_connection(&self, token: &str, handle: Arc<dyn ConnectionHandle>) -> bool {
        let now = Utc::now();
        let conn_id = handle.id();

        let expired = match self.sessions.get_mut(token) {
            None => return false,
            Some(session) if session.is_expired_at(now) => true,
            Some(mut session) => {
                session.prune_closed();
                session.connections.push(handle);
                debug!(
                    "Attached connection {} to session of user {} ({} open)",
                    conn_id,
                    session.user_id,
                    session.connections.len()
                );
                false
            }
        };

        if expired {
            self.remove_session(token);
            return false;
        }
        true
    }

    /// Detach a connection, drop any closed handles and sweep the expired
    /// sessions of the same user.
    pub fn detach_connection(&self, token: &str, connection_id: ConnectionId) {
        let user_id = {
            let Some(mut session) = self.sessions.get_mut(token) else {
                return;
            };
            session
                .connections
                .retain(|conn| conn.id() != connection_id && conn.is_open());
            debug!(
                "Detached connection {} from session of user {} ({} open)",
                connection_id,
                session.user_id,
                session.connections.len()
            );
            session.user_id.clone()
        };

        self.sweep_user(&user_id);
    }

    /// Look up a session by token.
    pub fn find_by_token(&self, token: &str) -> Option<SessionInfo> {
        let now = Utc::now();

        match self.sessions.get(token) {
            None => return None,
            Some(session) if !session.is_expired_at(now) => return Some(session.info()),
            Some(_) => {}
        }

        self.remove_session(token);
        None
    }

    /// Most recently created live session of a user.
    pub fn find_by_user_id(&self, user_id: &str) -> Option<SessionInfo> {
        self.user_tokens(user_id)
            .iter()
            .filter_map(|token| self.find_by_token(token))
            .max_by_key(|info| info.created_at)
    }

    /// Open connection handles across all live sessions of a user.
    pub fn open_connections(&self, user_id: &str) -> Vec<Arc<dyn ConnectionHandle>> {
        let now = Utc::now();
        let mut handles = Vec::new();
        let mut expired = Vec::new();

        for token in self.user_tokens(user_id) {
            let Some(session) = self.sessions.get(&token) else {
                continue;
            };
            if session.is_expired_at(now) {
                expired.push(token.clone());
                continue;
            }
            handles.extend(
                session
                    .connections
                    .iter()
                    .filter(|conn| conn.is_open())
                    .cloned(),
            );
        }

        for token in expired {
            self.remove_session(&token);
        }
        handles
    }

    /// End a session immediately. Returns whether it existed.
    pub fn logout(&self, token: &str) -> bool {
        let removed = self.remove_session(token);
        if removed {
            info!("Session logged out");
        }
        removed
    }

    /// End every session of a user. Returns how many were removed.
    pub fn expire_user(&self, user_id: &str) -> usize {
        let removed = self
            .user_tokens(user_id)
            .iter()
            .filter(|token| self.remove_session(token))
            .count();
        if removed > 0 {
            info!("Expired {} session(s) of user {}", removed, user_id);
        }
        removed
    }

    /// Remove every expired session and prune closed handles from the rest.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut expired = Vec::new();

        for mut entry in self.sessions.iter_mut() {
            if entry.is_expired_at(now) {
                expired.push(entry.key().clone());
            } else {
                entry.prune_closed();
            }
        }

        let removed = expired
            .iter()
            .filter(|token| self.remove_session(token))
            .count();
        if removed > 0 {
            debug!("Swept {} expired session(s)", removed);
        }
        removed
    }

    /// Remove the expired sessions of one user and prune closed handles from
    /// the rest.
    fn sweep_user(&self, user_id: &str) -> usize {
        let now = Utc::now();
        let mut expired = Vec::new();

        for token in self.user_tokens(user_id) {
            let Some(mut session) = self.sessions.get_mut(&token) else {
                continue;
            };
            if session.is_expired_at(now) {
                expired.push(token.clone());
            } else {
                session.prune_closed();
            }
        }

        expired
            .iter()
            .filter(|token| self.remove_session(token))
            .count()
    }

    /// Number of sessions currently held, expired or not.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn user_tokens(&self, user_id: &str) -> Vec<String> {
        self.by_user
            .get(user_id)
            .map(|tokens| tokens.value().clone())
            .unwrap_or_default()
    }

    fn remove_session(&self, token: &str) -> bool {
        let Some((_, session)) = self.sessions.remove(token) else {
            return false;
        };

        if let Some(mut tokens) = self.by_user.get_mut(&session.user_id) {
            tokens.retain(|t| t != token);
        }
        self.by_user
            .remove_if(&session.user_id, |_, tokens| tokens.is_empty());

        true
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
