//! Session records.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ws::ConnectionHandle;

/// Live session owned by the registry. Never handed out directly.
#[derive(Debug)]
pub(crate) struct Session {
    pub token: String,
    pub user_id: String,
    pub login: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub connections: Vec<Arc<dyn ConnectionHandle>>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Drop handles that are closed or closing.
    pub fn prune_closed(&mut self) {
        self.connections.retain(|conn| conn.is_open());
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            token: self.token.clone(),
            user_id: self.user_id.clone(),
            login: self.login.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            connection_count: self.connections.len(),
        }
    }
}

/// Read-only snapshot of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    #[serde(skip_serializing)]
    pub token: String,
    pub user_id: String,
    pub login: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub connection_count: usize,
}
