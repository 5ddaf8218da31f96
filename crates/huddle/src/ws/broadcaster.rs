//! Fan-out of events to every open connection of a user.

use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;

use crate::session::SessionRegistry;

/// Delivers payloads to users through the session registry.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<SessionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Send `payload` to every open connection of `user_id`.
    ///
    /// Best-effort: returns how many connections accepted the payload, zero
    /// when the user is offline.
    pub fn send<T: Serialize>(&self, user_id: &str, payload: &T) -> usize {
        let connections = self.registry.open_connections(user_id);
        if connections.is_empty() {
            return 0;
        }

        let text = match serde_json::to_string(payload) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to serialize event for user {}: {}", user_id, e);
                return 0;
            }
        };

        let delivered = connections.iter().filter(|conn| conn.send(&text)).count();
        debug!(
            "Delivered event to {}/{} connection(s) of user {}",
            delivered,
            connections.len(),
            user_id
        );
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::testing::RecordingConnection;
    use crate::ws::WsEvent;
    use serde_json::json;

    fn setup() -> (Arc<SessionRegistry>, Broadcaster) {
        let registry = Arc::new(SessionRegistry::default());
        let broadcaster = Broadcaster::new(registry.clone());
        (registry, broadcaster)
    }

    #[test]
    fn test_send_to_offline_user_is_noop() {
        let (registry, broadcaster) = setup();
        let event = WsEvent::LeaveGroup {
            group: "grp_1".into(),
        };

        assert_eq!(broadcaster.send("usr_nobody", &event), 0);

        // A session without connections is offline too.
        registry.create_session("usr_a", "alice");
        assert_eq!(broadcaster.send("usr_a", &event), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_send_reaches_every_open_connection() {
        let (registry, broadcaster) = setup();
        let (t1, _) = registry.create_session("usr_a", "alice");
        let (t2, _) = registry.create_session("usr_a", "alice");

        let a = Arc::new(RecordingConnection::new());
        let b = Arc::new(RecordingConnection::new());
        let closed = Arc::new(RecordingConnection::new());
        registry.attach_connection(&t1, a.clone());
        registry.attach_connection(&t2, b.clone());
        registry.attach_connection(&t2, closed.clone());
        closed.set_open(false);

        let event = WsEvent::LeaveGroup {
            group: "grp_1".into(),
        };
        assert_eq!(broadcaster.send("usr_a", &event), 2);

        let expected = json!({"leave_group": {"group": "grp_1"}});
        assert_eq!(a.sent_json(), vec![expected.clone()]);
        assert_eq!(b.sent_json(), vec![expected]);
        assert!(closed.sent().is_empty());
    }

    #[test]
    fn test_send_skips_other_users() {
        let (registry, broadcaster) = setup();
        let (token, _) = registry.create_session("usr_b", "bob");
        let conn = Arc::new(RecordingConnection::new());
        registry.attach_connection(&token, conn.clone());

        broadcaster.send("usr_a", &json!({"x": 1}));
        assert!(conn.sent().is_empty());
    }
}
