//! WebSocket message types.
//!
//! Every frame is a JSON object with a single key naming the event.

use serde::{Deserialize, Serialize};

use crate::group::GroupKind;
use crate::message::MessageRecord;
use crate::user::UserProfile;

// ============================================================================
// Events (Server -> Client)
// ============================================================================

/// Events pushed to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WsEvent {
    /// A chat or service message addressed to the receiving user.
    Message(MessageRecord),

    /// The receiving user was added to a group.
    NewGroup(NewGroupEvent),

    /// A user joined a group the receiver belongs to.
    UserJoin(MemberEvent),

    /// A user left a group the receiver belongs to.
    UserLeave(MemberEvent),

    /// The receiving user left a group.
    LeaveGroup { group: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct NewGroupEvent {
    pub id: String,
    /// Name as seen by the receiver.
    pub name: String,
    pub public: bool,
    #[serde(rename = "type")]
    pub kind: GroupKind,
    #[serde(rename = "newMessages")]
    pub new_messages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberEvent {
    pub group: String,
    pub user: UserProfile,
}

// ============================================================================
// Commands (Client -> Server)
// ============================================================================

/// Commands sent by clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WsCommand {
    /// Send one (already encrypted) message to one group member.
    SendMessage(SendMessage),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessage {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub to_user: String,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{GroupRef, MessageKind, UserRef};
    use serde_json::json;

    #[test]
    fn test_parse_send_message() {
        let raw = r#"{"send_message":{"group":"grp_1","to_user":"usr_2","message":"hi"}}"#;
        let WsCommand::SendMessage(cmd) = serde_json::from_str(raw).unwrap();
        assert_eq!(cmd.group, "grp_1");
        assert_eq!(cmd.to_user, "usr_2");
        assert_eq!(cmd.message, "hi");
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(serde_json::from_str::<WsCommand>(r#"{"ping":{}}"#).is_err());
    }

    #[test]
    fn test_message_event_shape() {
        let event = WsEvent::Message(MessageRecord {
            id: "msg_1".into(),
            is_read: false,
            kind: MessageKind::Service,
            message: "cipher".into(),
            date: "2024-01-01T00:00:00.000Z".into(),
            group: GroupRef {
                id: "grp_1".into(),
                name: "team".into(),
            },
            user: UserRef {
                id: None,
                login: None,
            },
            my: false,
        });

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"message": {
                "id": "msg_1",
                "is_read": false,
                "type": "service",
                "message": "cipher",
                "date": "2024-01-01T00:00:00.000Z",
                "group": {"id": "grp_1", "name": "team"},
                "user": {"id": null, "login": null},
                "my": false
            }})
        );
    }

    #[test]
    fn test_group_event_shapes() {
        let new_group = WsEvent::NewGroup(NewGroupEvent {
            id: "grp_1".into(),
            name: "bob".into(),
            public: false,
            kind: GroupKind::Private,
            new_messages: 0,
        });
        assert_eq!(
            serde_json::to_value(&new_group).unwrap(),
            json!({"new_group": {"id": "grp_1", "name": "bob", "public": false, "type": "private", "newMessages": 0}})
        );

        let leave = WsEvent::LeaveGroup {
            group: "grp_1".into(),
        };
        assert_eq!(
            serde_json::to_value(&leave).unwrap(),
            json!({"leave_group": {"group": "grp_1"}})
        );

        let join = WsEvent::UserJoin(MemberEvent {
            group: "grp_1".into(),
            user: UserProfile {
                id: "usr_1".into(),
                login: "alice".into(),
                public_key: "pem".into(),
            },
        });
        assert_eq!(
            serde_json::to_value(&join).unwrap(),
            json!({"user_join": {"group": "grp_1", "user": {"id": "usr_1", "login": "alice", "public_key": "pem"}}})
        );
    }
}
