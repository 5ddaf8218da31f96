//! Message data models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Kind of message row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Authored by a user.
    Message,
    /// Generated by the server, encrypted per recipient.
    Service,
}

/// Message row from the database.
#[derive(Debug, Clone, FromRow)]
pub struct Message {
    pub id: String,
    #[sqlx(rename = "group")]
    pub group_id: String,
    pub from_user: Option<String>,
    pub to_user: String,
    pub message: String,
    #[sqlx(rename = "type")]
    pub kind: MessageKind,
    pub is_read: bool,
    pub date: String,
}

/// Message row joined with its group name and sender login.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct MessageRow {
    pub id: String,
    pub group_id: String,
    pub group_name: String,
    pub from_user: Option<String>,
    pub from_login: Option<String>,
    pub to_user: String,
    pub message: String,
    #[sqlx(rename = "type")]
    pub kind: MessageKind,
    pub is_read: bool,
    pub date: String,
}

/// Group reference embedded in a message record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupRef {
    pub id: String,
    pub name: String,
}

/// Sender reference embedded in a message record. Both fields are null for
/// service messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRef {
    pub id: Option<String>,
    pub login: Option<String>,
}

/// A message as delivered to its recipient, live or from history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub is_read: bool,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub message: String,
    pub date: String,
    pub group: GroupRef,
    pub user: UserRef,
    /// Whether the recipient is also the sender.
    pub my: bool,
}

impl From<MessageRow> for MessageRecord {
    fn from(row: MessageRow) -> Self {
        let my = row.from_user.as_deref() == Some(row.to_user.as_str());
        Self {
            id: row.id,
            is_read: row.is_read,
            kind: row.kind,
            message: row.message,
            date: row.date,
            group: GroupRef {
                id: row.group_id,
                name: row.group_name,
            },
            user: UserRef {
                id: row.from_user,
                login: row.from_login,
            },
            my,
        }
    }
}

/// Result of delivering a service notice to one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeOutcome {
    /// Notice encrypted, stored and pushed.
    Sent { user_id: String, message_id: String },
    /// Member skipped, e.g. removed account or unusable key.
    Skipped { user_id: String, reason: String },
}

impl NoticeOutcome {
    pub fn user_id(&self) -> &str {
        match self {
            Self::Sent { user_id, .. } | Self::Skipped { user_id, .. } => user_id,
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}
