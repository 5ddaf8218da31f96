//! Group data models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::user::UserProfile;

/// Kind of group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    /// Open group with one or more members and a mutable name.
    Group,
    /// One-to-one conversation with exactly two members.
    Private,
}

impl GroupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Private => "private",
        }
    }
}

impl std::fmt::Display for GroupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Group record from the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: GroupKind,
    /// Timestamp of the latest activity.
    pub last_message: String,
}

impl Group {
    pub fn is_private(&self) -> bool {
        self.kind == GroupKind::Private
    }
}

/// Entry of a user's group list.
#[derive(Debug, Clone, Serialize)]
pub struct GroupListItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: GroupKind,
    #[serde(rename = "newMessages")]
    pub new_messages: i64,
}

/// Group details with its active members.
#[derive(Debug, Clone, Serialize)]
pub struct GroupDetails {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: GroupKind,
    pub users: Vec<UserProfile>,
}

/// Reference returned when a group is created or resolved.
#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: GroupKind,
}

impl From<&Group> for GroupSummary {
    fn from(group: &Group) -> Self {
        Self {
            id: group.id.clone(),
            name: group.name.clone(),
            kind: group.kind,
        }
    }
}
