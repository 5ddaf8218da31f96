//! Group membership resolution and private-group deduplication.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::models::{Group, GroupKind};
use super::repository::GroupRepository;
use crate::error::{ChatError, ChatResult};

/// Stored name of private groups; clients show the other member's login.
pub const PRIVATE_GROUP_NAME: &str = "Private group";

/// Answers membership questions and finds or creates private groups.
#[derive(Debug, Clone)]
pub struct MembershipResolver {
    groups: GroupRepository,
    /// Serializes the check-then-create of private groups in this process.
    private_lock: Arc<Mutex<()>>,
}

impl MembershipResolver {
    pub fn new(groups: GroupRepository) -> Self {
        Self {
            groups,
            private_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn is_member(&self, user_id: &str, group_id: &str) -> ChatResult<bool> {
        Ok(self.groups.is_member(user_id, group_id).await?)
    }

    /// IDs of every member of a group.
    pub async fn list_members(&self, group_id: &str) -> ChatResult<Vec<String>> {
        Ok(self.groups.member_ids(group_id).await?)
    }

    /// Load a group the user belongs to.
    ///
    /// A missing group and a group the user is not in both yield
    /// [`ChatError::NotMember`], so callers cannot probe for group ids.
    pub async fn require_member(&self, user_id: &str, group_id: &str) -> ChatResult<Group> {
        if group_id.is_empty() {
            return Err(ChatError::validation("group id is required"));
        }
        let group = self.groups.get(group_id).await?.ok_or(ChatError::NotMember)?;
        if !self.groups.is_member(user_id, group_id).await? {
            return Err(ChatError::NotMember);
        }
        Ok(group)
    }

    /// The existing private group of `a` and `b`, without creating one.
    pub async fn find_private_group(&self, a: &str, b: &str) -> ChatResult<Option<Group>> {
        let mut conn = self
            .groups
            .pool()
            .acquire()
            .await
            .context("Failed to acquire connection")?;
        Ok(GroupRepository::find_private_between(&mut *conn, a, b).await?)
    }

    /// Return the private group of `a` and `b`, creating it if needed.
    ///
    /// The boolean is true when the group was created by this call. Calls
    /// for (a, b) and (b, a) resolve to the same group.
    #[instrument(skip(self))]
    pub async fn find_or_create_private_group(&self, a: &str, b: &str) -> ChatResult<(Group, bool)> {
        if a.is_empty() || b.is_empty() {
            return Err(ChatError::validation("both user ids are required"));
        }
        if a == b {
            return Err(ChatError::conflict("cannot start a conversation with yourself"));
        }

        let _guard = self.private_lock.lock().await;
        let mut tx = self
            .groups
            .pool()
            .begin()
            .await
            .context("Failed to begin private group lookup")?;

        if let Some(group) = GroupRepository::find_private_between(&mut *tx, a, b).await? {
            tx.commit()
                .await
                .context("Failed to finish private group lookup")?;
            return Ok((group, false));
        }

        let group =
            GroupRepository::create_in(&mut *tx, PRIVATE_GROUP_NAME, GroupKind::Private, &[a, b])
                .await?;
        tx.commit()
            .await
            .context("Failed to commit private group")?;

        debug!("Created private group {}", group.id);
        Ok((group, true))
    }

    /// Name of `group` as seen by `viewer_id`: the other member's login for
    /// private groups, the stored name otherwise.
    pub async fn resolve_display_name(&self, group: &Group, viewer_id: &str) -> ChatResult<String> {
        if group.kind != GroupKind::Private {
            return Ok(group.name.clone());
        }
        Ok(self
            .groups
            .other_member_login(&group.id, viewer_id)
            .await?
            .unwrap_or_else(|| group.name.clone()))
    }
}
