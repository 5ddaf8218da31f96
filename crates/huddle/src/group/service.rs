//! Group operations requested by logged-in users.

use tracing::{info, instrument};

use super::models::{Group, GroupDetails, GroupKind, GroupListItem, GroupSummary};
use super::repository::GroupRepository;
use super::resolver::MembershipResolver;
use crate::error::{ChatError, ChatResult};
use crate::message::MessageRelay;
use crate::user::{User, UserProfile, UserRepository};
use crate::ws::{Broadcaster, MemberEvent, NewGroupEvent, WsEvent};

/// Minimum length (exclusive) of a new group name on rename.
const MIN_RENAME_CHARS: usize = 3;

/// Service for group management.
#[derive(Debug, Clone)]
pub struct GroupService {
    groups: GroupRepository,
    users: UserRepository,
    resolver: MembershipResolver,
    relay: MessageRelay,
    broadcaster: Broadcaster,
}

impl GroupService {
    pub fn new(
        groups: GroupRepository,
        users: UserRepository,
        resolver: MembershipResolver,
        relay: MessageRelay,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            groups,
            users,
            resolver,
            relay,
            broadcaster,
        }
    }

    async fn load_actor(&self, actor_id: &str) -> ChatResult<User> {
        self.users
            .get_active(actor_id)
            .await?
            .ok_or_else(|| ChatError::not_found("user"))
    }

    /// Load an open group the actor belongs to. Private groups are reported
    /// as missing.
    async fn require_open_group(&self, actor_id: &str, group_id: &str) -> ChatResult<Group> {
        let group = self.resolver.require_member(actor_id, group_id).await?;
        if group.is_private() {
            return Err(ChatError::NotMember);
        }
        Ok(group)
    }

    /// Create an open group with the actor as its only member.
    #[instrument(skip(self))]
    pub async fn create(&self, actor_id: &str, name: &str) -> ChatResult<GroupSummary> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::validation("name is required"));
        }
        let actor = self.load_actor(actor_id).await?;

        let group = self
            .groups
            .create(name, GroupKind::Group, &[actor.id.as_str()])
            .await?;
        info!(group_id = %group.id, "Group created by {}", actor.login);

        self.relay
            .broadcast_service_notice(&group, &format!("Group created by user {}", actor.login))
            .await?;

        Ok(GroupSummary::from(&group))
    }

    /// Rename an open group. Names of three characters or fewer are ignored.
    #[instrument(skip(self))]
    pub async fn rename(&self, actor_id: &str, group_id: &str, name: &str) -> ChatResult<GroupSummary> {
        let mut group = self.require_open_group(actor_id, group_id).await?;

        let name = name.trim();
        if name.chars().count() > MIN_RENAME_CHARS {
            self.groups.rename(&group.id, name).await?;
            group.name = name.to_string();
        }

        Ok(GroupSummary::from(&group))
    }

    /// Add another user to an open group the actor belongs to.
    #[instrument(skip(self))]
    pub async fn add_member(&self, actor_id: &str, group_id: &str, user_id: &str) -> ChatResult<()> {
        if user_id.is_empty() {
            return Err(ChatError::validation("user_id is required"));
        }
        let group = self.require_open_group(actor_id, group_id).await?;
        if user_id == actor_id {
            return Ok(());
        }
        if self.resolver.is_member(user_id, group_id).await? {
            return Err(ChatError::conflict("user already belongs to this group"));
        }

        let actor = self.load_actor(actor_id).await?;
        let target = self
            .users
            .get_active(user_id)
            .await?
            .ok_or_else(|| ChatError::not_found("user"))?;

        self.groups.add_member(&target.id, &group.id).await?;
        info!(group_id = %group.id, "{} added {}", actor.login, target.login);

        self.broadcaster.send(
            &target.id,
            &WsEvent::NewGroup(NewGroupEvent {
                id: group.id.clone(),
                name: group.name.clone(),
                public: true,
                kind: group.kind,
                new_messages: 0,
            }),
        );
        self.notify_members(&group, WsEvent::UserJoin(MemberEvent {
            group: group.id.clone(),
            user: target.profile(),
        }))
        .await?;

        self.relay
            .broadcast_service_notice(
                &group,
                &format!("User {} was added to the group by {}.", target.login, actor.login),
            )
            .await?;

        Ok(())
    }

    /// Leave an open group.
    ///
    /// Private conversations cannot be left; they always keep both members.
    #[instrument(skip(self))]
    pub async fn leave(&self, actor_id: &str, group_id: &str) -> ChatResult<()> {
        let group = self.resolver.require_member(actor_id, group_id).await?;
        if group.is_private() {
            return Err(ChatError::conflict("private conversations cannot be left"));
        }
        let actor = self.load_actor(actor_id).await?;

        self.groups.remove_member(&actor.id, &group.id).await?;
        info!(group_id = %group.id, "{} left", actor.login);

        self.broadcaster.send(
            &actor.id,
            &WsEvent::LeaveGroup {
                group: group.id.clone(),
            },
        );
        self.notify_members(&group, WsEvent::UserLeave(MemberEvent {
            group: group.id.clone(),
            user: actor.profile(),
        }))
        .await?;

        self.relay
            .broadcast_service_notice(&group, &format!("User {} left the conversation", actor.login))
            .await?;

        Ok(())
    }

    /// Open (or reopen) the private conversation between the actor and
    /// another user.
    #[instrument(skip(self))]
    pub async fn join(&self, actor_id: &str, other_id: &str) -> ChatResult<GroupSummary> {
        if other_id.is_empty() {
            return Err(ChatError::validation("user_id is required"));
        }
        if other_id == actor_id {
            return Err(ChatError::conflict("cannot start a conversation with yourself"));
        }
        let actor = self.load_actor(actor_id).await?;
        let other = self
            .users
            .get(other_id)
            .await?
            .ok_or_else(|| ChatError::not_found("user"))?;

        if !other.is_active() {
            // History with a removed account stays reachable.
            return match self.resolver.find_private_group(actor_id, other_id).await? {
                Some(group) => Ok(private_summary(&group, &other)),
                None => Err(ChatError::not_found("user")),
            };
        }

        let (group, created) = self
            .resolver
            .find_or_create_private_group(&actor.id, &other.id)
            .await?;

        if created {
            info!(group_id = %group.id, "{} started a conversation with {}", actor.login, other.login);
            for (receiver, peer) in [(&actor, &other), (&other, &actor)] {
                self.broadcaster.send(
                    &receiver.id,
                    &WsEvent::NewGroup(NewGroupEvent {
                        id: group.id.clone(),
                        name: peer.login.clone(),
                        public: false,
                        kind: group.kind,
                        new_messages: 0,
                    }),
                );
            }
            self.relay
                .broadcast_service_notice(&group, &format!("{} started a conversation", actor.login))
                .await?;
        }

        Ok(private_summary(&group, &other))
    }

    /// Groups of the actor, most recently active first.
    #[instrument(skip(self))]
    pub async fn list_for_user(&self, actor_id: &str) -> ChatResult<Vec<GroupListItem>> {
        let mut items = self.groups.list_for_user(actor_id).await?;
        for item in items.iter_mut().filter(|item| item.kind == GroupKind::Private) {
            if let Some(login) = self.groups.other_member_login(&item.id, actor_id).await? {
                item.name = login;
            }
        }
        Ok(items)
    }

    /// Details and active members of a group the actor belongs to.
    #[instrument(skip(self))]
    pub async fn info(&self, actor_id: &str, group_id: &str) -> ChatResult<GroupDetails> {
        let group = self.resolver.require_member(actor_id, group_id).await?;
        let name = self.resolver.resolve_display_name(&group, actor_id).await?;
        let users = self.groups.active_members(&group.id).await?;

        Ok(GroupDetails {
            id: group.id,
            name,
            kind: group.kind,
            users,
        })
    }

    /// Active users outside the group whose login contains `query`.
    #[instrument(skip(self))]
    pub async fn find_new_users(
        &self,
        actor_id: &str,
        group_id: &str,
        query: &str,
    ) -> ChatResult<Vec<UserProfile>> {
        let group = self.resolver.require_member(actor_id, group_id).await?;
        Ok(self
            .users
            .find_active_outside_group(&group.id, query.trim())
            .await?)
    }

    async fn notify_members(&self, group: &Group, event: WsEvent) -> ChatResult<()> {
        for member_id in self.resolver.list_members(&group.id).await? {
            self.broadcaster.send(&member_id, &event);
        }
        Ok(())
    }
}

fn private_summary(group: &Group, other: &User) -> GroupSummary {
    GroupSummary {
        id: group.id.clone(),
        name: other.login.clone(),
        kind: group.kind,
    }
}
