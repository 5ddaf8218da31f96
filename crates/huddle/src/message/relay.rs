//! Message relay: persistence plus live delivery of chat messages and
//! service notices, read state and history paging.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, info, instrument, warn};

use super::models::{GroupRef, MessageKind, MessageRecord, NoticeOutcome, UserRef};
use super::repository::MessageRepository;
use crate::crypto::NoticeKey;
use crate::db::normalize_timestamp;
use crate::error::{ChatError, ChatResult};
use crate::group::{Group, GroupRepository, MembershipResolver};
use crate::user::UserRepository;
use crate::ws::{Broadcaster, WsEvent};

/// Messages returned by an uncursored history request.
pub const RECENT_PAGE_SIZE: i64 = 25;

/// Messages returned per cursored history page.
pub const OLDER_PAGE_SIZE: i64 = 15;

static CURSOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z$").expect("valid cursor regex")
});

/// Relays messages between members and records them for offline delivery.
#[derive(Debug, Clone)]
pub struct MessageRelay {
    messages: MessageRepository,
    groups: GroupRepository,
    users: UserRepository,
    resolver: MembershipResolver,
    broadcaster: Broadcaster,
}

impl MessageRelay {
    pub fn new(
        messages: MessageRepository,
        groups: GroupRepository,
        users: UserRepository,
        resolver: MembershipResolver,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            messages,
            groups,
            users,
            resolver,
            broadcaster,
        }
    }

    /// Store a chat message for one recipient and push it if they are online.
    ///
    /// Clients encrypt per recipient, so one logical message arrives as one
    /// call per member.
    #[instrument(skip(self, body))]
    pub async fn relay_chat_message(
        &self,
        sender_id: &str,
        group_id: &str,
        recipient_id: &str,
        body: &str,
    ) -> ChatResult<MessageRecord> {
        if group_id.is_empty() {
            return Err(ChatError::validation("group is required"));
        }
        if recipient_id.is_empty() {
            return Err(ChatError::validation("to_user is required"));
        }
        if body.is_empty() {
            return Err(ChatError::validation("message is required"));
        }

        let group = self.resolver.require_member(sender_id, group_id).await?;
        if !self.resolver.is_member(recipient_id, group_id).await? {
            return Err(ChatError::validation("recipient is not a member of the group"));
        }
        let sender = self
            .users
            .get_active(sender_id)
            .await?
            .ok_or_else(|| ChatError::not_found("user"))?;

        let stored = self
            .messages
            .insert(
                group_id,
                Some(sender_id),
                recipient_id,
                body,
                MessageKind::Message,
            )
            .await?;
        self.groups.touch(group_id).await?;

        let record = MessageRecord {
            id: stored.id,
            is_read: stored.is_read,
            kind: stored.kind,
            message: stored.message,
            date: stored.date,
            group: GroupRef {
                id: group.id.clone(),
                name: self.resolver.resolve_display_name(&group, recipient_id).await?,
            },
            user: UserRef {
                id: Some(sender.id),
                login: Some(sender.login),
            },
            my: sender_id == recipient_id,
        };

        self.broadcaster
            .send(recipient_id, &WsEvent::Message(record.clone()));
        debug!("Relayed message {} to {}", record.id, recipient_id);

        Ok(record)
    }

    /// Encrypt `plaintext` for every member with a usable key, store it as a
    /// service message and push it.
    ///
    /// Members without a usable account or key are skipped; one bad key never
    /// stops the rest of the group from being notified.
    #[instrument(skip(self, group, plaintext), fields(group_id = %group.id))]
    pub async fn broadcast_service_notice(
        &self,
        group: &Group,
        plaintext: &str,
    ) -> ChatResult<Vec<NoticeOutcome>> {
        let members = self.resolver.list_members(&group.id).await?;
        let mut outcomes = Vec::with_capacity(members.len());

        for member_id in members {
            let outcome = self.deliver_notice(group, &member_id, plaintext).await;
            if let NoticeOutcome::Skipped { user_id, reason } = &outcome {
                warn!("Skipped service notice for {}: {}", user_id, reason);
            }
            outcomes.push(outcome);
        }

        let sent = outcomes.iter().filter(|o| o.is_sent()).count();
        info!("Service notice delivered to {}/{} member(s)", sent, outcomes.len());
        Ok(outcomes)
    }

    async fn deliver_notice(&self, group: &Group, member_id: &str, plaintext: &str) -> NoticeOutcome {
        let skipped = |reason: String| NoticeOutcome::Skipped {
            user_id: member_id.to_string(),
            reason,
        };

        let member = match self.users.get_active(member_id).await {
            Ok(Some(member)) => member,
            Ok(None) => return skipped("no active account".to_string()),
            Err(e) => {
                error!("Failed to load member {}: {:#}", member_id, e);
                return skipped(format!("store error: {e}"));
            }
        };

        let ciphertext = match NoticeKey::parse(&member.public_key)
            .and_then(|key| key.encrypt_notice(plaintext))
        {
            Ok(ciphertext) => ciphertext,
            Err(e) => return skipped(e.to_string()),
        };

        let stored = match self
            .messages
            .insert(&group.id, None, member_id, &ciphertext, MessageKind::Service)
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                error!("Failed to store notice for {}: {:#}", member_id, e);
                return skipped(format!("store error: {e}"));
            }
        };

        let name = self
            .resolver
            .resolve_display_name(group, member_id)
            .await
            .unwrap_or_else(|_| group.name.clone());

        let record = MessageRecord {
            id: stored.id.clone(),
            is_read: stored.is_read,
            kind: stored.kind,
            message: stored.message,
            date: stored.date,
            group: GroupRef {
                id: group.id.clone(),
                name,
            },
            user: UserRef {
                id: None,
                login: None,
            },
            my: false,
        };
        self.broadcaster.send(member_id, &WsEvent::Message(record));

        NoticeOutcome::Sent {
            user_id: member_id.to_string(),
            message_id: stored.id,
        }
    }

    /// Mark the user's messages in a group as read up to `upto`.
    ///
    /// Idempotent; returns how many rows changed.
    #[instrument(skip(self))]
    pub async fn mark_read(&self, user_id: &str, group_id: &str, upto: &str) -> ChatResult<u64> {
        self.resolver.require_member(user_id, group_id).await?;
        let cutoff = normalize_timestamp(upto)
            .ok_or_else(|| ChatError::validation("date must be an RFC 3339 timestamp"))?;

        Ok(self.messages.mark_read(user_id, group_id, &cutoff).await?)
    }

    /// History of a group as seen by `user_id`, oldest first.
    ///
    /// Without a cursor this is the newest [`RECENT_PAGE_SIZE`] messages.
    /// With a cursor (`YYYY-MM-DDTHH:MM:SS.sssZ`) it is the
    /// [`OLDER_PAGE_SIZE`] messages immediately before it.
    #[instrument(skip(self))]
    pub async fn fetch_recent(
        &self,
        user_id: &str,
        group_id: &str,
        before: Option<&str>,
    ) -> ChatResult<Vec<MessageRecord>> {
        let group = self.resolver.require_member(user_id, group_id).await?;

        let mut rows = match before.filter(|cursor| !cursor.is_empty()) {
            None => {
                self.messages
                    .latest(user_id, group_id, RECENT_PAGE_SIZE)
                    .await?
            }
            Some(cursor) => {
                if !CURSOR_RE.is_match(cursor) {
                    return Err(ChatError::InvalidCursor(cursor.to_string()));
                }
                self.messages
                    .before(user_id, group_id, cursor, OLDER_PAGE_SIZE)
                    .await?
            }
        };
        rows.reverse();

        let name = self.resolver.resolve_display_name(&group, user_id).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let mut record = MessageRecord::from(row);
                record.group.name = name.clone();
                record
            })
            .collect())
    }
}
