/// Domain model: conversations, messages, typing entries
///
/// Mapping from the backend wire shapes happens here. The mapped view is
/// what UI readers consume; the engine is its only writer.
use crate::receipts::{delivery_status, DeliveryStatus, ReactionState, ReceiptSummary};
use crate::wire::{BackendMessage, ConversationSummary};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Sender label shown for the current user's own messages
pub const SELF_SENDER: &str = "Me";

/// Group names list at most this many participants before collapsing to "+N"
const GROUP_NAME_LIMIT: usize = 3;

/// One message in a conversation. Created by a fetch, an optimistic send,
/// or a push event; mutated in place afterwards, never evicted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Stable across edits
    pub id: String,
    pub sender_id: String,
    /// "Me" for own messages, display label otherwise
    pub sender: String,
    pub body: String,
    /// Server-assigned RFC3339 creation timestamp
    pub created_at: String,
    /// HH:MM display time
    pub time: String,
    /// Soft-delete tombstone; body is cleared when set
    pub is_deleted: bool,
    pub is_edited: bool,
    /// Only derived for own messages
    pub status: Option<DeliveryStatus>,
    pub delivered: ReceiptSummary,
    pub seen: ReceiptSummary,
    pub reactions: ReactionState,
}

impl Message {
    /// Map one backend message into the domain shape for `user_id`'s view
    pub fn from_backend(bm: &BackendMessage, user_id: &str) -> Self {
        let is_own = bm.sender_id == user_id;
        let sender = if is_own {
            SELF_SENDER.to_string()
        } else {
            bm.sender_name.clone().unwrap_or_else(|| bm.sender_id.clone())
        };
        let status = is_own
            .then(|| delivery_status(bm.delivered_at.as_ref(), bm.seen_at.as_ref()));
        Self {
            id: bm.id.clone(),
            sender_id: bm.sender_id.clone(),
            sender,
            body: bm.body.clone(),
            created_at: bm.created_at.clone(),
            time: format_clock_time(&bm.created_at),
            is_deleted: bm.deleted_for_everyone,
            is_edited: bm.edited_at.is_some(),
            status,
            delivered: ReceiptSummary::from_map(bm.delivered_at.as_ref()),
            seen: ReceiptSummary::from_map(bm.seen_at.as_ref()),
            reactions: ReactionState::derive(bm.reactions.as_ref(), user_id),
        }
    }

    /// Synthesize a local fallback message after a failed send. Provisional:
    /// superseded by the next authoritative fetch.
    pub fn local_fallback(body: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender_id: String::new(),
            sender: SELF_SENDER.to_string(),
            body: body.to_string(),
            created_at: now.to_rfc3339(),
            time: now.with_timezone(&Local).format("%H:%M").to_string(),
            is_deleted: false,
            is_edited: false,
            status: Some(DeliveryStatus::Sent),
            delivered: ReceiptSummary::default(),
            seen: ReceiptSummary::default(),
            reactions: ReactionState::default(),
        }
    }

    pub fn is_own(&self) -> bool {
        self.sender == SELF_SENDER
    }
}

/// One conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    /// Peer user id for direct conversations, None for groups
    pub friend_id: Option<String>,
    pub name: String,
    pub avatar: Option<String>,
    /// Preview text of the last message
    pub last_message: String,
    /// RFC3339 last-activity timestamp; the directory sort key
    pub timestamp: String,
    pub unread: u32,
    pub messages: Vec<Message>,
    pub is_bot: bool,
    pub is_online: bool,
    pub last_seen: Option<String>,
    pub participant_ids: Vec<String>,
    pub participant_names: Vec<String>,
}

impl Conversation {
    /// Map one directory summary into the domain shape for `user_id`'s view
    pub fn from_summary(s: &ConversationSummary, user_id: &str) -> Self {
        let name = display_name(s, user_id);
        Self {
            id: s.id.clone(),
            friend_id: s.friend_id.clone(),
            name,
            avatar: s.friend_avatar.clone(),
            last_message: s.last_message.clone().unwrap_or_default(),
            timestamp: s.last_message_time.clone().unwrap_or_default(),
            unread: s.unread_count.unwrap_or(0),
            messages: Vec::new(),
            is_bot: s.friend_provider.as_deref() == Some("openai"),
            is_online: s.friend_is_online.unwrap_or(false),
            last_seen: s.friend_last_seen.clone(),
            participant_ids: s.participant_ids.clone().unwrap_or_default(),
            participant_names: s.participant_names.clone().unwrap_or_default(),
        }
    }

    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    pub fn message_mut(&mut self, message_id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == message_id)
    }

    /// Latest non-deleted, non-empty body, used after a delete tombstones
    /// the previous preview
    pub fn recompute_preview(&mut self) {
        self.last_message = self
            .messages
            .iter()
            .rev()
            .find(|m| !m.is_deleted && !m.body.trim().is_empty())
            .map(|m| m.body.clone())
            .unwrap_or_default();
    }
}

/// Display name for a summary: the peer's name for direct conversations,
/// a computed participant list for groups (exclude self, join up to three,
/// collapse the rest to "+N").
fn display_name(s: &ConversationSummary, user_id: &str) -> String {
    if s.friend_id.is_some() {
        return s.friend_name.clone().unwrap_or_default();
    }
    let ids = s.participant_ids.as_deref().unwrap_or_default();
    let names = s.participant_names.as_deref().unwrap_or_default();
    let mut others: Vec<&str> = ids
        .iter()
        .zip(names.iter())
        .filter(|(id, _)| id.as_str() != user_id)
        .map(|(_, name)| name.as_str())
        .collect();
    if others.is_empty() {
        // Fallback when no ids accompany the names: the backend-computed label
        if let Some(name) = &s.friend_name {
            return name.clone();
        }
        others = names.iter().map(|n| n.as_str()).collect();
    }
    group_display_name(&others)
}

/// Join up to three names; beyond that, show the first three plus "+N"
pub fn group_display_name(names: &[&str]) -> String {
    if names.len() <= GROUP_NAME_LIMIT {
        return names.join(", ");
    }
    let shown = names[..GROUP_NAME_LIMIT].join(", ");
    format!("{}, +{}", shown, names.len() - GROUP_NAME_LIMIT)
}

/// Ephemeral remote typing state, keyed by (conversation, user)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingEntry {
    pub user_id: String,
    pub user_name: Option<String>,
}

/// Parse an RFC3339 timestamp for ordering; unparseable values sort oldest
fn sort_key(timestamp: &str) -> i64 {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.timestamp_millis())
        .unwrap_or(i64::MIN)
}

/// Keep the directory ordered by last activity, newest first
pub fn sort_by_timestamp(conversations: &mut [Conversation]) {
    conversations.sort_by_key(|c| std::cmp::Reverse(sort_key(&c.timestamp)));
}

/// HH:MM local display time from an RFC3339 timestamp; raw input when unparseable
pub fn format_clock_time(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|_| timestamp.to_string())
}
