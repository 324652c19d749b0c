/// REST wire shapes shared with the backend
///
/// Field names and casing match the backend contract exactly: message and
/// deletion records are snake_case, conversation summaries are camelCase.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One message as the backend stores it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    pub body: String,
    /// RFC3339 timestamp, server-assigned; fixes the message's ordering position
    pub created_at: String,
    #[serde(default)]
    pub delivered_at: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub seen_at: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub edited_at: Option<String>,
    #[serde(default)]
    pub deleted_for_everyone: bool,
    #[serde(default)]
    pub reactions: Option<BTreeMap<String, Vec<String>>>,
}

/// Deletion record returned by DELETE /conversations/{id}/messages/{messageId}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDeletion {
    pub id: String,
    pub message_id: String,
    pub deleted_by_user_id: String,
    pub deleted_for_everyone: bool,
    pub created_at: String,
}

/// One conversation summary from GET /api/messages/conversations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    /// Peer user id for direct conversations, absent for groups
    #[serde(default)]
    pub friend_id: Option<String>,
    #[serde(default)]
    pub friend_name: Option<String>,
    #[serde(default)]
    pub friend_avatar: Option<String>,
    #[serde(default)]
    pub friend_provider: Option<String>,
    #[serde(default)]
    pub friend_is_online: Option<bool>,
    #[serde(default)]
    pub friend_last_seen: Option<String>,
    #[serde(default)]
    pub participant_ids: Option<Vec<String>>,
    #[serde(default)]
    pub participant_names: Option<Vec<String>>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_time: Option<String>,
    #[serde(default)]
    pub unread_count: Option<u32>,
}

/// Body of POST /api/messages/new_conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConversationRequest {
    pub participant_ids: Vec<String>,
}

/// Body of PATCH /api/messages/conversations/{id}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameConversationRequest {
    pub title: String,
}

/// Body of POST|PUT /messages/{id}/reactions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionRequest {
    pub reaction_type: String,
}
