/// Push channel protocol
///
/// Inbound events arrive as JSON tagged by the `event` field; outbound
/// events are the small client→server subset (typing signals).
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimal message shape carried inside push events. Events deliberately
/// omit receipt and reaction fields; full state comes from a re-fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    pub body: String,
    pub sender_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
}

/// Events streamed over the per-user push connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PushEvent {
    NewMessage {
        conversation_id: String,
        message: InboundMessage,
    },
    MessageEdited {
        conversation_id: String,
        message: InboundMessage,
    },
    MessageDeleted {
        conversation_id: String,
        message_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        deleted_by: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        deletor_name: Option<String>,
    },
    /// Carries the read ids as a singular field, a plural field, or both;
    /// the fold merges them into one set.
    MessageRead {
        conversation_id: String,
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_ids: Option<Vec<String>>,
    },
    /// The reactions map is the full authoritative state, not a delta
    MessageReactionUpdated {
        conversation_id: String,
        message_id: String,
        user_id: String,
        #[serde(default)]
        reactions: BTreeMap<String, Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<String>,
    },
    PresenceUpdate {
        user_id: String,
        is_online: bool,
        #[serde(default)]
        last_seen: Option<String>,
    },
    TypingStart {
        conversation_id: String,
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_name: Option<String>,
    },
    TypingStop {
        conversation_id: String,
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sender_name: Option<String>,
    },
}

impl PushEvent {
    /// Conversation the event targets, where one exists
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            PushEvent::NewMessage { conversation_id, .. }
            | PushEvent::MessageEdited { conversation_id, .. }
            | PushEvent::MessageDeleted { conversation_id, .. }
            | PushEvent::MessageRead { conversation_id, .. }
            | PushEvent::MessageReactionUpdated { conversation_id, .. }
            | PushEvent::TypingStart { conversation_id, .. }
            | PushEvent::TypingStop { conversation_id, .. } => Some(conversation_id),
            PushEvent::PresenceUpdate { .. } => None,
        }
    }
}

/// Client→server events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OutboundEvent {
    TypingStart { conversation_id: String },
    TypingStop { conversation_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_new_message_event() {
        let raw = r#"{
            "event": "new_message",
            "conversation_id": "c1",
            "message": {"id": "m1", "body": "hi", "sender_id": "u2"}
        }"#;
        match serde_json::from_str::<PushEvent>(raw).unwrap() {
            PushEvent::NewMessage { conversation_id, message } => {
                assert_eq!(conversation_id, "c1");
                assert_eq!(message.sender_id, "u2");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn parses_message_read_with_both_id_fields() {
        let raw = r#"{
            "event": "message_read",
            "conversation_id": "c1",
            "user_id": "u2",
            "message_id": "m1",
            "message_ids": ["m1", "m2"]
        }"#;
        match serde_json::from_str::<PushEvent>(raw).unwrap() {
            PushEvent::MessageRead { message_id, message_ids, .. } => {
                assert_eq!(message_id.as_deref(), Some("m1"));
                assert_eq!(message_ids.unwrap().len(), 2);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn conversation_id_is_absent_only_for_presence() {
        let typing = PushEvent::TypingStart {
            conversation_id: "c1".to_string(),
            user_id: "u2".to_string(),
            sender_name: None,
        };
        assert_eq!(typing.conversation_id(), Some("c1"));

        let presence = PushEvent::PresenceUpdate {
            user_id: "u2".to_string(),
            is_online: true,
            last_seen: None,
        };
        assert!(presence.conversation_id().is_none());
    }

    #[test]
    fn unknown_event_tag_fails_to_parse() {
        let raw = r#"{"event": "server_restart", "conversation_id": "c1"}"#;
        assert!(serde_json::from_str::<PushEvent>(raw).is_err());
    }

    #[test]
    fn outbound_typing_serializes_with_event_tag() {
        let out = OutboundEvent::TypingStart {
            conversation_id: "c1".to_string(),
        };
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["event"], "typing_start");
        assert_eq!(json["conversation_id"], "c1");
    }
}
