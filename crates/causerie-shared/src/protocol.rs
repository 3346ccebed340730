use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::types::{ConversationId, Message, MessageId, UserId};

/// Events emitted by the client over the realtime channel.
///
/// Encoded as `{"event": "<name>", "data": {...}}` text frames with
/// camelCase payload keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Join a conversation room.
    #[serde(rename = "conversation:join", rename_all = "camelCase")]
    Join { conversation_id: ConversationId },

    /// Leave a conversation room.
    #[serde(rename = "conversation:leave", rename_all = "camelCase")]
    Leave { conversation_id: ConversationId },

    /// Mark the conversation as read up to its newest message.
    #[serde(rename = "conversation:read", rename_all = "camelCase")]
    MarkRead { conversation_id: ConversationId },

    /// Local typing state changed.
    #[serde(rename = "conversation:typing", rename_all = "camelCase")]
    Typing {
        conversation_id: ConversationId,
        is_typing: bool,
    },
}

/// Events pushed by the server over the realtime channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Handshake accepted; carries the authenticated user id.
    #[serde(rename = "connection:success", rename_all = "camelCase")]
    ConnectionSuccess { user_id: UserId },

    /// A new message was posted to a conversation.
    #[serde(rename = "message:new", rename_all = "camelCase")]
    NewMessage {
        conversation_id: ConversationId,
        message: Message,
    },

    /// Room join acknowledged.
    #[serde(rename = "conversation:join:ok", rename_all = "camelCase")]
    JoinOk { conversation_id: ConversationId },

    /// Room leave acknowledged.
    #[serde(rename = "conversation:leave:ok", rename_all = "camelCase")]
    LeaveOk { conversation_id: ConversationId },

    /// Another participant's read high-water mark moved.
    #[serde(rename = "conversation:read:update", rename_all = "camelCase")]
    ReadUpdate {
        conversation_id: ConversationId,
        user_id: UserId,
        last_read_message_id: MessageId,
        last_read_at: DateTime<Utc>,
    },

    /// A participant started or stopped typing.
    #[serde(rename = "conversation:typing:update", rename_all = "camelCase")]
    TypingUpdate {
        conversation_id: ConversationId,
        user_id: UserId,
        is_typing: bool,
    },

    /// A user came online.
    #[serde(rename = "user:online", rename_all = "camelCase")]
    UserOnline { user_id: UserId },

    /// A user went offline.
    #[serde(rename = "user:offline", rename_all = "camelCase")]
    UserOffline { user_id: UserId },

    /// Generic application error from the server.
    #[serde(rename = "error", rename_all = "camelCase")]
    Error { code: String, message: String },
}

impl ClientEvent {
    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from a JSON text frame.
    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(s)?)
    }
}

impl ServerEvent {
    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from a JSON text frame.
    ///
    /// Frames naming an event outside the known set are reported as
    /// [`ProtocolError::UnknownEvent`] so callers can skip them without
    /// treating the frame as corrupt.
    pub fn from_json(s: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(s)?;
        if let Some(name) = value.get("event").and_then(|e| e.as_str()) {
            if !KNOWN_SERVER_EVENTS.contains(&name) {
                return Err(ProtocolError::UnknownEvent(name.to_string()));
            }
        }
        Ok(serde_json::from_value(value)?)
    }
}

const KNOWN_SERVER_EVENTS: &[&str] = &[
    "connection:success",
    "message:new",
    "conversation:join:ok",
    "conversation:leave:ok",
    "conversation:read:update",
    "conversation:typing:update",
    "user:online",
    "user:offline",
    "error",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserProfile;

    #[test]
    fn test_client_event_encoding() {
        let event = ClientEvent::Typing {
            conversation_id: ConversationId(5),
            is_typing: true,
        };

        let json = event.to_json().unwrap();
        assert!(json.contains("\"conversation:typing\""));
        assert!(json.contains("\"conversationId\":5"));
        assert!(json.contains("\"isTyping\":true"));

        let restored = ClientEvent::from_json(&json).unwrap();
        assert_eq!(event, restored);
    }

    #[test]
    fn test_server_event_roundtrip() {
        let event = ServerEvent::NewMessage {
            conversation_id: ConversationId(5),
            message: Message {
                id: MessageId(42),
                content: "salut".into(),
                created_at: Utc::now(),
                sender: UserProfile {
                    id: UserId(7),
                    email: "a@b.c".into(),
                    name: "Ada".into(),
                },
                read_by: vec![],
                is_sent: false,
            },
        };

        let json = event.to_json().unwrap();
        let restored = ServerEvent::from_json(&json).unwrap();

        if let (
            ServerEvent::NewMessage { message: orig, .. },
            ServerEvent::NewMessage { message: rest, .. },
        ) = (&event, &restored)
        {
            assert_eq!(orig.id, rest.id);
            assert_eq!(orig.sender, rest.sender);
        } else {
            panic!("Event type mismatch");
        }
    }

    #[test]
    fn test_read_update_decoding() {
        let json = r#"{"event":"conversation:read:update","data":{
            "conversationId":3,"userId":9,"lastReadMessageId":120,
            "lastReadAt":"2025-03-01T12:00:00Z"}}"#;

        match ServerEvent::from_json(json).unwrap() {
            ServerEvent::ReadUpdate {
                conversation_id,
                user_id,
                last_read_message_id,
                ..
            } => {
                assert_eq!(conversation_id, ConversationId(3));
                assert_eq!(user_id, UserId(9));
                assert_eq!(last_read_message_id, MessageId(120));
            }
            other => panic!("Unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_server_event() {
        let json = r#"{"event":"conversation:renamed","data":{"conversationId":3}}"#;
        match ServerEvent::from_json(json) {
            Err(ProtocolError::UnknownEvent(name)) => assert_eq!(name, "conversation:renamed"),
            other => panic!("Expected UnknownEvent, got {other:?}"),
        }
    }
}
