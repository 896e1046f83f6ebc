use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::types::{MediaKind, PeerId};

/// Signaling messages exchanged over an open link, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Handshake: the sender's display name
    #[serde(rename = "USER_INFO")]
    UserInfo { username: String },

    #[serde(rename = "TYPING_START")]
    TypingStart,

    #[serde(rename = "TYPING_END")]
    TypingEnd,

    #[serde(rename = "CALL_REQUEST")]
    CallRequest,

    #[serde(rename = "CALL_END")]
    CallEnd,

    #[serde(rename = "VIDEO_CALL_REQUEST")]
    VideoCallRequest,

    #[serde(rename = "VIDEO_CALL_END")]
    VideoCallEnd,
}

const CONTROL_TYPES: [&str; 7] = [
    "USER_INFO",
    "TYPING_START",
    "TYPING_END",
    "CALL_REQUEST",
    "CALL_END",
    "VIDEO_CALL_REQUEST",
    "VIDEO_CALL_END",
];

impl ControlMessage {
    pub fn call_request(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Audio => Self::CallRequest,
            MediaKind::Video => Self::VideoCallRequest,
        }
    }

    pub fn call_end(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Audio => Self::CallEnd,
            MediaKind::Video => Self::VideoCallEnd,
        }
    }

    pub fn is_known_type(tag: &str) -> bool {
        CONTROL_TYPES.contains(&tag)
    }
}

/// A chat message as it travels over the link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPayload {
    pub id: String,
    pub content: String,
    pub sender: PeerId,
    /// Unix milliseconds on the wire
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// Everything that can arrive on a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Control(ControlMessage),
    Chat(ChatPayload),
}

impl Payload {
    /// Decode one link frame.
    ///
    /// A frame with a `type` field must be a known control message; a frame
    /// without one must be a chat message. Anything else is an error the
    /// caller is expected to log and drop.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let tag = match value.as_object() {
            Some(obj) => obj.get("type").cloned(),
            None => return Err(ProtocolError::NotAnObject),
        };

        match tag {
            Some(Value::String(tag)) => {
                if !ControlMessage::is_known_type(&tag) {
                    return Err(ProtocolError::UnknownType(tag));
                }
                serde_json::from_value(value)
                    .map(Payload::Control)
                    .map_err(|e| ProtocolError::Malformed {
                        kind: tag,
                        reason: e.to_string(),
                    })
            }
            Some(other) => Err(ProtocolError::UnknownType(other.to_string())),
            None => serde_json::from_value(value)
                .map(Payload::Chat)
                .map_err(|e| ProtocolError::Malformed {
                    kind: "chat".to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    /// Encode to the JSON text sent over a link
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let text = match self {
            Payload::Control(control) => serde_json::to_string(control)?,
            Payload::Chat(chat) => serde_json::to_string(chat)?,
        };
        Ok(text)
    }
}

impl From<ControlMessage> for Payload {
    fn from(control: ControlMessage) -> Self {
        Payload::Control(control)
    }
}

impl From<ChatPayload> for Payload {
    fn from(chat: ChatPayload) -> Self {
        Payload::Chat(chat)
    }
}
