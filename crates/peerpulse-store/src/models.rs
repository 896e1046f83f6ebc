//! Message model held in the per-peer log.
//!
//! Derives `Serialize` so the UI layer can render it directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use peerpulse_shared::protocol::ChatPayload;
use peerpulse_shared::types::{MediaKind, PeerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    System,
    CallStarted,
    CallEnded,
}

/// One entry of a conversation. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub sender: PeerId,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
    /// Whole seconds, only on `CallEnded`
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub duration_secs: Option<u64>,
}

impl Message {
    fn build(sender: PeerId, content: String, timestamp: DateTime<Utc>, kind: MessageKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            sender,
            timestamp,
            kind,
            duration_secs: None,
        }
    }

    pub fn text(sender: PeerId, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::build(sender, content.into(), timestamp, MessageKind::Text)
    }

    pub fn call_started(sender: PeerId, kind: MediaKind, timestamp: DateTime<Utc>) -> Self {
        let content = match kind {
            MediaKind::Audio => "Voice call started",
            MediaKind::Video => "Video call started",
        };
        Self::build(sender, content.to_string(), timestamp, MessageKind::CallStarted)
    }

    pub fn call_ended(
        sender: PeerId,
        kind: MediaKind,
        duration_secs: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let label = match kind {
            MediaKind::Audio => "Voice call",
            MediaKind::Video => "Video call",
        };
        let mut message = Self::build(
            sender,
            format!("{label} ended ({})", format_duration(duration_secs)),
            timestamp,
            MessageKind::CallEnded,
        );
        message.duration_secs = Some(duration_secs);
        message
    }

    /// A chat message received from a peer.
    pub fn from_chat(chat: ChatPayload) -> Self {
        Self {
            id: chat.id,
            content: chat.content,
            sender: chat.sender,
            timestamp: chat.timestamp,
            kind: MessageKind::Text,
            duration_secs: None,
        }
    }

    /// Wire form of a text message.
    pub fn to_chat(&self) -> ChatPayload {
        ChatPayload {
            id: self.id.clone(),
            content: self.content.clone(),
            sender: self.sender.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// `m:ss`, or `h:mm:ss` past an hour.
pub fn format_duration(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}
