use std::collections::HashMap;

use tracing::debug;

use peerpulse_shared::types::PeerId;

use crate::models::Message;

/// Per-peer conversation history for the current session.
/// Order is append order; entries are never reordered or edited.
#[derive(Debug, Default)]
pub struct MessageLog {
    conversations: HashMap<PeerId, Vec<Message>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to `peer`'s conversation.
    pub fn append(&mut self, peer: &PeerId, message: Message) -> &Message {
        debug!(
            peer = %peer.short(),
            id = %message.id,
            kind = ?message.kind,
            "Appending message"
        );
        let conversation = self.conversations.entry(peer.clone()).or_default();
        conversation.push(message);
        &conversation[conversation.len() - 1]
    }

    pub fn history(&self, peer: &PeerId) -> &[Message] {
        self.conversations
            .get(peer)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn last(&self, peer: &PeerId) -> Option<&Message> {
        self.history(peer).last()
    }

    pub fn len(&self, peer: &PeerId) -> usize {
        self.history(peer).len()
    }

    pub fn is_empty(&self, peer: &PeerId) -> bool {
        self.history(peer).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_append_order_is_preserved() {
        let mut log = MessageLog::new();
        let peer = PeerId::from("bob");
        let now = Utc::now();

        // timestamps deliberately out of order
        for (i, offset) in [5, -3, 0, 10].into_iter().enumerate() {
            log.append(
                &peer,
                Message::text(peer.clone(), format!("m{i}"), now + Duration::seconds(offset)),
            );
        }

        let contents: Vec<&str> = log.history(&peer).iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "m3"]);
        assert_eq!(log.last(&peer).unwrap().content, "m3");
    }

    #[test]
    fn test_conversations_are_separate() {
        let mut log = MessageLog::new();
        let alice = PeerId::from("alice");
        let bob = PeerId::from("bob");
        log.append(&alice, Message::text(alice.clone(), "a", Utc::now()));

        assert_eq!(log.len(&alice), 1);
        assert!(log.is_empty(&bob));
        assert!(log.history(&bob).is_empty());
    }
}
