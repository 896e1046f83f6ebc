//! Unread counters, the conversation currently on screen, and the
//! advisory typing indicator. None of it survives the session.

use std::collections::{HashMap, HashSet};

use peerpulse_shared::types::PeerId;

#[derive(Debug, Default)]
pub struct Presence {
    active_chat: Option<PeerId>,
    unread: HashMap<PeerId, usize>,
    typing: HashSet<PeerId>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch the visible conversation. Opening one clears its unread count.
    pub fn set_active_chat(&mut self, peer: Option<PeerId>) {
        if let Some(ref p) = peer {
            self.unread.remove(p);
        }
        self.active_chat = peer;
    }

    pub fn active_chat(&self) -> Option<&PeerId> {
        self.active_chat.as_ref()
    }

    /// Count an incoming message. Returns the new unread count, or `None`
    /// when the conversation is on screen.
    pub fn record_incoming(&mut self, peer: &PeerId) -> Option<usize> {
        if self.active_chat.as_ref() == Some(peer) {
            return None;
        }
        let count = self.unread.entry(peer.clone()).or_insert(0);
        *count += 1;
        Some(*count)
    }

    pub fn unread(&self, peer: &PeerId) -> usize {
        self.unread.get(peer).copied().unwrap_or(0)
    }

    pub fn total_unread(&self) -> usize {
        self.unread.values().sum()
    }

    /// Returns `true` if the flag changed.
    pub fn set_typing(&mut self, peer: &PeerId, typing: bool) -> bool {
        if typing {
            self.typing.insert(peer.clone())
        } else {
            self.typing.remove(peer)
        }
    }

    pub fn is_typing(&self, peer: &PeerId) -> bool {
        self.typing.contains(peer)
    }
}
