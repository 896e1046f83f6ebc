//! Inbound call offers waiting for the local user's decision.
//!
//! At most one offer is held per (peer, media kind). A newer offer of the
//! same kind from the same peer replaces the held one; the caller gets the
//! displaced request back and is responsible for closing it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use peerpulse_net::transport::CallHandle;
use peerpulse_shared::types::{MediaKind, PeerId};

#[derive(Debug)]
pub struct IncomingCallRequest {
    pub peer: PeerId,
    pub kind: MediaKind,
    pub call: Box<dyn CallHandle>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct Mailbox {
    slots: HashMap<(PeerId, MediaKind), IncomingCallRequest>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `request`, returning the offer it displaced, if any.
    pub fn deposit(&mut self, request: IncomingCallRequest) -> Option<IncomingCallRequest> {
        let key = (request.peer.clone(), request.kind);
        debug!(peer = %request.peer.short(), kind = %request.kind, call = %request.call.id(), "Holding incoming call");
        self.slots.insert(key, request)
    }

    /// Remove and return the held offer.
    pub fn take(&mut self, peer: &PeerId, kind: MediaKind) -> Option<IncomingCallRequest> {
        self.slots.remove(&(peer.clone(), kind))
    }

    pub fn get(&self, peer: &PeerId, kind: MediaKind) -> Option<&IncomingCallRequest> {
        self.slots.get(&(peer.clone(), kind))
    }

    pub fn contains(&self, peer: &PeerId, kind: MediaKind) -> bool {
        self.slots.contains_key(&(peer.clone(), kind))
    }

    /// Remove every offer from `peer`, of any kind.
    pub fn discard_peer(&mut self, peer: &PeerId) -> Vec<IncomingCallRequest> {
        [MediaKind::Audio, MediaKind::Video]
            .into_iter()
            .filter_map(|kind| self.take(peer, kind))
            .collect()
    }

    /// Undecided offers, oldest first.
    pub fn pending(&self) -> Vec<(&PeerId, MediaKind)> {
        let mut held: Vec<&IncomingCallRequest> = self.slots.values().collect();
        held.sort_by_key(|r| r.received_at);
        held.into_iter().map(|r| (&r.peer, r.kind)).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
