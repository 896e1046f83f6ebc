//! Connection registry.
//!
//! Owns every direct link to another peer and tracks whether it is
//! currently usable. Connections are never removed during a session: a
//! dead link only flips the status to disconnected so history and the
//! peer's display name survive a reconnect.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use peerpulse_shared::protocol::Payload;
use peerpulse_shared::types::{ConnectionStatus, LinkId, PeerId};

use crate::transport::{Link, LinkState, Transport, TransportError};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Unknown peer: {0}")]
    UnknownPeer(PeerId),

    #[error("Peer is disconnected: {0}")]
    Disconnected(PeerId),

    #[error("Cannot connect to self")]
    SelfConnect,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// What happened to a link, reduced to the registry's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Opened,
    Closed,
    Error,
    StateChanged(LinkState),
}

/// Result of feeding a [`LinkEvent`] to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// A link reached the open state; the handshake must be sent.
    Opened { reconnected: bool },
    /// The current link came back to `connected` without reopening.
    Restored,
    /// The peer went from connected to disconnected.
    Disconnected,
    /// A link that never opened died.
    Abandoned,
    /// Nothing changed.
    Unchanged,
    /// The event belongs to a link that is no longer current.
    Stale,
}

/// A direct link to one remote peer.
#[derive(Debug)]
pub struct Connection {
    peer_id: PeerId,
    link: Box<dyn Link>,
    status: ConnectionStatus,
    display_name: String,
}

impl Connection {
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn link_id(&self) -> &LinkId {
        self.link.id()
    }
}

#[derive(Debug)]
struct PendingLink {
    link: Box<dyn Link>,
    name_hint: Option<String>,
}

/// Tracks every peer we have ever linked with during this session.
#[derive(Debug)]
pub struct ConnectionRegistry {
    placeholder_name: String,
    connections: HashMap<PeerId, Connection>,
    pending: HashMap<PeerId, PendingLink>,
}

impl ConnectionRegistry {
    pub fn new(placeholder_name: impl Into<String>) -> Self {
        Self {
            placeholder_name: placeholder_name.into(),
            connections: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    /// Start an outbound link to `peer`.
    ///
    /// The connection only becomes visible once the link reports open.
    /// `name_hint` (e.g. from a share link) is used as the display name
    /// until the peer's handshake arrives.
    pub fn open(
        &mut self,
        transport: &mut dyn Transport,
        peer: &PeerId,
        name_hint: Option<String>,
    ) -> Result<LinkId, RegistryError> {
        if *peer == transport.local_id() {
            return Err(RegistryError::SelfConnect);
        }

        let link = transport.connect(peer)?;
        let link_id = link.id().clone();
        debug!(peer = %peer.short(), link = %link_id, "Opening outbound link");
        self.hold_pending(peer.clone(), link, name_hint);
        Ok(link_id)
    }

    /// Take ownership of a link a remote peer opened to us.
    pub fn accept(&mut self, link: Box<dyn Link>) -> LinkId {
        let peer = link.peer().clone();
        let link_id = link.id().clone();
        debug!(peer = %peer.short(), link = %link_id, "Accepted inbound link");
        self.hold_pending(peer, link, None);
        link_id
    }

    fn hold_pending(&mut self, peer: PeerId, link: Box<dyn Link>, name_hint: Option<String>) {
        let name_hint = name_hint
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if let Some(mut previous) = self.pending.insert(peer, PendingLink { link, name_hint }) {
            previous.link.close();
        }
    }

    /// Apply a link lifecycle event.
    pub fn on_link_event(&mut self, peer: &PeerId, link_id: &LinkId, event: LinkEvent) -> LinkOutcome {
        let is_pending = self
            .pending
            .get(peer)
            .is_some_and(|p| p.link.id() == link_id);
        let is_current = self
            .connections
            .get(peer)
            .is_some_and(|c| c.link.id() == link_id);

        match event {
            LinkEvent::Opened if is_pending => self.promote(peer),
            LinkEvent::Opened | LinkEvent::StateChanged(LinkState::Connected) if is_current => {
                if self.set_status(peer, ConnectionStatus::Connected) {
                    LinkOutcome::Restored
                } else {
                    LinkOutcome::Unchanged
                }
            }
            LinkEvent::StateChanged(LinkState::New | LinkState::Connecting) if is_pending => {
                LinkOutcome::Unchanged
            }
            LinkEvent::Closed | LinkEvent::Error | LinkEvent::StateChanged(_) if is_current => {
                if self.set_status(peer, ConnectionStatus::Disconnected) {
                    info!(peer = %peer.short(), ?event, "Peer disconnected");
                    LinkOutcome::Disconnected
                } else {
                    LinkOutcome::Unchanged
                }
            }
            LinkEvent::Closed | LinkEvent::Error | LinkEvent::StateChanged(_) if is_pending => {
                if let Some(mut pending) = self.pending.remove(peer) {
                    pending.link.close();
                }
                warn!(peer = %peer.short(), ?event, "Link failed before opening");
                LinkOutcome::Abandoned
            }
            _ => {
                debug!(peer = %peer.short(), link = %link_id, ?event, "Ignoring event for stale link");
                LinkOutcome::Stale
            }
        }
    }

    fn promote(&mut self, peer: &PeerId) -> LinkOutcome {
        let Some(PendingLink { link, name_hint }) = self.pending.remove(peer) else {
            return LinkOutcome::Stale;
        };

        match self.connections.get_mut(peer) {
            Some(existing) => {
                let mut old = std::mem::replace(&mut existing.link, link);
                old.close();
                existing.status = ConnectionStatus::Connected;
                if existing.display_name == self.placeholder_name {
                    if let Some(hint) = name_hint {
                        existing.display_name = hint;
                    }
                }
                info!(peer = %peer.short(), "Peer reconnected");
                LinkOutcome::Opened { reconnected: true }
            }
            None => {
                let display_name = name_hint.unwrap_or_else(|| self.placeholder_name.clone());
                self.connections.insert(
                    peer.clone(),
                    Connection {
                        peer_id: peer.clone(),
                        link,
                        status: ConnectionStatus::Connected,
                        display_name,
                    },
                );
                info!(peer = %peer.short(), "Peer connected");
                LinkOutcome::Opened { reconnected: false }
            }
        }
    }

    /// Returns `true` if the status actually changed.
    fn set_status(&mut self, peer: &PeerId, status: ConnectionStatus) -> bool {
        match self.connections.get_mut(peer) {
            Some(conn) if conn.status != status => {
                conn.status = status;
                true
            }
            _ => false,
        }
    }

    /// Mark every connection disconnected, returning the peers that were
    /// connected until now.
    pub fn disconnect_all(&mut self) -> Vec<PeerId> {
        let mut dropped: Vec<PeerId> = self
            .connections
            .values_mut()
            .filter(|c| c.is_connected())
            .map(|c| {
                c.status = ConnectionStatus::Disconnected;
                c.peer_id.clone()
            })
            .collect();
        dropped.sort();
        for mut pending in self.pending.drain().map(|(_, p)| p) {
            pending.link.close();
        }
        if !dropped.is_empty() {
            info!(count = dropped.len(), "Marked all peers disconnected");
        }
        dropped
    }

    /// Record the peer's display name. Returns `true` if it changed.
    pub fn set_display_name(&mut self, peer: &PeerId, name: &str) -> bool {
        match self.connections.get_mut(peer) {
            Some(conn) if conn.display_name != name => {
                conn.display_name = name.to_string();
                true
            }
            _ => false,
        }
    }

    /// Send a payload on the peer's current link.
    pub fn send(&mut self, peer: &PeerId, payload: &Payload) -> Result<(), RegistryError> {
        let conn = self
            .connections
            .get_mut(peer)
            .ok_or_else(|| RegistryError::UnknownPeer(peer.clone()))?;
        if !conn.is_connected() {
            return Err(RegistryError::Disconnected(peer.clone()));
        }
        conn.link.send(payload)?;
        Ok(())
    }

    /// Liveness of a peer; unknown peers are reported as disconnected.
    pub fn status_of(&self, peer: &PeerId) -> ConnectionStatus {
        self.connections
            .get(peer)
            .map(|c| c.status)
            .unwrap_or(ConnectionStatus::Disconnected)
    }

    pub fn is_connected(&self, peer: &PeerId) -> bool {
        self.status_of(peer) == ConnectionStatus::Connected
    }

    /// Whether `link_id` is the link currently serving `peer`.
    pub fn is_current_link(&self, peer: &PeerId, link_id: &LinkId) -> bool {
        self.connections
            .get(peer)
            .is_some_and(|c| c.link.id() == link_id)
    }

    pub fn get(&self, peer: &PeerId) -> Option<&Connection> {
        self.connections.get(peer)
    }

    pub fn display_name(&self, peer: &PeerId) -> Option<&str> {
        self.connections.get(peer).map(|c| c.display_name())
    }

    pub fn is_pending(&self, peer: &PeerId) -> bool {
        self.pending.contains_key(peer)
    }

    /// All known connections, ordered by peer id.
    pub fn connections(&self) -> Vec<&Connection> {
        let mut all: Vec<&Connection> = self.connections.values().collect();
        all.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        all
    }

    pub fn connected_count(&self) -> usize {
        self.connections.values().filter(|c| c.is_connected()).count()
    }

    pub fn placeholder_name(&self) -> &str {
        &self.placeholder_name
    }
}
