//! Session state owned by one running engine.
//!
//! [`Session`] is a synchronous state machine: every handler mutates state
//! in place and queues [`Effect`]s describing the asynchronous work that
//! follows (timers, media acquisition, notifications). The runtime in
//! [`crate::bridge`] drains and executes them after each handler; tests
//! drain them directly.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use peerpulse_media::{CallSession, CallStatus, Mailbox};
use peerpulse_net::{Connection, ConnectionRegistry, Transport};
use peerpulse_shared::identity::LocalIdentity;
use peerpulse_shared::types::{ConnectionStatus, MediaKind, PeerId};
use peerpulse_store::{Message, MessageLog, Presence};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{Effect, EngineEvent};

/// Sidebar row for one known peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerSummary {
    pub peer: PeerId,
    pub display_name: String,
    pub status: ConnectionStatus,
    pub unread: usize,
    pub typing: bool,
}

pub struct Session {
    pub(crate) identity: LocalIdentity,
    pub(crate) config: EngineConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) registry: ConnectionRegistry,
    pub(crate) log: MessageLog,
    pub(crate) presence: Presence,
    /// At most one live call per peer, of either kind.
    pub(crate) calls: HashMap<PeerId, CallSession>,
    pub(crate) mailbox: Mailbox,
    /// Peers we are currently shown as typing to, with the armed idle token.
    pub(crate) typing_out: HashMap<PeerId, u64>,
    next_token: u64,
    effects: Vec<Effect>,
}

impl Session {
    pub fn new(
        transport: Box<dyn Transport>,
        display_name: &str,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        let identity = LocalIdentity::new(transport.local_id(), display_name)?;
        tracing::info!(
            peer = %identity.peer_id().short(),
            name = %identity.display_name(),
            "Session created"
        );
        Ok(Self {
            identity,
            registry: ConnectionRegistry::new(config.placeholder_name.clone()),
            config,
            clock,
            transport,
            log: MessageLog::new(),
            presence: Presence::new(),
            calls: HashMap::new(),
            mailbox: Mailbox::new(),
            typing_out: HashMap::new(),
            next_token: 0,
            effects: Vec::new(),
        })
    }

    pub fn identity(&self) -> &LocalIdentity {
        &self.identity
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Take every effect queued since the last drain, in order.
    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    // -- queries --

    pub fn connection(&self, peer: &PeerId) -> Option<&Connection> {
        self.registry.get(peer)
    }

    pub fn status_of(&self, peer: &PeerId) -> ConnectionStatus {
        self.registry.status_of(peer)
    }

    pub fn history(&self, peer: &PeerId) -> &[Message] {
        self.log.history(peer)
    }

    pub fn unread(&self, peer: &PeerId) -> usize {
        self.presence.unread(peer)
    }

    pub fn total_unread(&self) -> usize {
        self.presence.total_unread()
    }

    pub fn active_chat(&self) -> Option<&PeerId> {
        self.presence.active_chat()
    }

    /// Whether `peer` is currently typing to us.
    pub fn is_peer_typing(&self, peer: &PeerId) -> bool {
        self.presence.is_typing(peer)
    }

    /// Whether we are currently shown as typing to `peer`.
    pub fn is_typing_to(&self, peer: &PeerId) -> bool {
        self.typing_out.contains_key(peer)
    }

    pub fn call(&self, peer: &PeerId) -> Option<&CallSession> {
        self.calls.get(peer)
    }

    /// Status of the `kind` call with `peer`; `none` when there is none.
    pub fn call_status(&self, peer: &PeerId, kind: MediaKind) -> CallStatus {
        self.calls
            .get(peer)
            .filter(|s| s.kind() == kind)
            .map(|s| s.status())
            .unwrap_or(CallStatus::None)
    }

    /// Offers waiting for accept/reject, oldest first.
    pub fn incoming_calls(&self) -> Vec<(PeerId, MediaKind)> {
        self.mailbox
            .pending()
            .into_iter()
            .map(|(peer, kind)| (peer.clone(), kind))
            .collect()
    }

    pub fn peers(&self) -> Vec<PeerSummary> {
        self.registry
            .connections()
            .into_iter()
            .map(|c| PeerSummary {
                peer: c.peer_id().clone(),
                display_name: c.display_name().to_string(),
                status: c.status(),
                unread: self.presence.unread(c.peer_id()),
                typing: self.presence.is_typing(c.peer_id()),
            })
            .collect()
    }

    // -- internals shared by the command modules --

    pub(crate) fn next_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    pub(crate) fn push(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub(crate) fn emit(&mut self, event: EngineEvent) {
        self.effects.push(Effect::Emit(event));
    }

    /// Append to the peer's log and announce it.
    pub(crate) fn record(&mut self, peer: &PeerId, message: Message) -> Message {
        let appended = self.log.append(peer, message).clone();
        self.emit(EngineEvent::MessageAppended {
            peer: peer.clone(),
            message: appended.clone(),
        });
        appended
    }

    pub(crate) fn require_connected(&self, peer: &PeerId) -> Result<(), EngineError> {
        match self.registry.get(peer) {
            None => Err(EngineError::UnknownPeer(peer.clone())),
            Some(c) if !c.is_connected() => Err(EngineError::PeerDisconnected(peer.clone())),
            Some(_) => Ok(()),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("peer", self.identity.peer_id())
            .field("connections", &self.registry.connections().len())
            .field("calls", &self.calls.len())
            .field("pending_effects", &self.effects.len())
            .finish()
    }
}
