use tracing::{debug, info, warn};

use peerpulse_net::{apply_user_info, greet, LinkEvent, LinkOutcome, TransportEvent};
use peerpulse_shared::invite::JoinLink;
use peerpulse_shared::protocol::{ControlMessage, Payload};
use peerpulse_shared::types::{LinkId, MediaKind, PeerId};

use crate::error::EngineError;
use crate::events::{Effect, EngineEvent, TimerKey};
use crate::state::Session;

impl Session {
    /// Open a link to `peer`. `name_hint` is shown until the handshake lands.
    pub fn open(&mut self, peer: &PeerId, name_hint: Option<String>) -> Result<LinkId, EngineError> {
        let link = self
            .registry
            .open(self.transport.as_mut(), peer, name_hint)?;
        info!(peer = %peer.short(), link = %link, "Connecting to peer");
        Ok(link)
    }

    /// Open a link from a share URL or its `connect` parameter.
    pub fn open_join_link(&mut self, input: &str) -> Result<LinkId, EngineError> {
        let JoinLink { peer_id, username } = JoinLink::parse(input)?;
        self.open(&peer_id, Some(username))
    }

    /// Share link announcing our own identity under `origin`.
    pub fn join_link(&self, origin: &str) -> Result<String, EngineError> {
        let link = JoinLink::new(
            self.identity.peer_id().clone(),
            self.identity.display_name(),
        );
        Ok(link.to_url(origin)?)
    }

    /// Feed one event from the transport into the session.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::InboundLink(link) => {
                self.registry.accept(link);
            }
            TransportEvent::LinkOpened { peer, link } => {
                self.on_link_event(&peer, &link, LinkEvent::Opened)
            }
            TransportEvent::LinkClosed { peer, link } => {
                self.on_link_event(&peer, &link, LinkEvent::Closed)
            }
            TransportEvent::LinkError { peer, link, reason } => {
                warn!(peer = %peer.short(), link = %link, %reason, "Link error");
                self.on_link_event(&peer, &link, LinkEvent::Error)
            }
            TransportEvent::LinkStateChanged { peer, link, state } => {
                self.on_link_event(&peer, &link, LinkEvent::StateChanged(state))
            }
            TransportEvent::LinkData { peer, link, text } => self.on_link_data(&peer, &link, &text),
            TransportEvent::InboundCall { peer, kind, call } => self.on_inbound_call(peer, kind, call),
            TransportEvent::CallStream { peer, call, stream } => {
                self.on_call_stream(&peer, &call, stream)
            }
            TransportEvent::CallClosed { peer, call } => self.on_call_closed(&peer, &call),
            TransportEvent::RendezvousLost => {
                warn!("Lost rendezvous service, dropping all peers");
                for peer in self.registry.disconnect_all() {
                    self.on_peer_lost(&peer);
                }
            }
        }
    }

    fn on_link_event(&mut self, peer: &PeerId, link: &LinkId, event: LinkEvent) {
        match self.registry.on_link_event(peer, link, event) {
            LinkOutcome::Opened { reconnected } => {
                if let Err(e) = greet(&mut self.registry, peer, &self.identity) {
                    warn!(peer = %peer.short(), error = %e, "Failed to send USER_INFO");
                }
                let display_name = self
                    .registry
                    .display_name(peer)
                    .unwrap_or(self.registry.placeholder_name())
                    .to_string();
                info!(peer = %peer.short(), name = %display_name, reconnected, "Peer connected");
                self.emit(EngineEvent::PeerConnected {
                    peer: peer.clone(),
                    display_name,
                    reconnected,
                });
            }
            LinkOutcome::Restored => {
                let display_name = self
                    .registry
                    .display_name(peer)
                    .unwrap_or(self.registry.placeholder_name())
                    .to_string();
                info!(peer = %peer.short(), "Peer link restored");
                self.emit(EngineEvent::PeerConnected {
                    peer: peer.clone(),
                    display_name,
                    reconnected: true,
                });
            }
            LinkOutcome::Disconnected => self.on_peer_lost(peer),
            LinkOutcome::Abandoned => {
                info!(peer = %peer.short(), "Link closed before opening");
                self.emit(EngineEvent::ConnectFailed { peer: peer.clone() });
            }
            LinkOutcome::Unchanged => {}
            LinkOutcome::Stale => {
                debug!(peer = %peer.short(), link = %link, "Ignoring event from replaced link");
            }
        }
    }

    /// Everything bound to a peer's link goes down with it.
    fn on_peer_lost(&mut self, peer: &PeerId) {
        info!(peer = %peer.short(), "Peer disconnected");
        self.emit(EngineEvent::PeerDisconnected { peer: peer.clone() });

        if self.presence.set_typing(peer, false) {
            self.emit(EngineEvent::TypingChanged {
                peer: peer.clone(),
                typing: false,
            });
        }
        if self.typing_out.remove(peer).is_some() {
            self.push(Effect::CancelTimer(TimerKey::TypingIdle(peer.clone())));
        }

        self.drop_calls_with(peer);
    }

    fn on_link_data(&mut self, peer: &PeerId, link: &LinkId, text: &str) {
        if !self.registry.is_current_link(peer, link) {
            debug!(peer = %peer.short(), link = %link, "Dropping data from stale link");
            return;
        }

        match Payload::decode(text) {
            Ok(Payload::Control(control)) => self.on_control(peer, control),
            Ok(Payload::Chat(chat)) => self.receive_chat(peer, chat),
            Err(e) => {
                warn!(peer = %peer.short(), error = %e, "Dropping undecodable frame");
            }
        }
    }

    fn on_control(&mut self, peer: &PeerId, control: ControlMessage) {
        match control {
            ControlMessage::UserInfo { username } => {
                if let Some(display_name) = apply_user_info(&mut self.registry, peer, &username) {
                    self.emit(EngineEvent::DisplayNameChanged {
                        peer: peer.clone(),
                        display_name,
                    });
                }
            }
            ControlMessage::TypingStart => self.set_remote_typing(peer, true),
            ControlMessage::TypingEnd => self.set_remote_typing(peer, false),
            ControlMessage::CallRequest => self.on_call_request(peer, MediaKind::Audio),
            ControlMessage::VideoCallRequest => self.on_call_request(peer, MediaKind::Video),
            ControlMessage::CallEnd => self.on_remote_call_end(peer, MediaKind::Audio),
            ControlMessage::VideoCallEnd => self.on_remote_call_end(peer, MediaKind::Video),
        }
    }
}
