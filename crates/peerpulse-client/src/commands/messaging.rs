use tracing::{debug, warn};

use peerpulse_shared::protocol::{ChatPayload, ControlMessage, Payload};
use peerpulse_shared::types::PeerId;
use peerpulse_store::Message;

use crate::error::EngineError;
use crate::events::{Effect, EngineEvent, TimerKey};
use crate::state::Session;

impl Session {
    /// Send a chat message to a connected peer and append it to the log.
    pub fn send_message(&mut self, peer: &PeerId, content: &str) -> Result<Message, EngineError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(EngineError::EmptyMessage);
        }
        self.require_connected(peer)?;

        let message = Message::text(self.identity.peer_id().clone(), content, self.clock.now());
        self.registry.send(peer, &Payload::Chat(message.to_chat()))?;
        debug!(peer = %peer.short(), id = %message.id, "Message sent");

        let message = self.record(peer, message);
        self.stop_typing(peer);
        Ok(message)
    }

    /// The local user pressed a key in `peer`'s conversation.
    ///
    /// TYPING_START goes out on the first keystroke only; each keystroke
    /// pushes the idle deadline back.
    pub fn notify_typing(&mut self, peer: &PeerId) -> Result<(), EngineError> {
        self.require_connected(peer)?;

        if !self.typing_out.contains_key(peer) {
            self.registry
                .send(peer, &Payload::Control(ControlMessage::TypingStart))?;
        }

        let token = self.next_token();
        self.typing_out.insert(peer.clone(), token);
        self.push(Effect::ArmTimer {
            timer: TimerKey::TypingIdle(peer.clone()),
            token,
            after: self.config.typing_idle,
        });
        Ok(())
    }

    /// Focus a conversation (or none). Focusing clears its unread count.
    pub fn set_active_chat(&mut self, peer: Option<PeerId>) {
        let had_unread = peer
            .as_ref()
            .map(|p| self.presence.unread(p) > 0)
            .unwrap_or(false);
        self.presence.set_active_chat(peer.clone());
        if let (Some(peer), true) = (peer, had_unread) {
            self.emit(EngineEvent::UnreadChanged { peer, count: 0 });
        }
    }

    pub(crate) fn on_typing_idle(&mut self, peer: &PeerId, token: u64) {
        if self.typing_out.get(peer) != Some(&token) {
            debug!(peer = %peer.short(), token, "Ignoring stale typing timer");
            return;
        }
        self.typing_out.remove(peer);
        self.send_best_effort(peer, ControlMessage::TypingEnd);
    }

    /// Sending a message ends the typing indicator immediately.
    fn stop_typing(&mut self, peer: &PeerId) {
        if self.typing_out.remove(peer).is_some() {
            self.push(Effect::CancelTimer(TimerKey::TypingIdle(peer.clone())));
        }
        self.send_best_effort(peer, ControlMessage::TypingEnd);
    }

    pub(crate) fn receive_chat(&mut self, peer: &PeerId, chat: ChatPayload) {
        let mut message = Message::from_chat(chat);
        if message.sender != *peer {
            debug!(peer = %peer.short(), claimed = %message.sender, "Attributing message to link peer");
            message.sender = peer.clone();
        }

        self.set_remote_typing(peer, false);
        self.record(peer, message);

        if let Some(count) = self.presence.record_incoming(peer) {
            self.emit(EngineEvent::UnreadChanged {
                peer: peer.clone(),
                count,
            });
        }
    }

    pub(crate) fn set_remote_typing(&mut self, peer: &PeerId, typing: bool) {
        if self.presence.set_typing(peer, typing) {
            self.emit(EngineEvent::TypingChanged {
                peer: peer.clone(),
                typing,
            });
        }
    }

    /// Send a control message, logging instead of failing when the link is down.
    pub(crate) fn send_best_effort(&mut self, peer: &PeerId, control: ControlMessage) {
        if !self.registry.is_connected(peer) {
            return;
        }
        if let Err(e) = self.registry.send(peer, &Payload::Control(control)) {
            warn!(peer = %peer.short(), error = %e, "Failed to send control message");
        }
    }
}
