//! Voice and video call handlers.
//!
//! A peer has at most one live call, of either kind, and the local
//! capture device belongs to at most one call at a time. Ending a call
//! always goes through [`Session::finish_call`], which releases tracks
//! before closing the call object and only then tells the peer.

use tracing::{debug, info, warn};

use peerpulse_media::{
    CallError, CallRole, CallSession, CallStatus, EndReason, IncomingCallRequest,
    MediaConstraints, MediaError, RingStage,
};
use peerpulse_net::CallHandle;
use peerpulse_shared::media::{LocalStream, RemoteStream};
use peerpulse_shared::protocol::ControlMessage;
use peerpulse_shared::types::{CallId, MediaKind, PeerId};
use peerpulse_store::Message;

use crate::error::EngineError;
use crate::events::{Effect, EngineEvent, TimerKey};
use crate::state::Session;

impl Session {
    /// Call a connected peer. Local media is requested first; the call is
    /// placed once it arrives.
    pub fn start_call(&mut self, peer: &PeerId, kind: MediaKind) -> Result<(), EngineError> {
        if !self.registry.is_connected(peer) {
            return Err(CallError::PeerDisconnected(peer.clone()).into());
        }
        if self.calls.contains_key(peer) {
            return Err(CallError::AlreadyInCall(peer.clone()).into());
        }
        if self.media_in_use() {
            return Err(CallError::MediaBusy.into());
        }

        let attempt = self.next_token();
        self.calls
            .insert(peer.clone(), CallSession::outgoing(peer.clone(), kind, attempt));
        info!(peer = %peer.short(), %kind, "Starting call");

        self.announce(peer, kind, CallStatus::Ringing, CallRole::Caller);
        self.push(Effect::AcquireMedia {
            peer: peer.clone(),
            kind,
            attempt,
            constraints: MediaConstraints::for_kind(kind),
        });
        Ok(())
    }

    /// Accept the offer held for `peer`. The call stays `ringing` until
    /// remote media arrives.
    pub fn accept_call(&mut self, peer: &PeerId, kind: MediaKind) -> Result<(), EngineError> {
        if !self.is_offered(peer, kind) || !self.mailbox.contains(peer, kind) {
            return Err(CallError::NoIncomingCall {
                peer: peer.clone(),
                kind,
            }
            .into());
        }
        if !self.registry.is_connected(peer) {
            return Err(CallError::PeerDisconnected(peer.clone()).into());
        }
        if self.media_in_use() {
            return Err(CallError::MediaBusy.into());
        }

        let (Some(request), Some(session)) =
            (self.mailbox.take(peer, kind), self.calls.get_mut(peer))
        else {
            return Err(CallError::NoIncomingCall {
                peer: peer.clone(),
                kind,
            }
            .into());
        };
        session.accepting(request.call);
        let attempt = session.attempt();
        info!(peer = %peer.short(), %kind, "Accepted incoming call");

        self.push(Effect::CancelTimer(TimerKey::Ring(peer.clone())));
        self.push(Effect::AcquireMedia {
            peer: peer.clone(),
            kind,
            attempt,
            constraints: MediaConstraints::for_kind(kind),
        });
        Ok(())
    }

    /// Decline the offer held for `peer`.
    pub fn reject_call(&mut self, peer: &PeerId, kind: MediaKind) -> Result<(), EngineError> {
        if !self.is_offered(peer, kind) {
            return Err(CallError::NoIncomingCall {
                peer: peer.clone(),
                kind,
            }
            .into());
        }
        info!(peer = %peer.short(), %kind, "Rejected incoming call");
        self.finish_call(peer, EndReason::Rejected);
        Ok(())
    }

    /// Hang up the `kind` call with `peer`, ringing or ongoing.
    pub fn end_call(&mut self, peer: &PeerId, kind: MediaKind) -> Result<(), EngineError> {
        let stage = match self.calls.get(peer) {
            Some(s) if s.kind() == kind => s.stage(),
            _ => {
                return Err(CallError::NotInCall {
                    peer: peer.clone(),
                    kind,
                }
                .into())
            }
        };
        let reason = match stage {
            Some(RingStage::Offered) => EndReason::Rejected,
            _ => EndReason::LocalHangup,
        };
        self.finish_call(peer, reason);
        Ok(())
    }

    pub fn set_muted(&mut self, peer: &PeerId, kind: MediaKind, muted: bool) -> Result<(), EngineError> {
        match self.calls.get_mut(peer) {
            Some(session) if session.kind() == kind => {
                session.set_muted(muted);
                Ok(())
            }
            _ => Err(CallError::NotInCall {
                peer: peer.clone(),
                kind,
            }
            .into()),
        }
    }

    pub fn set_video_enabled(&mut self, peer: &PeerId, enabled: bool) -> Result<(), EngineError> {
        let session = self.calls.get_mut(peer).ok_or_else(|| CallError::NotInCall {
            peer: peer.clone(),
            kind: MediaKind::Video,
        })?;
        session.set_video_enabled(enabled)?;
        Ok(())
    }

    /// Completion of an `AcquireMedia` effect.
    ///
    /// A stream for a session that has moved on is stopped immediately.
    pub fn on_media_ready(
        &mut self,
        peer: &PeerId,
        kind: MediaKind,
        attempt: u64,
        result: Result<Box<dyn LocalStream>, MediaError>,
    ) {
        let role = self
            .calls
            .get(peer)
            .filter(|s| s.attempt() == attempt && s.kind() == kind && s.is_waiting_for_media())
            .map(|s| s.role());
        let Some(role) = role else {
            debug!(peer = %peer.short(), attempt, "Discarding media for a call that moved on");
            if let Ok(mut stream) = result {
                stream.stop();
            }
            return;
        };

        match result {
            Ok(stream) => match role {
                CallRole::Caller => self.place_call(peer, kind, stream),
                CallRole::Callee => self.answer_call(peer, stream),
            },
            Err(e) => {
                warn!(peer = %peer.short(), %kind, error = %e, "Could not acquire local media");
                self.emit(EngineEvent::MediaFailed {
                    peer: peer.clone(),
                    kind,
                    error: e.to_string(),
                });
                self.finish_call(peer, EndReason::MediaFailed);
            }
        }
    }

    /// A deferred timer fired. Tokens that no longer match are ignored.
    pub fn on_timer(&mut self, timer: TimerKey, token: u64) {
        match timer {
            TimerKey::Ring(peer) => self.on_ring_timeout(&peer, token),
            TimerKey::TypingIdle(peer) => self.on_typing_idle(&peer, token),
        }
    }

    fn on_ring_timeout(&mut self, peer: &PeerId, token: u64) {
        let expired = self.calls.get(peer).is_some_and(|s| {
            s.attempt() == token
                && s.status() == CallStatus::Ringing
                && matches!(s.stage(), Some(RingStage::Dialing | RingStage::Offered))
        });
        if !expired {
            debug!(peer = %peer.short(), token, "Ignoring stale ring timer");
            return;
        }
        info!(peer = %peer.short(), "Call was not answered in time");
        self.finish_call(peer, EndReason::RingTimeout);
    }

    fn place_call(&mut self, peer: &PeerId, kind: MediaKind, mut stream: Box<dyn LocalStream>) {
        if !self.registry.is_connected(peer) {
            stream.stop();
            self.finish_call(peer, EndReason::LinkLost);
            return;
        }

        let call = match self.transport.call(peer, kind, &*stream) {
            Ok(call) => call,
            Err(e) => {
                warn!(peer = %peer.short(), error = %e, "Failed to place call");
                stream.stop();
                self.finish_call(peer, EndReason::CallFailed);
                return;
            }
        };

        let Some(session) = self.calls.get_mut(peer) else {
            stream.stop();
            return;
        };
        session.dialing(stream, call);
        let attempt = session.attempt();

        self.send_best_effort(peer, ControlMessage::call_request(kind));
        self.push(Effect::ArmTimer {
            timer: TimerKey::Ring(peer.clone()),
            token: attempt,
            after: self.config.ring_timeout,
        });
    }

    fn answer_call(&mut self, peer: &PeerId, mut stream: Box<dyn LocalStream>) {
        let Some(session) = self.calls.get_mut(peer) else {
            stream.stop();
            return;
        };
        if let Err(e) = session.answer(stream) {
            warn!(peer = %peer.short(), error = %e, "Failed to answer call");
            self.finish_call(peer, EndReason::CallFailed);
        }
    }

    pub(crate) fn on_inbound_call(&mut self, peer: PeerId, kind: MediaKind, mut call: Box<dyn CallHandle>) {
        let existing = self.calls.get(&peer).map(|s| (s.kind(), s.stage()));
        match existing {
            Some((held, Some(RingStage::Offered))) if held == kind => {}
            Some(_) => {
                warn!(peer = %peer.short(), %kind, "Refusing offer while a call with this peer is active");
                call.close();
                return;
            }
            None if !self.registry.is_connected(&peer) => {
                warn!(peer = %peer.short(), %kind, "Refusing offer from a peer without an open link");
                call.close();
                return;
            }
            None => self.begin_incoming(&peer, kind),
        }

        let request = IncomingCallRequest {
            peer: peer.clone(),
            kind,
            call,
            received_at: self.clock.now(),
        };
        if let Some(mut displaced) = self.mailbox.deposit(request) {
            info!(peer = %peer.short(), %kind, "Newer offer replaces the held one");
            displaced.call.close();
        }
        self.emit(EngineEvent::IncomingCall { peer, kind });
    }

    /// CALL_REQUEST / VIDEO_CALL_REQUEST: the peer is about to ring us.
    pub(crate) fn on_call_request(&mut self, peer: &PeerId, kind: MediaKind) {
        if self.calls.contains_key(peer) {
            debug!(peer = %peer.short(), %kind, "Call request for an already tracked call");
            return;
        }
        self.begin_incoming(peer, kind);
    }

    /// CALL_END / VIDEO_CALL_END from the peer.
    pub(crate) fn on_remote_call_end(&mut self, peer: &PeerId, kind: MediaKind) {
        match self.calls.get(peer) {
            Some(s) if s.kind() == kind => {
                info!(peer = %peer.short(), %kind, "Peer ended the call");
                self.finish_call(peer, EndReason::RemoteHangup);
            }
            _ => debug!(peer = %peer.short(), %kind, "Call end for no matching call"),
        }
    }

    pub(crate) fn on_call_stream(&mut self, peer: &PeerId, call: &CallId, stream: RemoteStream) {
        let owned = self.calls.get(peer).is_some_and(|s| s.owns_call(call));
        if !owned {
            debug!(peer = %peer.short(), call = %call, "Ignoring stream for an unknown call");
            return;
        }
        if !self.registry.is_connected(peer) {
            warn!(peer = %peer.short(), "Remote media arrived after the link dropped");
            self.finish_call(peer, EndReason::LinkLost);
            return;
        }

        let now = self.clock.now();
        let Some(session) = self.calls.get_mut(peer) else {
            return;
        };
        let started = session.remote_stream_arrived(stream.clone(), now);
        let (kind, role, status) = (session.kind(), session.role(), session.status());

        if started {
            self.push(Effect::CancelTimer(TimerKey::Ring(peer.clone())));
            let note = Message::call_started(self.identity.peer_id().clone(), kind, now);
            self.record(peer, note);
            self.announce(peer, kind, CallStatus::Ongoing, role);
        }
        if status == CallStatus::Ongoing {
            self.emit(EngineEvent::RemoteStream {
                peer: peer.clone(),
                kind,
                stream,
            });
        }
    }

    pub(crate) fn on_call_closed(&mut self, peer: &PeerId, call: &CallId) {
        if self.calls.get(peer).is_some_and(|s| s.owns_call(call)) {
            info!(peer = %peer.short(), call = %call, "Call object closed");
            self.finish_call(peer, EndReason::CallClosed);
            return;
        }

        let withdrawn = [MediaKind::Audio, MediaKind::Video].into_iter().find(|kind| {
            self.mailbox
                .get(peer, *kind)
                .is_some_and(|r| r.call.id() == call)
        });
        match withdrawn {
            Some(kind) => {
                info!(peer = %peer.short(), %kind, "Caller withdrew the offer");
                if self.is_offered(peer, kind) {
                    self.finish_call(peer, EndReason::RemoteHangup);
                } else if let Some(mut request) = self.mailbox.take(peer, kind) {
                    request.call.close();
                }
            }
            None => debug!(peer = %peer.short(), call = %call, "Close for an unknown call"),
        }
    }

    /// End every call and offer bound to a peer whose link is gone.
    pub(crate) fn drop_calls_with(&mut self, peer: &PeerId) {
        self.finish_call(peer, EndReason::LinkLost);
        for mut request in self.mailbox.discard_peer(peer) {
            request.call.close();
        }
    }

    /// Tear down the peer's call: tracks, call object, ring timer, then the
    /// CALL_END notification when the peer knows about the call. A no-op
    /// when there is no call.
    pub(crate) fn finish_call(&mut self, peer: &PeerId, reason: EndReason) {
        let Some(mut session) = self.calls.remove(peer) else {
            return;
        };
        let (kind, role) = (session.kind(), session.role());
        let now = self.clock.now();
        let teardown = session.end(reason, now);

        self.push(Effect::CancelTimer(TimerKey::Ring(peer.clone())));
        if let Some(mut request) = self.mailbox.take(peer, kind) {
            request.call.close();
        }
        if teardown.notify_peer {
            self.send_best_effort(peer, ControlMessage::call_end(kind));
        }

        if let Some(duration) = teardown.duration_secs {
            let note = Message::call_ended(self.identity.peer_id().clone(), kind, duration, now);
            self.record(peer, note);
        }
        self.announce(peer, kind, CallStatus::Ended, role);
        self.emit(EngineEvent::CallEnded {
            peer: peer.clone(),
            kind,
            reason,
            duration_secs: teardown.duration_secs,
        });
        self.announce(peer, kind, CallStatus::None, role);
    }

    fn begin_incoming(&mut self, peer: &PeerId, kind: MediaKind) {
        let attempt = self.next_token();
        self.calls
            .insert(peer.clone(), CallSession::incoming(peer.clone(), kind, attempt));
        self.announce(peer, kind, CallStatus::Ringing, CallRole::Callee);
        self.push(Effect::ArmTimer {
            timer: TimerKey::Ring(peer.clone()),
            token: attempt,
            after: self.config.ring_timeout,
        });
    }

    fn is_offered(&self, peer: &PeerId, kind: MediaKind) -> bool {
        self.calls
            .get(peer)
            .is_some_and(|s| s.kind() == kind && s.stage() == Some(RingStage::Offered))
    }

    fn media_in_use(&self) -> bool {
        self.calls.values().any(CallSession::holds_media)
    }

    fn announce(&mut self, peer: &PeerId, kind: MediaKind, status: CallStatus, role: CallRole) {
        self.emit(EngineEvent::CallStateChanged {
            peer: peer.clone(),
            kind,
            status,
            role,
        });
    }
}
