//! Per-peer call session.
//!
//! One `CallSession` tracks one call attempt with one peer, for either
//! media kind:
//!
//! ```text
//! none -> ringing -> ongoing -> ended -> none
//!            \_______________/^
//! ```
//!
//! The session exclusively owns the local capture stream and the
//! transport call object. Every deferred callback that refers back to a
//! session carries the session's `attempt` token; a callback whose token
//! or expected stage no longer matches is stale and must be dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use peerpulse_net::transport::{CallHandle, TransportError};
use peerpulse_shared::media::{LocalStream, RemoteStream};
use peerpulse_shared::types::{CallId, MediaKind, PeerId};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CallError {
    #[error("Already in a call with {0}")]
    AlreadyInCall(PeerId),

    #[error("Local media is in use by another call")]
    MediaBusy,

    #[error("Peer is not connected: {0}")]
    PeerDisconnected(PeerId),

    #[error("No incoming {kind} call from {peer}")]
    NoIncomingCall { peer: PeerId, kind: MediaKind },

    #[error("No {kind} call with {peer}")]
    NotInCall { peer: PeerId, kind: MediaKind },

    #[error("Video toggle requires a video call")]
    NotVideoCall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    None,
    Ringing,
    Ongoing,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallRole {
    Caller,
    Callee,
}

/// What a ringing call is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingStage {
    /// Caller: waiting for the local capture stream.
    AcquiringMedia,
    /// Caller: call placed, waiting for remote media.
    Dialing,
    /// Callee: waiting for the local user to decide.
    Offered,
    /// Callee: accepted, waiting for the local capture stream.
    Answering,
    /// Callee: answered, waiting for remote media.
    Connecting,
}

/// Why a call left `ringing` or `ongoing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    LocalHangup,
    Rejected,
    RingTimeout,
    RemoteHangup,
    CallClosed,
    /// The transport could not place or answer the call.
    CallFailed,
    LinkLost,
    MediaFailed,
}

impl EndReason {
    /// Whether the peer should be told with a CALL_END message.
    /// The peer already knows when it hung up itself or the link is gone.
    pub fn notifies_peer(&self) -> bool {
        !matches!(self, EndReason::RemoteHangup | EndReason::LinkLost)
    }
}

/// Summary of a finished session, returned by [`CallSession::end`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Teardown {
    pub reason: EndReason,
    pub was_ongoing: bool,
    /// Whether CALL_END should go out. False when the reason says the peer
    /// already knows, or when a caller never got as far as ringing them.
    pub notify_peer: bool,
    /// Whole seconds between `ongoing` and `ended`, when the call got that far.
    pub duration_secs: Option<u64>,
}

#[derive(Debug)]
pub struct CallSession {
    peer: PeerId,
    kind: MediaKind,
    role: CallRole,
    status: CallStatus,
    stage: Option<RingStage>,
    attempt: u64,
    local_stream: Option<Box<dyn LocalStream>>,
    remote_stream: Option<RemoteStream>,
    call: Option<Box<dyn CallHandle>>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    muted: bool,
    video_enabled: bool,
}

impl CallSession {
    fn ringing(peer: PeerId, kind: MediaKind, role: CallRole, stage: RingStage, attempt: u64) -> Self {
        Self {
            peer,
            kind,
            role,
            status: CallStatus::Ringing,
            stage: Some(stage),
            attempt,
            local_stream: None,
            remote_stream: None,
            call: None,
            started_at: None,
            ended_at: None,
            muted: false,
            video_enabled: kind == MediaKind::Video,
        }
    }

    /// A call we are placing; local media has been requested.
    pub fn outgoing(peer: PeerId, kind: MediaKind, attempt: u64) -> Self {
        debug!(peer = %peer.short(), %kind, attempt, "Outgoing call ringing");
        Self::ringing(peer, kind, CallRole::Caller, RingStage::AcquiringMedia, attempt)
    }

    /// A call offered to us; nothing is acquired until the user accepts.
    pub fn incoming(peer: PeerId, kind: MediaKind, attempt: u64) -> Self {
        debug!(peer = %peer.short(), %kind, attempt, "Incoming call ringing");
        Self::ringing(peer, kind, CallRole::Callee, RingStage::Offered, attempt)
    }

    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn role(&self) -> CallRole {
        self.role
    }

    pub fn status(&self) -> CallStatus {
        self.status
    }

    pub fn stage(&self) -> Option<RingStage> {
        self.stage
    }

    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn remote_stream(&self) -> Option<&RemoteStream> {
        self.remote_stream.as_ref()
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_video_enabled(&self) -> bool {
        self.video_enabled
    }

    pub(crate) fn local_stream_mut(&mut self) -> Option<&mut Box<dyn LocalStream>> {
        self.local_stream.as_mut()
    }

    pub(crate) fn set_video_flag(&mut self, enabled: bool) {
        self.video_enabled = enabled;
    }

    /// Whether this session holds the local capture device, or is about to.
    pub fn holds_media(&self) -> bool {
        self.local_stream.is_some()
            || matches!(
                self.stage,
                Some(RingStage::AcquiringMedia | RingStage::Answering)
            )
    }

    pub fn is_waiting_for_media(&self) -> bool {
        matches!(
            self.stage,
            Some(RingStage::AcquiringMedia | RingStage::Answering)
        )
    }

    pub fn owns_call(&self, call_id: &CallId) -> bool {
        self.call.as_ref().is_some_and(|c| c.id() == call_id)
    }

    /// Caller: local media arrived and the outbound call has been placed.
    pub fn dialing(&mut self, mut stream: Box<dyn LocalStream>, call: Box<dyn CallHandle>) {
        debug!(peer = %self.peer.short(), call = %call.id(), "Call placed");
        self.apply_track_flags(&mut *stream);
        self.local_stream = Some(stream);
        self.call = Some(call);
        self.stage = Some(RingStage::Dialing);
    }

    /// Callee: the user accepted; the offered call object moves in here.
    pub fn accepting(&mut self, call: Box<dyn CallHandle>) {
        debug!(peer = %self.peer.short(), call = %call.id(), "Call accepted, acquiring media");
        self.call = Some(call);
        self.stage = Some(RingStage::Answering);
    }

    /// Callee: answer the accepted call with the freshly captured stream.
    ///
    /// The stream is kept even if answering fails so teardown releases it.
    pub fn answer(&mut self, mut stream: Box<dyn LocalStream>) -> Result<(), TransportError> {
        self.apply_track_flags(&mut *stream);
        let result = match self.call.as_mut() {
            Some(call) => call.answer(&*stream),
            None => Err(TransportError::Call("no call object to answer".into())),
        };
        self.local_stream = Some(stream);
        if result.is_ok() {
            self.stage = Some(RingStage::Connecting);
            debug!(peer = %self.peer.short(), "Call answered, waiting for remote media");
        }
        result
    }

    /// Toggles made while media was still being acquired carry over to
    /// the new stream.
    fn apply_track_flags(&self, stream: &mut dyn LocalStream) {
        stream.set_audio_enabled(!self.muted);
        if self.kind == MediaKind::Video {
            stream.set_video_enabled(self.video_enabled);
        }
    }

    /// Remote media arrived. Returns `true` when this moved the call to
    /// `ongoing`; a repeated stream on an ongoing call only replaces the
    /// handle.
    pub fn remote_stream_arrived(&mut self, stream: RemoteStream, now: DateTime<Utc>) -> bool {
        match (self.status, self.stage) {
            (CallStatus::Ringing, Some(RingStage::Dialing | RingStage::Connecting)) => {
                self.remote_stream = Some(stream);
                self.status = CallStatus::Ongoing;
                self.stage = None;
                self.started_at = Some(now);
                info!(peer = %self.peer.short(), kind = %self.kind, "Call ongoing");
                true
            }
            (CallStatus::Ongoing, _) => {
                self.remote_stream = Some(stream);
                false
            }
            _ => {
                warn!(
                    peer = %self.peer.short(),
                    status = ?self.status,
                    stage = ?self.stage,
                    "Remote stream in unexpected stage, ignoring"
                );
                false
            }
        }
    }

    /// Mute or unmute the local audio tracks.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if let Some(stream) = self.local_stream.as_mut() {
            stream.set_audio_enabled(!muted);
        }
        debug!(peer = %self.peer.short(), muted, "Mute state changed");
    }

    /// Tear the session down: stop local tracks, then close the call
    /// object. Idempotent; a second call returns the same summary with
    /// nothing left to release.
    pub fn end(&mut self, reason: EndReason, now: DateTime<Utc>) -> Teardown {
        let was_ongoing = self.status == CallStatus::Ongoing;
        let peer_unaware =
            self.role == CallRole::Caller && self.stage == Some(RingStage::AcquiringMedia);

        if let Some(mut stream) = self.local_stream.take() {
            stream.stop();
        }
        if let Some(mut call) = self.call.take() {
            call.close();
        }
        self.remote_stream = None;
        self.stage = None;

        if self.status != CallStatus::Ended {
            self.status = CallStatus::Ended;
            self.ended_at = Some(now);
            info!(peer = %self.peer.short(), kind = %self.kind, ?reason, "Call ended");
        }

        let duration_secs = match (was_ongoing, self.started_at, self.ended_at) {
            (true, Some(start), Some(end)) => Some((end - start).num_seconds().max(0) as u64),
            _ => None,
        };

        Teardown {
            reason,
            was_ongoing,
            notify_peer: reason.notifies_peer() && !peer_unaware,
            duration_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default, Clone)]
    struct Flags {
        stopped: Arc<Mutex<bool>>,
        audio: Arc<Mutex<bool>>,
        closed: Arc<Mutex<bool>>,
        answered: Arc<Mutex<bool>>,
    }

    #[derive(Debug)]
    struct TestStream(Flags);

    impl LocalStream for TestStream {
        fn id(&self) -> &str {
            "local"
        }
        fn has_video(&self) -> bool {
            false
        }
        fn set_audio_enabled(&mut self, enabled: bool) {
            *self.0.audio.lock().unwrap() = enabled;
        }
        fn set_video_enabled(&mut self, _enabled: bool) {}
        fn stop(&mut self) {
            *self.0.stopped.lock().unwrap() = true;
        }
    }

    #[derive(Debug)]
    struct TestCall(CallId, PeerId, Flags);

    impl CallHandle for TestCall {
        fn id(&self) -> &CallId {
            &self.0
        }
        fn peer(&self) -> &PeerId {
            &self.1
        }
        fn answer(&mut self, _stream: &dyn LocalStream) -> Result<(), TransportError> {
            *self.2.answered.lock().unwrap() = true;
            Ok(())
        }
        fn close(&mut self) {
            *self.2.closed.lock().unwrap() = true;
        }
    }

    fn parts(flags: &Flags) -> (Box<dyn LocalStream>, Box<dyn CallHandle>) {
        (
            Box::new(TestStream(flags.clone())),
            Box::new(TestCall(CallId::new("c-1"), PeerId::from("bob"), flags.clone())),
        )
    }

    #[test]
    fn test_caller_lifecycle_records_duration() {
        let flags = Flags::default();
        let (stream, call) = parts(&flags);
        let mut session = CallSession::outgoing(PeerId::from("bob"), MediaKind::Audio, 1);
        assert!(session.holds_media());
        assert!(session.is_waiting_for_media());

        session.dialing(stream, call);
        assert_eq!(session.stage(), Some(RingStage::Dialing));
        assert!(session.owns_call(&CallId::new("c-1")));

        let start = Utc::now();
        assert!(session.remote_stream_arrived(RemoteStream::new("r", false), start));
        assert_eq!(session.status(), CallStatus::Ongoing);
        assert!(!session.remote_stream_arrived(RemoteStream::new("r2", false), start));

        let teardown = session.end(EndReason::LocalHangup, start + Duration::milliseconds(65_900));
        assert_eq!(teardown.duration_secs, Some(65));
        assert!(teardown.was_ongoing);
        assert_eq!(session.status(), CallStatus::Ended);
        assert!(*flags.stopped.lock().unwrap());
        assert!(*flags.closed.lock().unwrap());
        assert!(!session.holds_media());
    }

    #[test]
    fn test_callee_must_answer_before_ongoing() {
        let flags = Flags::default();
        let (stream, call) = parts(&flags);
        let mut session = CallSession::incoming(PeerId::from("bob"), MediaKind::Audio, 7);
        assert!(!session.holds_media());

        // remote media before the user accepted is not a transition
        assert!(!session.remote_stream_arrived(RemoteStream::new("r", false), Utc::now()));
        assert_eq!(session.status(), CallStatus::Ringing);

        session.accepting(call);
        assert!(session.holds_media());
        session.answer(stream).unwrap();
        assert!(*flags.answered.lock().unwrap());
        assert_eq!(session.stage(), Some(RingStage::Connecting));

        assert!(session.remote_stream_arrived(RemoteStream::new("r", false), Utc::now()));
        assert_eq!(session.role(), CallRole::Callee);
    }

    #[test]
    fn test_end_from_ringing_has_no_duration() {
        let flags = Flags::default();
        let (stream, call) = parts(&flags);
        let mut session = CallSession::outgoing(PeerId::from("bob"), MediaKind::Audio, 1);
        session.dialing(stream, call);

        let teardown = session.end(EndReason::RingTimeout, Utc::now());
        assert!(!teardown.was_ongoing);
        assert_eq!(teardown.duration_secs, None);
        assert!(*flags.stopped.lock().unwrap());
    }

    #[test]
    fn test_caller_still_acquiring_media_does_not_notify() {
        let mut session = CallSession::outgoing(PeerId::from("bob"), MediaKind::Audio, 1);
        let teardown = session.end(EndReason::MediaFailed, Utc::now());
        assert!(!teardown.notify_peer);

        let mut callee = CallSession::incoming(PeerId::from("bob"), MediaKind::Audio, 2);
        let flags = Flags::default();
        let (_, call) = parts(&flags);
        callee.accepting(call);
        assert!(callee.end(EndReason::MediaFailed, Utc::now()).notify_peer);
    }

    #[test]
    fn test_end_is_idempotent() {
        let mut session = CallSession::incoming(PeerId::from("bob"), MediaKind::Video, 3);
        let first_end = Utc::now();
        session.end(EndReason::Rejected, first_end);
        session.end(EndReason::LinkLost, first_end + Duration::seconds(5));
        assert_eq!(session.ended_at(), Some(first_end));
    }

    #[test]
    fn test_mute_before_answer_reaches_the_stream() {
        let flags = Flags::default();
        *flags.audio.lock().unwrap() = true;
        let (stream, call) = parts(&flags);
        let mut session = CallSession::incoming(PeerId::from("bob"), MediaKind::Audio, 4);
        session.accepting(call);

        session.set_muted(true);
        session.answer(stream).unwrap();
        assert!(!*flags.audio.lock().unwrap());
    }

    #[test]
    fn test_mute_flips_audio_tracks() {
        let flags = Flags::default();
        let (stream, call) = parts(&flags);
        let mut session = CallSession::outgoing(PeerId::from("bob"), MediaKind::Audio, 1);
        session.dialing(stream, call);

        session.set_muted(true);
        assert!(session.is_muted());
        assert!(!*flags.audio.lock().unwrap());
        session.set_muted(false);
        assert!(*flags.audio.lock().unwrap());
    }

    #[test]
    fn test_end_reason_notification() {
        assert!(EndReason::LocalHangup.notifies_peer());
        assert!(EndReason::RingTimeout.notifies_peer());
        assert!(!EndReason::RemoteHangup.notifies_peer());
        assert!(!EndReason::LinkLost.notifies_peer());
    }
}
