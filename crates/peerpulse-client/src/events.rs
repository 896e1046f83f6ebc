use std::time::Duration;

use serde::Serialize;

use peerpulse_media::{CallRole, CallStatus, EndReason, MediaConstraints};
use peerpulse_shared::media::RemoteStream;
use peerpulse_shared::types::{MediaKind, PeerId};
use peerpulse_store::Message;

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    PeerConnected {
        peer: PeerId,
        display_name: String,
        reconnected: bool,
    },
    PeerDisconnected {
        peer: PeerId,
    },
    /// An outbound or inbound link died before it opened.
    ConnectFailed {
        peer: PeerId,
    },
    DisplayNameChanged {
        peer: PeerId,
        display_name: String,
    },
    MessageAppended {
        peer: PeerId,
        message: Message,
    },
    UnreadChanged {
        peer: PeerId,
        count: usize,
    },
    TypingChanged {
        peer: PeerId,
        typing: bool,
    },
    /// An offer is waiting in the mailbox for accept/reject.
    IncomingCall {
        peer: PeerId,
        kind: MediaKind,
    },
    CallStateChanged {
        peer: PeerId,
        kind: MediaKind,
        status: CallStatus,
        role: CallRole,
    },
    CallEnded {
        peer: PeerId,
        kind: MediaKind,
        reason: EndReason,
        duration_secs: Option<u64>,
    },
    RemoteStream {
        peer: PeerId,
        kind: MediaKind,
        stream: RemoteStream,
    },
    MediaFailed {
        peer: PeerId,
        kind: MediaKind,
        error: String,
    },
}

/// Deferred timers owned by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKey {
    Ring(PeerId),
    TypingIdle(PeerId),
}

/// Work the session asks its runtime to carry out after a handler returns.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Emit(EngineEvent),
    /// Fire `timer` with `token` after `after`, replacing any armed instance.
    ArmTimer {
        timer: TimerKey,
        token: u64,
        after: Duration,
    },
    CancelTimer(TimerKey),
    /// Acquire a capture stream and report back with `attempt`.
    AcquireMedia {
        peer: PeerId,
        kind: MediaKind,
        attempt: u64,
        constraints: MediaConstraints,
    },
}
