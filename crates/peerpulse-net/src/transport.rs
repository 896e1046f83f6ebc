//! Boundary to the real-time transport.
//!
//! Connection establishment, NAT traversal and media negotiation happen
//! outside this workspace. An adapter implements [`Transport`], [`Link`]
//! and [`CallHandle`] and feeds everything the transport observes back in
//! as [`TransportEvent`]s.

use thiserror::Error;

use peerpulse_shared::error::ProtocolError;
use peerpulse_shared::media::{LocalStream, RemoteStream};
use peerpulse_shared::protocol::Payload;
use peerpulse_shared::types::{CallId, LinkId, MediaKind, PeerId};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Link is not open")]
    LinkClosed,

    #[error("Failed to connect to peer {0}")]
    ConnectFailed(String),

    #[error("Media call failed: {0}")]
    Call(String),

    #[error("Encoding error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// An ordered, reliable data channel to one remote peer.
pub trait Link: Send + std::fmt::Debug {
    fn id(&self) -> &LinkId;

    fn peer(&self) -> &PeerId;

    /// Send one JSON frame.
    fn send_text(&mut self, text: &str) -> Result<(), TransportError>;

    fn close(&mut self);

    /// Encode and send a payload.
    fn send(&mut self, payload: &Payload) -> Result<(), TransportError> {
        let text = payload.encode()?;
        self.send_text(&text)
    }
}

/// One media call attempt, outbound or inbound.
pub trait CallHandle: Send + std::fmt::Debug {
    fn id(&self) -> &CallId;

    fn peer(&self) -> &PeerId;

    /// Answer an inbound call with the local stream.
    fn answer(&mut self, stream: &dyn LocalStream) -> Result<(), TransportError>;

    fn close(&mut self);
}

/// The rendezvous/transport capability consumed by the engine.
pub trait Transport: Send {
    /// Id assigned to this client by the rendezvous service.
    fn local_id(&self) -> PeerId;

    /// Start an outbound link. The link reports open later through
    /// [`TransportEvent::LinkOpened`].
    fn connect(&mut self, peer: &PeerId) -> Result<Box<dyn Link>, TransportError>;

    /// Place a media call carrying `stream`, tagged with `kind` so the
    /// callee can tell audio from video.
    fn call(
        &mut self,
        peer: &PeerId,
        kind: MediaKind,
        stream: &dyn LocalStream,
    ) -> Result<Box<dyn CallHandle>, TransportError>;
}

/// Low-level state reported by a link's underlying peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Everything the transport reports back.
#[derive(Debug)]
pub enum TransportEvent {
    /// A remote peer opened a link to us.
    InboundLink(Box<dyn Link>),
    LinkOpened {
        peer: PeerId,
        link: LinkId,
    },
    LinkClosed {
        peer: PeerId,
        link: LinkId,
    },
    LinkError {
        peer: PeerId,
        link: LinkId,
        reason: String,
    },
    LinkStateChanged {
        peer: PeerId,
        link: LinkId,
        state: LinkState,
    },
    LinkData {
        peer: PeerId,
        link: LinkId,
        text: String,
    },
    /// A remote peer is calling us.
    InboundCall {
        peer: PeerId,
        kind: MediaKind,
        call: Box<dyn CallHandle>,
    },
    /// Remote media arrived on a call.
    CallStream {
        peer: PeerId,
        call: CallId,
        stream: RemoteStream,
    },
    CallClosed {
        peer: PeerId,
        call: CallId,
    },
    /// The rendezvous service dropped us; every link is presumed dead.
    RendezvousLost,
}
