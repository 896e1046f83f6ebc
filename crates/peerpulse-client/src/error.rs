use thiserror::Error;

use peerpulse_media::CallError;
use peerpulse_net::RegistryError;
use peerpulse_shared::error::{IdentityError, JoinLinkError};
use peerpulse_shared::types::PeerId;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown peer: {0}")]
    UnknownPeer(PeerId),

    #[error("Peer is disconnected: {0}")]
    PeerDisconnected(PeerId),

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Call error: {0}")]
    Call(#[from] CallError),

    #[error("Connection error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Join link error: {0}")]
    JoinLink(#[from] JoinLinkError),

    #[error("Engine has shut down")]
    Shutdown,
}
