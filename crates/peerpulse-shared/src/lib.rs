// Types, wire protocol and boundary traits shared by every PeerPulse crate.

pub mod constants;
pub mod error;
pub mod identity;
pub mod invite;
pub mod media;
pub mod protocol;
pub mod types;

pub use error::{IdentityError, JoinLinkError, ProtocolError};
pub use identity::LocalIdentity;
pub use invite::JoinLink;
pub use media::{LocalStream, RemoteStream};
pub use protocol::{ChatPayload, ControlMessage, Payload};
pub use types::{CallId, ConnectionStatus, LinkId, MediaKind, PeerId};
