// Peer link layer: transport boundary, connection registry and handshake.

pub mod handshake;
pub mod registry;
pub mod transport;

pub use handshake::{apply_user_info, greet};
pub use registry::{Connection, ConnectionRegistry, LinkEvent, LinkOutcome, RegistryError};
pub use transport::{CallHandle, Link, LinkState, Transport, TransportError, TransportEvent};
