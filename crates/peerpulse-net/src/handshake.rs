//! USER_INFO handshake.
//!
//! Each side announces its display name once per opened link. Receiving
//! the announcement again simply overwrites the stored name.

use tracing::{debug, warn};

use peerpulse_shared::identity::LocalIdentity;
use peerpulse_shared::protocol::{ControlMessage, Payload};
use peerpulse_shared::types::PeerId;

use crate::registry::{ConnectionRegistry, RegistryError};

pub fn greeting(identity: &LocalIdentity) -> Payload {
    Payload::Control(ControlMessage::UserInfo {
        username: identity.display_name().to_string(),
    })
}

/// Send our USER_INFO on the peer's freshly opened link.
pub fn greet(
    registry: &mut ConnectionRegistry,
    peer: &PeerId,
    identity: &LocalIdentity,
) -> Result<(), RegistryError> {
    registry.send(peer, &greeting(identity))?;
    debug!(peer = %peer.short(), "Sent USER_INFO");
    Ok(())
}

/// Record the display name a peer announced.
/// Returns the new name when it differs from the stored one.
pub fn apply_user_info(
    registry: &mut ConnectionRegistry,
    peer: &PeerId,
    username: &str,
) -> Option<String> {
    let username = username.trim();
    if username.is_empty() {
        warn!(peer = %peer.short(), "Ignoring USER_INFO with empty username");
        return None;
    }
    if registry.set_display_name(peer, username) {
        debug!(peer = %peer.short(), name = %username, "Peer display name updated");
        Some(username.to_string())
    } else {
        None
    }
}
