use serde::{Deserialize, Serialize};

use crate::error::IdentityError;
use crate::types::PeerId;

/// The local participant for one engine lifetime.
/// The id is assigned by the rendezvous service; the display name is
/// chosen by the user (or generated by the UI) before the engine starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalIdentity {
    peer_id: PeerId,
    display_name: String,
}

impl LocalIdentity {
    /// Build the identity from the transport-assigned id and a display name.
    /// Surrounding whitespace in the name is dropped.
    pub fn new(peer_id: PeerId, display_name: &str) -> Result<Self, IdentityError> {
        if peer_id.as_str().trim().is_empty() {
            return Err(IdentityError::EmptyPeerId);
        }
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(IdentityError::EmptyDisplayName);
        }
        Ok(Self {
            peer_id,
            display_name: display_name.to_string(),
        })
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}
