//! # peerpulse-store
//!
//! In-memory conversation state for one PeerPulse session: the ordered
//! per-peer message log plus presence (unread counters, active
//! conversation, typing indicator). Nothing is written to disk.

pub mod messages;
pub mod models;
pub mod presence;

pub use messages::MessageLog;
pub use models::*;
pub use presence::Presence;
