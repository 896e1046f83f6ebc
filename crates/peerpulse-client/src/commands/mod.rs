//! Session handlers, grouped by domain.
//!
//! Each sub-module adds an `impl Session` block: `network` owns link
//! lifecycle and inbound frame dispatch, `messaging` owns chat and typing,
//! `media` owns the call state machines.

pub mod media;
pub mod messaging;
pub mod network;
