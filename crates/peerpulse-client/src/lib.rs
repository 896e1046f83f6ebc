//! # peerpulse-client
//!
//! The PeerPulse session engine: link lifecycle, chat, typing presence and
//! voice/video call signaling for one local user. [`Session`] holds all
//! state and is driven synchronously; [`spawn_engine`] runs it on tokio.

pub mod bridge;
pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod state;

use tracing_subscriber::{fmt, EnvFilter};

pub use bridge::{spawn_engine, EngineCommand, EngineHandle};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use error::EngineError;
pub use events::{Effect, EngineEvent, TimerKey};
pub use state::{PeerSummary, Session};

/// Install the global `fmt` subscriber. `RUST_LOG` overrides the default
/// filter. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("peerpulse_client=debug,peerpulse_net=debug,peerpulse_media=info,peerpulse_store=info,warn")
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
