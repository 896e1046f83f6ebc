// Call signaling: capture profiles, the per-peer call state machine and the
// incoming-call mailbox.

pub mod audio;
pub mod call;
pub mod devices;
pub mod mailbox;
pub mod video;

pub use call::{CallError, CallRole, CallSession, CallStatus, EndReason, RingStage, Teardown};
pub use devices::{AcquireFuture, MediaConstraints, MediaDevices, MediaError};
pub use mailbox::{IncomingCallRequest, Mailbox};
