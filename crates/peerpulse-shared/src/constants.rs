/// Application name
pub const APP_NAME: &str = "PeerPulse";

/// How long an unanswered call rings before it is abandoned (seconds)
pub const RING_TIMEOUT_SECS: u64 = 30;

/// Idle time after the last keystroke before TYPING_END is sent (milliseconds)
pub const TYPING_IDLE_MS: u64 = 1000;

/// Display name shown for a peer until its USER_INFO arrives
pub const PLACEHOLDER_NAME: &str = "Unknown";

/// Query parameter carrying the share-link payload
pub const JOIN_QUERY_PARAM: &str = "connect";

/// Capacity of the engine's notification channel
pub const DEFAULT_EVENT_BUFFER: usize = 256;
