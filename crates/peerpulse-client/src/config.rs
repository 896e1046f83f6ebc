//! Engine configuration loaded from environment variables.
//!
//! Every setting has a default matching the browser client's behaviour, so
//! an engine can start with zero configuration.

use std::time::Duration;

use peerpulse_shared::constants::{
    DEFAULT_EVENT_BUFFER, PLACEHOLDER_NAME, RING_TIMEOUT_SECS, TYPING_IDLE_MS,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long a call rings before it is abandoned.
    /// Env: `PEERPULSE_RING_TIMEOUT_SECS`
    /// Default: 30 s
    pub ring_timeout: Duration,

    /// Keystroke inactivity before TYPING_END is sent.
    /// Env: `PEERPULSE_TYPING_IDLE_MS`
    /// Default: 1000 ms
    pub typing_idle: Duration,

    /// Display name for peers whose handshake has not arrived.
    /// Env: `PEERPULSE_PLACEHOLDER_NAME`
    /// Default: `"Unknown"`
    pub placeholder_name: String,

    /// Capacity of the engine input and notification channels.
    /// Env: `PEERPULSE_EVENT_BUFFER`
    /// Default: 256
    pub event_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ring_timeout: Duration::from_secs(RING_TIMEOUT_SECS),
            typing_idle: Duration::from_millis(TYPING_IDLE_MS),
            placeholder_name: PLACEHOLDER_NAME.to_string(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup("PEERPULSE_RING_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.ring_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid PEERPULSE_RING_TIMEOUT_SECS, using default"),
            }
        }

        if let Some(val) = lookup("PEERPULSE_TYPING_IDLE_MS") {
            match val.parse::<u64>() {
                Ok(ms) if ms > 0 => config.typing_idle = Duration::from_millis(ms),
                _ => tracing::warn!(value = %val, "Invalid PEERPULSE_TYPING_IDLE_MS, using default"),
            }
        }

        if let Some(name) = lookup("PEERPULSE_PLACEHOLDER_NAME") {
            if !name.trim().is_empty() {
                config.placeholder_name = name.trim().to_string();
            }
        }

        if let Some(val) = lookup("PEERPULSE_EVENT_BUFFER") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.event_buffer = n,
                _ => tracing::warn!(value = %val, "Invalid PEERPULSE_EVENT_BUFFER, using default"),
            }
        }

        config
    }
}
