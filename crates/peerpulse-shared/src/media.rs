//! Boundary types for captured and received media.
//!
//! The engine never touches samples or frames; it only owns stream handles
//! and flips their track flags. Real capture lives behind these traits.

use serde::{Deserialize, Serialize};

/// A locally captured stream (microphone, optionally camera).
///
/// Exactly one call owns a `LocalStream` at a time. Dropping the handle
/// does not release the device; `stop()` must be called.
pub trait LocalStream: Send + std::fmt::Debug {
    fn id(&self) -> &str;

    fn has_video(&self) -> bool;

    /// Enable or disable every audio track (mute).
    fn set_audio_enabled(&mut self, enabled: bool);

    /// Enable or disable every video track.
    fn set_video_enabled(&mut self, enabled: bool);

    /// Stop every track and release the capture device.
    fn stop(&mut self);
}

/// Handle to the media received from the remote side of a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteStream {
    pub id: String,
    pub has_video: bool,
}

impl RemoteStream {
    pub fn new(id: impl Into<String>, has_video: bool) -> Self {
        Self {
            id: id.into(),
            has_video,
        }
    }
}
