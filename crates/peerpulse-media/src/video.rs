use serde::{Deserialize, Serialize};
use tracing::debug;

use peerpulse_shared::types::MediaKind;

use crate::audio::AudioConstraints;
use crate::call::{CallError, CallSession};
use crate::devices::MediaConstraints;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    User,
    Environment,
}

/// Camera settings requested from the capture device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
    pub facing_mode: FacingMode,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            facing_mode: FacingMode::User,
        }
    }
}

/// Capture profile for video calls: front camera at 720p plus processed
/// microphone.
pub fn camera_constraints() -> MediaConstraints {
    MediaConstraints {
        audio: Some(AudioConstraints::default()),
        video: Some(VideoConstraints::default()),
    }
}

impl CallSession {
    /// Turn the local camera tracks on or off without renegotiating.
    /// Only meaningful for video calls.
    pub fn set_video_enabled(&mut self, enabled: bool) -> Result<(), CallError> {
        if self.kind() != MediaKind::Video {
            return Err(CallError::NotVideoCall);
        }
        self.set_video_flag(enabled);
        if let Some(stream) = self.local_stream_mut() {
            stream.set_video_enabled(enabled);
        }
        debug!(peer = %self.peer().short(), enabled, "Video enabled state changed");
        Ok(())
    }
}
