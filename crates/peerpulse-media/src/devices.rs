//! Capture-device boundary.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use peerpulse_shared::media::LocalStream;
use peerpulse_shared::types::MediaKind;

use crate::audio::AudioConstraints;
use crate::video::VideoConstraints;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("Permission to use the capture device was denied")]
    PermissionDenied,

    #[error("No capture device available")]
    NoDevice,

    #[error("Capture device error: {0}")]
    Device(String),
}

/// What to capture. `None` means the track kind is not requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub audio: Option<AudioConstraints>,
    pub video: Option<VideoConstraints>,
}

impl MediaConstraints {
    /// The capture profile used for a call of `kind`.
    pub fn for_kind(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Audio => crate::audio::voice_constraints(),
            MediaKind::Video => crate::video::camera_constraints(),
        }
    }

    pub fn wants_video(&self) -> bool {
        self.video.is_some()
    }
}

pub type AcquireFuture = BoxFuture<'static, Result<Box<dyn LocalStream>, MediaError>>;

/// Access to local capture devices.
///
/// `acquire` may take arbitrarily long (a permission prompt) and may fail;
/// the returned future must not borrow from `self`.
pub trait MediaDevices: Send + Sync {
    fn acquire(&self, constraints: &MediaConstraints) -> AcquireFuture;
}
