use serde::{Deserialize, Serialize};

use crate::devices::MediaConstraints;

/// Microphone processing requested from the capture device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Capture profile for voice calls: processed microphone only.
pub fn voice_constraints() -> MediaConstraints {
    MediaConstraints {
        audio: Some(AudioConstraints::default()),
        video: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_profile_is_processed_audio_only() {
        let c = voice_constraints();
        assert_eq!(c.audio, Some(AudioConstraints::default()));
        assert!(c.video.is_none());
        let audio = c.audio.unwrap();
        assert!(audio.echo_cancellation && audio.noise_suppression && audio.auto_gain_control);
    }
}
