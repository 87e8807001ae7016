//! Voice cloning profiles built from a reference clip.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::capability::SpeechCapability;

/// A voice prompt derived from a reference clip. Lives for the process only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceProfile {
    /// Backend-specific prompt handle.
    pub handle: String,
    pub reference_audio: PathBuf,
    pub reference_text: String,
    pub created_at: DateTime<Utc>,
}

/// Build a voice profile from `reference_audio` and its transcript.
///
/// Never fails: a missing clip or a backend error yields `None` (logged), and
/// synthesis continues in the default voice.
pub fn load_profile(
    capability: &dyn SpeechCapability,
    reference_audio: &Path,
    reference_text: &str,
) -> Option<VoiceProfile> {
    if !reference_audio.is_file() {
        warn!("Reference audio not found: {}", reference_audio.display());
        warn!("Voice cloning disabled. Using default voice.");
        return None;
    }

    info!("Creating voice prompt from: {}", reference_audio.display());
    match capability.create_voice_prompt(reference_audio, reference_text) {
        Ok(handle) => {
            info!("Voice cloning prompt created");
            Some(VoiceProfile {
                handle,
                reference_audio: reference_audio.to_path_buf(),
                reference_text: reference_text.to_string(),
                created_at: Utc::now(),
            })
        }
        Err(e) => {
            error!("Failed to create voice prompt with {}: {e}", capability.name());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        capability::{CapabilityError, SynthesizedAudio},
        rate::SpeechRate,
    };

    struct PromptOnly {
        fail: bool,
    }

    impl SpeechCapability for PromptOnly {
        fn name(&self) -> &'static str {
            "prompt-only"
        }

        fn synthesize(
            &self,
            _text: &str,
            _rate: SpeechRate,
            _voice: Option<&VoiceProfile>,
        ) -> Result<SynthesizedAudio, CapabilityError> {
            unreachable!("loader never synthesizes")
        }

        fn create_voice_prompt(
            &self,
            reference_audio: &Path,
            _reference_text: &str,
        ) -> Result<String, CapabilityError> {
            if self.fail {
                return Err(CapabilityError::InvalidResponse("clip too short".into()));
            }
            Ok(format!("prompt:{}", reference_audio.display()))
        }
    }

    #[test]
    fn test_missing_reference_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let profile = load_profile(
            &PromptOnly { fail: false },
            &dir.path().join("absent.wav"),
            "text",
        );
        assert!(profile.is_none());
    }

    #[test]
    fn test_backend_failure_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("ref.wav");
        std::fs::write(&clip, b"RIFF").unwrap();

        assert!(load_profile(&PromptOnly { fail: true }, &clip, "text").is_none());
    }

    #[test]
    fn test_valid_reference_builds_profile() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("ref.wav");
        std::fs::write(&clip, b"RIFF").unwrap();

        let profile = load_profile(&PromptOnly { fail: false }, &clip, "The shadows grow long.")
            .expect("profile");
        assert_eq!(profile.handle, format!("prompt:{}", clip.display()));
        assert_eq!(profile.reference_text, "The shadows grow long.");
        assert_eq!(profile.reference_audio, clip);
    }
}
