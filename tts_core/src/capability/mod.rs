//! The speech model as seen by the engine.
//!
//! A [`CapabilityFactory`] builds the (expensive) [`SpeechCapability`] once,
//! on first use. Backends:
//! - [`RemoteBackend`]: HTTP client for a model-runner process hosting the
//!   voice-cloning model.
//! - `PiperBackend` (feature `piper`): local Piper voices, default voice only.

mod remote;
#[cfg(feature = "piper")]
mod piper;

use std::{fmt, path::Path, str::FromStr, sync::Arc};

use thiserror::Error;

use crate::{device::Device, rate::SpeechRate, voice::VoiceProfile};

#[cfg(feature = "piper")]
pub use piper::{PiperBackend, PiperFactory};
pub use remote::{RemoteBackend, RemoteFactory};

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("speech backend unavailable: {0}")]
    Unavailable(String),

    #[error("request to model runner failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model runner returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response from speech backend: {0}")]
    InvalidResponse(String),

    #[error("voice cloning is not supported by the {0} backend")]
    VoiceCloneUnsupported(&'static str),

    #[error("failed to read reference audio: {0}")]
    Reference(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Raw model output.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

pub trait SpeechCapability: Send + Sync {
    /// Backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// Synthesize `text`, in the cloned voice when `voice` is given, else in the default voice.
    fn synthesize(
        &self,
        text: &str,
        rate: SpeechRate,
        voice: Option<&VoiceProfile>,
    ) -> Result<SynthesizedAudio, CapabilityError>;

    /// Build a reusable voice prompt from a reference clip and its transcript.
    /// Returns the backend handle stored in [`VoiceProfile::handle`].
    fn create_voice_prompt(
        &self,
        reference_audio: &Path,
        reference_text: &str,
    ) -> Result<String, CapabilityError>;
}

pub trait CapabilityFactory: Send + Sync {
    fn create(
        &self,
        model_id: &str,
        device: Device,
    ) -> Result<Arc<dyn SpeechCapability>, CapabilityError>;
}

/// Which backend serves synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Remote,
    Piper,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" | "runner" => Ok(BackendKind::Remote),
            "piper" => Ok(BackendKind::Piper),
            other => Err(format!("unknown backend '{other}' (expected remote or piper)")),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Remote => "remote",
            BackendKind::Piper => "piper",
        })
    }
}

/// Factory for the configured backend. `runner_url` is only used by the remote backend.
pub fn factory_for(kind: BackendKind, runner_url: &str) -> Box<dyn CapabilityFactory> {
    match kind {
        BackendKind::Remote => Box::new(RemoteFactory::new(runner_url)),
        #[cfg(feature = "piper")]
        BackendKind::Piper => Box::new(PiperFactory),
        #[cfg(not(feature = "piper"))]
        BackendKind::Piper => Box::new(MissingPiper),
    }
}

/// Stand-in when the crate was built without the `piper` feature; fails at init.
#[cfg(not(feature = "piper"))]
struct MissingPiper;

#[cfg(not(feature = "piper"))]
impl CapabilityFactory for MissingPiper {
    fn create(
        &self,
        _model_id: &str,
        _device: Device,
    ) -> Result<Arc<dyn SpeechCapability>, CapabilityError> {
        Err(CapabilityError::Unavailable(
            "tts_core was built without the `piper` feature".into(),
        ))
    }
}
