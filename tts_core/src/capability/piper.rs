//! Local Piper voices. The model identifier is the path of a Piper voice config
//! (`*.onnx.json`).

use std::{
    fs,
    path::Path,
    sync::{Arc, Mutex},
};

use anyhow::Context;
use piper_rs::synth::{PiperSpeechStreamParallel, PiperSpeechSynthesizer};
use tracing::{debug, info};

use super::{CapabilityError, CapabilityFactory, SpeechCapability, SynthesizedAudio};
use crate::{device::Device, rate::SpeechRate, voice::VoiceProfile};

pub struct PiperFactory;

impl CapabilityFactory for PiperFactory {
    fn create(
        &self,
        model_id: &str,
        device: Device,
    ) -> Result<Arc<dyn SpeechCapability>, CapabilityError> {
        if device != Device::Cpu {
            info!("Piper runs on the CPU execution provider; ignoring device {}", device);
        }
        Ok(Arc::new(PiperBackend::load(model_id)?))
    }
}

pub struct PiperBackend {
    synth: Mutex<PiperSpeechSynthesizer>,
    sample_rate: u32,
}

impl PiperBackend {
    pub fn load<P: AsRef<Path>>(cfg_path: P) -> Result<Self, CapabilityError> {
        let sample_rate = read_sample_rate(&cfg_path)?;
        let model = piper_rs::from_config_path(cfg_path.as_ref())
            .map_err(|e| CapabilityError::Unavailable(format!("piper load error: {e}")))?;
        let synth = PiperSpeechSynthesizer::new(model)
            .map_err(|e| CapabilityError::Unavailable(format!("piper init error: {e}")))?;

        Ok(Self {
            synth: Mutex::new(synth),
            sample_rate,
        })
    }
}

/// Read `audio.sample_rate` from a Piper voice config.
fn read_sample_rate<P: AsRef<Path>>(cfg_path: P) -> anyhow::Result<u32> {
    let text = fs::read_to_string(cfg_path.as_ref())
        .with_context(|| format!("Failed to read config file: {}", cfg_path.as_ref().display()))?;
    let json: serde_json::Value =
        serde_json::from_str(&text).with_context(|| "Config file is not valid JSON")?;

    let sample_rate = json
        .get("audio")
        .and_then(|a| a.get("sample_rate"))
        .and_then(|sr| sr.as_u64())
        .ok_or_else(|| anyhow::anyhow!("Missing or invalid 'audio.sample_rate' in config"))?;

    Ok(sample_rate as u32)
}

impl SpeechCapability for PiperBackend {
    fn name(&self) -> &'static str {
        "piper"
    }

    fn synthesize(
        &self,
        text: &str,
        rate: SpeechRate,
        _voice: Option<&VoiceProfile>,
    ) -> Result<SynthesizedAudio, CapabilityError> {
        debug!(%rate, "Piper has no speed control; synthesizing at natural rate");
        let synth = self
            .synth
            .lock()
            .map_err(|_| anyhow::anyhow!("Synthesizer lock poisoned by an earlier panic"))?;

        let iter: PiperSpeechStreamParallel = synth
            .synthesize_parallel(text.to_string(), None)
            .map_err(|e| anyhow::anyhow!("piper synth error: {e}"))?;

        let mut samples: Vec<f32> = Vec::new();
        for part in iter {
            samples.extend(part.map_err(|e| anyhow::anyhow!("chunk error: {e}"))?.into_vec());
        }

        Ok(SynthesizedAudio {
            samples,
            sample_rate: self.sample_rate,
        })
    }

    fn create_voice_prompt(
        &self,
        _reference_audio: &Path,
        _reference_text: &str,
    ) -> Result<String, CapabilityError> {
        Err(CapabilityError::VoiceCloneUnsupported("piper"))
    }
}
