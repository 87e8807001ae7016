//! HTTP client for the model-runner process.
//!
//! Runner API:
//! - `POST /load` `{model, device}` loads (and downloads if needed) the model.
//! - `POST /voice_prompt` multipart `{audio, text}` returns `{prompt_id}`.
//! - `POST /generate` `{text, speed, model, prompt_id?}` returns WAV bytes.

use std::{path::Path, sync::Arc, time::Duration};

use reqwest::blocking::{multipart, Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{CapabilityError, CapabilityFactory, SpeechCapability, SynthesizedAudio};
use crate::{device::Device, rate::SpeechRate, voice::VoiceProfile, wav};

#[derive(Debug, Serialize)]
struct LoadRequest<'a> {
    model: &'a str,
    device: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    text: &'a str,
    speed: f32,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct VoicePromptResponse {
    prompt_id: String,
}

pub struct RemoteFactory {
    base_url: String,
}

impl RemoteFactory {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl CapabilityFactory for RemoteFactory {
    fn create(
        &self,
        model_id: &str,
        device: Device,
    ) -> Result<Arc<dyn SpeechCapability>, CapabilityError> {
        Ok(Arc::new(RemoteBackend::connect(&self.base_url, model_id, device)?))
    }
}

pub struct RemoteBackend {
    base_url: String,
    model: String,
    client: Client,
}

impl RemoteBackend {
    /// Ask the runner to load `model` on `device`. Blocks until the model is ready.
    pub fn connect(base_url: &str, model: &str, device: Device) -> Result<Self, CapabilityError> {
        // Model downloads and synthesis can take minutes; no client-side timeout.
        let client = Client::builder().timeout(None::<Duration>).build()?;
        let backend = Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        };

        info!("Loading model {} on {} via {}", model, device, backend.base_url);
        let response = backend
            .client
            .post(backend.url("load"))
            .json(&LoadRequest {
                model,
                device: device.to_string(),
            })
            .send()
            .map_err(|e| CapabilityError::Unavailable(format!("model runner unreachable: {e}")))?;
        check_status(response)?;

        Ok(backend)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

impl SpeechCapability for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn synthesize(
        &self,
        text: &str,
        rate: SpeechRate,
        voice: Option<&VoiceProfile>,
    ) -> Result<SynthesizedAudio, CapabilityError> {
        let request = GenerateRequest {
            text,
            speed: rate.value(),
            model: &self.model,
            prompt_id: voice.map(|v| v.handle.as_str()),
        };
        debug!(cloned = request.prompt_id.is_some(), "Requesting synthesis from model runner");

        let response = self.client.post(self.url("generate")).json(&request).send()?;
        let bytes = check_status(response)?.bytes()?;
        let (samples, sample_rate) = wav::decode_wav(&bytes)
            .map_err(|e| CapabilityError::InvalidResponse(e.to_string()))?;

        Ok(SynthesizedAudio {
            samples,
            sample_rate,
        })
    }

    fn create_voice_prompt(
        &self,
        reference_audio: &Path,
        reference_text: &str,
    ) -> Result<String, CapabilityError> {
        let audio = std::fs::read(reference_audio)?;
        let file_name = reference_audio
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("reference.wav")
            .to_string();

        let part = multipart::Part::bytes(audio)
            .file_name(file_name)
            .mime_str("audio/wav")?;
        let form = multipart::Form::new()
            .part("audio", part)
            .text("text", reference_text.to_string());

        let response = self
            .client
            .post(self.url("voice_prompt"))
            .multipart(form)
            .send()?;
        let prompt: VoicePromptResponse = check_status(response)?
            .json()
            .map_err(|e| CapabilityError::InvalidResponse(e.to_string()))?;

        Ok(prompt.prompt_id)
    }
}

fn check_status(response: Response) -> Result<Response, CapabilityError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(CapabilityError::Status {
        status: status.as_u16(),
        body,
    })
}
