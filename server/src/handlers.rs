use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, Multipart, State,
    },
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tts_core::{EngineStatus, SpeechRate};

use crate::{error::ApiError, validation::validate_synthesis_text, AppState};

pub const NARRATOR_VOICE_ID: &str = "gm-narrator";

#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub text: Option<String>,
    pub rate: Option<f64>,
    /// Accepted for client compatibility; there is a single voice.
    pub voice_id: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub initialized: bool,
    pub voice_clone_active: bool,
    pub model: String,
}

#[derive(Serialize)]
pub struct VoiceInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub lang: &'static str,
    pub description: &'static str,
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct ReferenceResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub voice_clone_active: bool,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub backend: String,
    #[serde(flatten)]
    pub engine: EngineStatus,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let initialized = state.engine.is_initialized();
    Json(HealthResponse {
        status: "ok",
        initialized,
        voice_clone_active: initialized && state.engine.has_voice_clone(),
        model: state.engine.config().model_id.clone(),
    })
}

/// `POST /synthesize`: returns WAV bytes, from the cache when possible.
pub async fn synthesize(
    State(state): State<AppState>,
    payload: Result<Json<SynthesizeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload?;
    let text = validate_synthesis_text(req.text.as_deref())?.to_string();
    let rate = req.rate.map(SpeechRate::from_f64).unwrap_or_default();
    if let Some(voice_id) = &req.voice_id {
        debug!(voice_id = %voice_id, "Ignoring voice_id; using the narrator voice");
    }

    let engine = Arc::clone(&state.engine);
    let audio = tokio::task::spawn_blocking(move || engine.synthesize(&text, rate)).await??;

    Ok((
        [
            (header::CONTENT_TYPE, "audio/wav"),
            (header::CONTENT_DISPOSITION, "inline; filename=speech.wav"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        Bytes::from(audio.to_vec()),
    )
        .into_response())
}

pub async fn list_voices(State(state): State<AppState>) -> Json<Vec<VoiceInfo>> {
    let active = state.engine.is_initialized() && state.engine.has_voice_clone();
    Json(vec![VoiceInfo {
        id: NARRATOR_VOICE_ID,
        name: "Game Master (Lovecraft)",
        lang: "en",
        description: "Mysterious narrator voice for GM commentary",
        status: if active { "active" } else { "default" },
    }])
}

/// `POST /reference`: multipart `audio` file plus optional `text` transcript.
pub async fn upload_reference(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ReferenceResponse>, ApiError> {
    let mut multipart = multipart?;
    let mut audio: Option<Bytes> = None;
    let mut text: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("audio") => audio = Some(field.bytes().await?),
            Some("text") => {
                let value = field.text().await?;
                let value = value.trim();
                if !value.is_empty() {
                    text = Some(value.to_string());
                }
            }
            _ => debug!("Skipping unknown multipart field {:?}", name),
        }
    }

    let audio = audio
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| ApiError::InvalidInput("No audio file provided".to_string()))?;
    info!(bytes = audio.len(), "Received reference audio upload");

    let engine = Arc::clone(&state.engine);
    let voice_clone_active =
        tokio::task::spawn_blocking(move || engine.replace_reference(&audio, text.as_deref()))
            .await??;

    Ok(Json(ReferenceResponse {
        status: "ok",
        message: "Reference audio updated",
        voice_clone_active,
    }))
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        backend: state.config.backend.to_string(),
        engine: state.engine.status(),
    })
}
