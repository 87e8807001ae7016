//! Common utilities for integration tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tts_core::{
    CapabilityError, CapabilityFactory, Device, SpeechCapability, SpeechRate, SynthesizedAudio,
    TtsEngine, VoiceProfile,
};
use tts_server::{build_router, config::ServerConfig, AppState};

pub const BOUNDARY: &str = "----tts-test-boundary";

/// Capability whose output differs on every call, so cache hits are observable.
pub struct FakeCapability {
    calls: Arc<AtomicUsize>,
    fail_synthesis: bool,
}

impl SpeechCapability for FakeCapability {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn synthesize(
        &self,
        text: &str,
        _rate: SpeechRate,
        _voice: Option<&VoiceProfile>,
    ) -> Result<SynthesizedAudio, CapabilityError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_synthesis {
            return Err(CapabilityError::Status {
                status: 500,
                body: "CUDA out of memory".into(),
            });
        }
        let samples = (0..text.len() * 40)
            .map(|i| ((i + call * 13) as f32 / 25.0).sin() * 0.5)
            .collect();
        Ok(SynthesizedAudio {
            samples,
            sample_rate: 24_000,
        })
    }

    fn create_voice_prompt(
        &self,
        reference_audio: &Path,
        _reference_text: &str,
    ) -> Result<String, CapabilityError> {
        Ok(format!("fake:{}", reference_audio.display()))
    }
}

pub struct FakeFactory {
    pub fail_init: bool,
    pub fail_synthesis: bool,
    pub calls: Arc<AtomicUsize>,
}

impl CapabilityFactory for FakeFactory {
    fn create(
        &self,
        _model_id: &str,
        _device: Device,
    ) -> Result<Arc<dyn SpeechCapability>, CapabilityError> {
        if self.fail_init {
            return Err(CapabilityError::Unavailable("model runner unreachable".into()));
        }
        Ok(Arc::new(FakeCapability {
            calls: Arc::clone(&self.calls),
            fail_synthesis: self.fail_synthesis,
        }))
    }
}

pub struct TestApp {
    pub router: Router,
    pub engine: Arc<TtsEngine>,
    pub synth_calls: Arc<AtomicUsize>,
    pub reference_audio: PathBuf,
    // keeps the cache and reference directories alive
    _dir: TempDir,
}

/// Create a test app instance backed by a fake capability and a temp directory
pub fn create_test_app() -> TestApp {
    create_app(false, false, |_| {})
}

/// `create_test_app` with adjusted server settings.
pub fn create_test_app_with(configure: impl FnOnce(&mut ServerConfig)) -> TestApp {
    create_app(false, false, configure)
}

/// Like `create_test_app`, but every engine initialization fails.
pub fn create_failing_app() -> TestApp {
    create_app(true, false, |_| {})
}

/// Initialization succeeds, every synthesis call fails.
pub fn create_broken_model_app() -> TestApp {
    create_app(false, true, |_| {})
}

fn create_app(
    fail_init: bool,
    fail_synthesis: bool,
    configure: impl FnOnce(&mut ServerConfig),
) -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = ServerConfig {
        cache_dir: dir.path().join("cache"),
        reference_audio: dir.path().join("reference").join("gm-voice.wav"),
        ..ServerConfig::default()
    };
    configure(&mut config);

    let synth_calls = Arc::new(AtomicUsize::new(0));
    let factory = FakeFactory {
        fail_init,
        fail_synthesis,
        calls: Arc::clone(&synth_calls),
    };
    let engine = Arc::new(TtsEngine::new(config.engine_config(), Box::new(factory)));
    let router = build_router(AppState {
        engine: Arc::clone(&engine),
        config: config.clone(),
    });

    TestApp {
        router,
        engine,
        synth_calls,
        reference_audio: config.reference_audio,
        _dir: dir,
    }
}

/// Build a `multipart/form-data` body. Parts are `(name, filename, bytes)`.
pub fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: audio/wav\r\n");
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n").as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// A short valid WAV clip for reference uploads.
pub fn reference_clip() -> Vec<u8> {
    let samples: Vec<f32> = (0..2400).map(|i| (i as f32 / 10.0).sin() * 0.3).collect();
    tts_core::wav::encode_wav(&samples, 24_000).expect("encode clip")
}
