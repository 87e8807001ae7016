//! Synthesis orchestrator.
//!
//! `TtsEngine` owns the engine state: the lazily created capability, the
//! active voice profile and the audio cache. Callers only go through its
//! methods; every method is blocking and safe to call from many threads.

use std::{
    fs, io,
    num::NonZeroUsize,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError, RwLock},
    time::Instant,
};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
    cache::{derive_key, AudioCache, CacheError, CacheKey, CachedAudio},
    capability::{CapabilityError, CapabilityFactory, SpeechCapability},
    device::{Device, DevicePreference},
    rate::SpeechRate,
    voice::{load_profile, VoiceProfile},
    wav::{self, WavError},
};

pub const DEFAULT_MODEL: &str = "Qwen/Qwen3-TTS-12Hz-0.6B-Base";
pub const DEFAULT_REFERENCE_TEXT: &str =
    "The shadows grow long as ancient evil stirs in the darkness.";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("TTS engine initialization failed: {0}")]
    Init(#[source] CapabilityError),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(#[source] CapabilityError),

    #[error("WAV encoding error: {0}")]
    Encode(#[from] WavError),

    #[error("Audio cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Failed to store reference audio at {path}: {source}")]
    Reference {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Part of every cache key, so switching models never serves stale audio.
    pub model_id: String,
    pub cache_dir: PathBuf,
    /// `None` keeps every entry forever.
    pub cache_max_entries: Option<NonZeroUsize>,
    pub reference_audio: PathBuf,
    pub reference_text: String,
    pub device: DevicePreference,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL.to_string(),
            cache_dir: PathBuf::from("./cache"),
            cache_max_entries: None,
            reference_audio: PathBuf::from("./reference/gm-voice.wav"),
            reference_text: DEFAULT_REFERENCE_TEXT.to_string(),
            device: DevicePreference::Auto,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub initialized: bool,
    pub voice_clone_active: bool,
    pub model: String,
    pub device: String,
    pub resolved_device: String,
    pub cache_dir: PathBuf,
    pub cached_entries: usize,
    pub reference_audio: PathBuf,
    pub reference_audio_exists: bool,
}

pub struct TtsEngine {
    config: EngineConfig,
    device: Device,
    factory: Box<dyn CapabilityFactory>,
    capability: OnceCell<Arc<dyn SpeechCapability>>,
    voice: RwLock<Option<Arc<VoiceProfile>>>,
    reference_text: RwLock<String>,
    cache: AudioCache,
    // at most one synthesis per key in flight
    in_flight: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl TtsEngine {
    pub fn new(config: EngineConfig, factory: Box<dyn CapabilityFactory>) -> Self {
        let cache = AudioCache::with_max_entries(&config.cache_dir, config.cache_max_entries);
        Self {
            device: config.device.resolve(),
            reference_text: RwLock::new(config.reference_text.clone()),
            config,
            factory,
            capability: OnceCell::new(),
            voice: RwLock::new(None),
            cache,
            in_flight: DashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &AudioCache {
        &self.cache
    }

    pub fn resolved_device(&self) -> Device {
        self.device
    }

    pub fn is_initialized(&self) -> bool {
        self.capability.get().is_some()
    }

    pub fn active_voice(&self) -> Option<Arc<VoiceProfile>> {
        self.voice
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn has_voice_clone(&self) -> bool {
        self.active_voice().is_some()
    }

    pub fn reference_text(&self) -> String {
        self.reference_text
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Initialize now instead of on the first synthesis request.
    pub fn warmup(&self) -> Result<(), EngineError> {
        self.capability().map(|_| ())
    }

    /// Synthesize `text` at `rate`, serving repeated requests from the cache.
    pub fn synthesize(&self, text: &str, rate: SpeechRate) -> Result<CachedAudio, EngineError> {
        let capability = Arc::clone(self.capability()?);
        let key = derive_key(text, rate, &self.config.model_id);

        if let Some(audio) = self.cache.get(&key) {
            debug!(%key, "Cache hit for: {}", preview(text));
            return Ok(audio);
        }

        let slot = self.in_flight.entry(key.clone()).or_default().value().clone();
        let result = {
            let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            // another request may have finished this key while we waited
            match self.cache.get(&key) {
                Some(audio) => Ok(audio),
                None => self.synthesize_uncached(capability.as_ref(), &key, text, rate),
            }
        };
        drop(slot);
        self.in_flight
            .remove_if(&key, |_, slot| Arc::strong_count(slot) == 1);

        result
    }

    /// Rebuild the voice profile from the configured reference clip.
    /// Returns whether voice cloning is active afterwards.
    pub fn load_voice_profile(&self) -> bool {
        match self.capability.get() {
            Some(capability) => self.rebuild_voice(capability.as_ref()),
            None => {
                debug!("Engine not initialized; voice profile will load during initialization");
                false
            }
        }
    }

    /// Store a new reference clip (and transcript, when given) and rebuild the
    /// voice profile from it. Initializes the engine if needed; an
    /// initialization failure only leaves voice cloning inactive.
    pub fn replace_reference(
        &self,
        audio: &[u8],
        reference_text: Option<&str>,
    ) -> Result<bool, EngineError> {
        let path = &self.config.reference_audio;
        let stored = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| fs::write(path, audio));
        if let Err(source) = stored {
            return Err(EngineError::Reference {
                path: path.clone(),
                source,
            });
        }

        if let Some(text) = reference_text {
            *self
                .reference_text
                .write()
                .unwrap_or_else(PoisonError::into_inner) = text.to_string();
        }
        info!(bytes = audio.len(), "Reference audio updated: {}", path.display());

        let was_initialized = self.is_initialized();
        match self.capability() {
            // initialization already loaded the new clip
            Ok(_) if !was_initialized => {}
            Ok(capability) => {
                self.rebuild_voice(capability.as_ref());
            }
            Err(e) => {
                error!("Voice profile not rebuilt: {e}");
                self.set_voice(None);
            }
        }

        Ok(self.has_voice_clone())
    }

    pub fn status(&self) -> EngineStatus {
        let initialized = self.is_initialized();
        EngineStatus {
            initialized,
            voice_clone_active: initialized && self.has_voice_clone(),
            model: self.config.model_id.clone(),
            device: self.config.device.to_string(),
            resolved_device: self.device.to_string(),
            cache_dir: self.cache.cache_dir().to_path_buf(),
            cached_entries: self.cache.len(),
            reference_audio: self.config.reference_audio.clone(),
            reference_audio_exists: self.config.reference_audio.is_file(),
        }
    }

    fn capability(&self) -> Result<&Arc<dyn SpeechCapability>, EngineError> {
        // Concurrent first callers block here; a failure leaves the cell empty
        // so the next request starts over.
        self.capability.get_or_try_init(|| self.initialize())
    }

    fn initialize(&self) -> Result<Arc<dyn SpeechCapability>, EngineError> {
        info!("Initializing TTS engine...");
        info!("Loading model: {}", self.config.model_id);
        info!("Using device: {} (requested {})", self.device, self.config.device);

        let capability = self
            .factory
            .create(&self.config.model_id, self.device)
            .map_err(|e| {
                error!("Failed to initialize TTS engine: {e}");
                EngineError::Init(e)
            })?;

        self.cache.ensure_dir()?;
        self.rebuild_voice(capability.as_ref());

        info!("TTS engine initialized with {} backend", capability.name());
        Ok(capability)
    }

    fn rebuild_voice(&self, capability: &dyn SpeechCapability) -> bool {
        let profile = load_profile(
            capability,
            &self.config.reference_audio,
            &self.reference_text(),
        );
        let active = profile.is_some();
        self.set_voice(profile);
        active
    }

    fn set_voice(&self, profile: Option<VoiceProfile>) {
        *self.voice.write().unwrap_or_else(PoisonError::into_inner) = profile.map(Arc::new);
    }

    fn synthesize_uncached(
        &self,
        capability: &dyn SpeechCapability,
        key: &CacheKey,
        text: &str,
        rate: SpeechRate,
    ) -> Result<CachedAudio, EngineError> {
        let voice = self.active_voice();
        let started = Instant::now();

        let output = capability
            .synthesize(text, rate, voice.as_deref())
            .map_err(|e| {
                error!("Synthesis failed: {e}");
                EngineError::Synthesis(e)
            })?;
        let bytes = wav::encode_wav(&output.samples, output.sample_rate)?;
        let audio = self.cache.put(key, bytes)?;

        info!(
            %key,
            cloned = voice.is_some(),
            samples = output.samples.len(),
            sample_rate = output.sample_rate,
            "Synthesized {} in {:.2}s",
            preview(text),
            started.elapsed().as_secs_f64()
        );
        Ok(audio)
    }
}

impl std::fmt::Debug for TtsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtsEngine")
            .field("model", &self.config.model_id)
            .field("device", &self.device)
            .field("initialized", &self.is_initialized())
            .field("cache", &self.cache)
            .finish()
    }
}

/// First 50 characters of `text`, for log lines.
fn preview(text: &str) -> String {
    match text.char_indices().nth(50) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
