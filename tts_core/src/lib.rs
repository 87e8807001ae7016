//! Cached text-to-speech with optional voice cloning.
//!
//! [`TtsEngine`] is the entry point: it lazily builds a synthesis capability,
//! looks synthesized audio up in a two-tier [`AudioCache`] and only calls the
//! model on a miss. The model itself sits behind [`SpeechCapability`] so the
//! engine does not care whether it runs in a separate model-runner process or
//! in-process through Piper.

pub mod cache;
pub mod capability;
pub mod device;
pub mod engine;
pub mod rate;
pub mod voice;
pub mod wav;

pub use cache::{derive_key, AudioCache, CacheError, CacheKey, CachedAudio, EvictionPolicy};
pub use capability::{
    factory_for, BackendKind, CapabilityError, CapabilityFactory, SpeechCapability,
    SynthesizedAudio,
};
pub use device::{Device, DevicePreference};
pub use engine::{EngineConfig, EngineError, EngineStatus, TtsEngine};
pub use rate::SpeechRate;
pub use voice::{load_profile, VoiceProfile};
