// Server configuration, read from the environment (after `.env` is loaded)

use std::{net::SocketAddr, num::NonZeroUsize, path::PathBuf, str::FromStr, time::Duration};

use tts_core::{
    engine::{DEFAULT_MODEL, DEFAULT_REFERENCE_TEXT},
    BackendKind, DevicePreference, EngineConfig,
};

pub const DEFAULT_PORT: u16 = 8765;
pub const DEFAULT_RUNNER_URL: &str = "http://127.0.0.1:9880";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub model: String,
    pub backend: BackendKind,
    pub runner_url: String,
    pub cache_dir: PathBuf,
    pub cache_max_entries: Option<NonZeroUsize>,
    pub reference_audio: PathBuf,
    pub reference_text: String,
    pub device: DevicePreference,
    pub warmup: bool,
    pub request_timeout_secs: u64,
    pub max_upload_bytes: usize,
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            model: DEFAULT_MODEL.to_string(),
            backend: BackendKind::Remote,
            runner_url: DEFAULT_RUNNER_URL.to_string(),
            cache_dir: PathBuf::from("./cache"),
            cache_max_entries: None,
            reference_audio: PathBuf::from("./reference/gm-voice.wav"),
            reference_text: DEFAULT_REFERENCE_TEXT.to_string(),
            device: DevicePreference::Auto,
            warmup: false,
            request_timeout_secs: 300,
            max_upload_bytes: 10 * 1024 * 1024,
            cors_allowed_origins: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset or unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| non_empty(&lookup, key);

        let backend = match var("TTS_BACKEND").map(|v| v.parse::<BackendKind>()) {
            Some(Ok(kind)) => kind,
            Some(Err(e)) => {
                tracing::warn!("{e}; using {}", defaults.backend);
                defaults.backend
            }
            None => defaults.backend,
        };

        let device = match var("TTS_DEVICE").map(|v| v.parse::<DevicePreference>()) {
            Some(Ok(device)) => device,
            Some(Err(e)) => {
                tracing::warn!("{e}; using {}", defaults.device);
                defaults.device
            }
            None => defaults.device,
        };

        let warmup = var("TTS_WARMUP")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(defaults.warmup);

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS").map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            model: var("TTS_MODEL").unwrap_or(defaults.model),
            backend,
            runner_url: var("TTS_RUNNER_URL").unwrap_or(defaults.runner_url),
            cache_dir: var("TTS_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            cache_max_entries: parsed(&lookup, "TTS_CACHE_MAX_ENTRIES").or(defaults.cache_max_entries),
            reference_audio: var("TTS_REFERENCE_AUDIO")
                .map(PathBuf::from)
                .unwrap_or(defaults.reference_audio),
            reference_text: var("TTS_REFERENCE_TEXT").unwrap_or(defaults.reference_text),
            device,
            warmup,
            request_timeout_secs: parsed(&lookup, "REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout_secs),
            max_upload_bytes: parsed(&lookup, "MAX_UPLOAD_BYTES").unwrap_or(defaults.max_upload_bytes),
            cors_allowed_origins,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            model_id: self.model.clone(),
            cache_dir: self.cache_dir.clone(),
            cache_max_entries: self.cache_max_entries,
            reference_audio: self.reference_audio.clone(),
            reference_text: self.reference_text.clone(),
            device: self.device,
        }
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid HOST/PORT {}:{}: {e}", self.host, self.port))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, key).and_then(|v| v.trim().parse().ok())
}
