use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use tts_core::{factory_for, TtsEngine};
use tts_server::{build_router, config::ServerConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    async_main().await
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting voice TTS server...");

    let config = ServerConfig::from_env();
    info!(
        "Server configuration loaded: model={}, backend={}, device={}, cache_dir={}, timeout={}s",
        config.model,
        config.backend,
        config.device,
        config.cache_dir.display(),
        config.request_timeout_secs
    );

    if config.reference_audio.is_file() {
        info!("Reference audio: {}", config.reference_audio.display());
    } else {
        warn!("No reference audio at {}", config.reference_audio.display());
        warn!("Voice cloning stays off until a ~3 second WAV clip is placed there");
        warn!("or uploaded to POST /reference (multipart fields: audio, text).");
    }

    let factory = factory_for(config.backend, &config.runner_url);
    let engine = Arc::new(TtsEngine::new(config.engine_config(), factory));

    if config.warmup {
        let engine = Arc::clone(&engine);
        info!("Warming up TTS engine (model download may take a while)...");
        match tokio::task::spawn_blocking(move || engine.warmup()).await {
            Ok(Ok(())) => info!("TTS engine ready"),
            Ok(Err(e)) => error!("Warmup failed, will retry on first request: {e}"),
            Err(e) => error!("Warmup task failed: {e}"),
        }
    } else {
        info!("TTS model loads on first synthesis request");
    }

    let addr = config.socket_addr()?;
    let app = build_router(AppState {
        engine,
        config: config.clone(),
    });

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT.")
    })?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
