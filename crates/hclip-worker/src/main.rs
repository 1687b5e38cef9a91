//! Clip watcher binary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hclip_chat::{ChatConfig, HypeTracker, MonitorConfig};
use hclip_media::{
    check_ffmpeg, check_ffprobe, ClipReadinessGuard, FfmpegConcatenator, FfmpegFrameSource,
};
use hclip_ml_client::MlClient;
use hclip_worker::metrics::init_metrics;
use hclip_worker::{run_chat, Analyzers, ClipOrchestrator, HypeGate, WorkerConfig};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hclip=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting hclip-worker");

    let mut config = WorkerConfig::from_env();

    for check in [check_ffmpeg(), check_ffprobe()] {
        if let Err(e) = check {
            error!("{}", e);
            std::process::exit(1);
        }
    }

    if let Some(port) = config.metrics_port {
        match init_metrics(port) {
            Ok(()) => info!(port, "Metrics exporter listening"),
            Err(e) => warn!("{}", e),
        }
    }

    let client = match MlClient::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create ML client: {}", e);
            std::process::exit(1);
        }
    };
    if !client.health_check().await.unwrap_or(false) {
        warn!("ML service is not healthy yet; samples will be dropped until it is");
    }

    let chat_config = match ChatConfig::from_env() {
        Ok(c) => Some(c),
        Err(e) => {
            warn!("Chat monitoring disabled: {}", e);
            if config.hype_gate == HypeGate::Required {
                warn!("No chat configured, hype gate downgraded to logging only");
                config.hype_gate = HypeGate::Disabled;
            }
            None
        }
    };
    info!("Worker config: {:?}", config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    let chat_failed = Arc::new(AtomicBool::new(false));
    let hype = HypeTracker::default();

    // Setup signal handler
    {
        let shutdown_tx = Arc::clone(&shutdown_tx);
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
            shutdown_tx.send(true).ok();
        });
    }

    let chat_handle = chat_config.map(|chat_config| {
        let shutdown_tx = Arc::clone(&shutdown_tx);
        let chat_failed = Arc::clone(&chat_failed);
        let shutdown_rx = shutdown_rx.clone();
        let hype = hype.clone();
        tokio::spawn(async move {
            if let Err(e) = run_chat(chat_config, MonitorConfig::from_env(), hype, shutdown_rx).await
            {
                error!("Chat task failed: {}", e);
                chat_failed.store(true, Ordering::SeqCst);
                shutdown_tx.send(true).ok();
            }
        })
    });

    let analyzers = Analyzers::from_client(client, Arc::new(FfmpegFrameSource::default()));
    let guard = ClipReadinessGuard::new(config.guard.clone());
    let mut orchestrator = ClipOrchestrator::new(
        config,
        guard,
        analyzers,
        Arc::new(FfmpegConcatenator),
        hype,
    );

    if let Err(e) = orchestrator.run(shutdown_rx).await {
        error!("Orchestrator error: {}", e);
        std::process::exit(1);
    }

    if let Some(handle) = chat_handle {
        handle.await.ok();
    }

    if chat_failed.load(Ordering::SeqCst) {
        error!("Exiting after chat connection loss");
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
