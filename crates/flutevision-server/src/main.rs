//! FluteVision
//!
//! Recognizes flute fingerings and hand gestures from camera frames.
//!
//! `serve` runs the HTTP API, `predict` classifies a single image from disk,
//! and `extract-dataset` turns a labeled image tree into training features.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flutevision_server::{create_router, extract_dataset, AppState, Overrides, ServerConfig};
use flutevision_vision::{HandDetector, RemoteHandDetector, VisionService};
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "flutevision")]
#[command(about = "Hand-landmark fingering recognition service", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    /// Listen address
    #[arg(long, global = true)]
    host: Option<String>,

    /// Listen port
    #[arg(short = 'P', long, global = true)]
    port: Option<u16>,

    /// Directory holding classifier artifacts
    #[arg(long, global = true)]
    models_dir: Option<PathBuf>,

    /// Landmark detector endpoint
    #[arg(long, global = true)]
    detector_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve,

    /// Classify one image file
    Predict {
        /// Recognition mode: flute or hand
        #[arg(short, long, default_value = "flute")]
        mode: String,

        /// Image to classify
        #[arg(short, long)]
        image: PathBuf,
    },

    /// Extract features from `<raw>/<label>/<session>/*.jpg` into JSON lines
    ExtractDataset {
        #[arg(long, default_value = "data/raw")]
        raw_dir: PathBuf,

        #[arg(long, default_value = "data/features.jsonl")]
        out: PathBuf,
    },
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            port: self.port,
            models_dir: self.models_dir.clone(),
            detector_url: self.detector_url.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let config = ServerConfig::load(&cli.config, &cli.overrides())
        .with_context(|| format!("loading {}", cli.config.display()))?;
    info!("Configuration loaded successfully");

    match cli.command {
        None | Some(Command::Serve) => serve(config).await,
        Some(Command::Predict { mode, image }) => {
            tokio::task::spawn_blocking(move || predict_file(config, &mode, image)).await?
        }
        Some(Command::ExtractDataset { raw_dir, out }) => {
            tokio::task::spawn_blocking(move || extract(config, raw_dir, out)).await?
        }
    }
}

async fn serve(config: ServerConfig) -> Result<()> {
    info!("Starting FluteVision API");
    info!("Models: {}", config.models.models_dir.display());
    info!("Detector: {}", config.detector.endpoint);

    let metrics_handle = init_metrics()?;

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("invalid listen address {}", config.bind_address()))?;

    let service = VisionService::with_remote_detector(config.vision_config());
    let state = AppState::new(config, service, Some(metrics_handle));

    info!("Initializing vision service...");
    if state.initialize().await {
        let modes = state.service.read().ready_modes();
        info!("✓ Vision service ready: {:?}", modes);
    } else {
        warn!("✗ Vision service not ready; predictions return 503 until models load");
    }

    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("FluteVision listening on http://{}", addr);

    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    state.cleanup().await;
    info!("Server shutdown complete");
    Ok(())
}

fn predict_file(config: ServerConfig, mode: &str, image: PathBuf) -> Result<()> {
    let bytes =
        std::fs::read(&image).with_context(|| format!("reading {}", image.display()))?;

    let mut service = VisionService::with_remote_detector(config.vision_config());
    if !service.initialize() {
        anyhow::bail!("no classifier artifacts could be loaded");
    }

    let result = service.predict(&bytes, mode);
    service.cleanup();

    let outcome = result?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn extract(config: ServerConfig, raw_dir: PathBuf, out: PathBuf) -> Result<()> {
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut detector = RemoteHandDetector::new(&config.detector)?;
    let result = extract_dataset(&raw_dir, &out, &mut detector);
    detector.close();

    match result {
        Ok(summary) => {
            info!(
                "✓ Wrote {} samples to {} ({} images skipped)",
                summary.total_samples(),
                out.display(),
                summary.total_skipped()
            );
            Ok(())
        }
        Err(e) => {
            error!("✗ Dataset extraction failed: {}", e);
            Err(e.into())
        }
    }
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("flutevision=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flutevision=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "flutevision_requests_total",
        "Total number of prediction requests received"
    );
    metrics::describe_counter!(
        "flutevision_predictions_total",
        "Predictions served by mode and outcome"
    );
    metrics::describe_histogram!(
        "flutevision_predict_latency_us",
        metrics::Unit::Microseconds,
        "End-to-end prediction latency in microseconds by mode"
    );
    metrics::describe_counter!("flutevision_errors_total", "Total number of errors by kind");

    info!("Metrics exporter initialized");
    Ok(handle)
}
