//! Shared application state

use crate::config::ServerConfig;
use crate::limiter::RateLimiter;
use flutevision_vision::VisionService;
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::RwLock;
use std::sync::Arc;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    /// Prediction service; write-locked only to initialize or shut down
    pub service: Arc<RwLock<VisionService>>,

    /// Per-client limiter for prediction routes
    pub limiter: Arc<RateLimiter>,

    /// Prometheus handle for `/metrics`, absent when no recorder is installed
    pub metrics_handle: Option<PrometheusHandle>,

    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        service: VisionService,
        metrics_handle: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            service: Arc::new(RwLock::new(service)),
            limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
            metrics_handle,
            config: Arc::new(config),
        }
    }

    /// Initialize the service off the async runtime
    pub async fn initialize(&self) -> bool {
        let service = Arc::clone(&self.service);
        tokio::task::spawn_blocking(move || service.write().initialize())
            .await
            .unwrap_or(false)
    }

    /// Shut the service down off the async runtime
    pub async fn cleanup(&self) {
        let service = Arc::clone(&self.service);
        if let Err(e) = tokio::task::spawn_blocking(move || service.write().cleanup()).await {
            tracing::error!("Service cleanup failed: {}", e);
        }
    }
}
