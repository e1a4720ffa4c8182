//! Server configuration
//!
//! Layered, lowest precedence first: built-in defaults, an optional YAML
//! file, `FLUTEVISION__*` environment variables (`__` separates nesting, so
//! `FLUTEVISION__RATE_LIMIT__REQUESTS_PER_MINUTE=120`), then CLI flags.

use flutevision_classifiers::ModelsConfig;
use flutevision_core::{Error, Result};
use flutevision_vision::{DetectorConfig, VisionConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// CORS origins; `*` allows any
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub detector: DetectorConfig,
}

/// Per-client limits on prediction routes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: usize,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub models_dir: Option<PathBuf>,
    pub detector_url: Option<String>,
}

impl ServerConfig {
    /// Load configuration from file, environment and CLI overrides
    pub fn load(path: &Path, overrides: &Overrides) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("FLUTEVISION")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| Error::config(format!("failed to read configuration: {}", e)))?;

        let mut config: Self = settings
            .try_deserialize()
            .map_err(|e| Error::config(format!("invalid configuration: {}", e)))?;

        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI overrides
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(host) = &overrides.host {
            self.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(dir) = &overrides.models_dir {
            self.models.models_dir = dir.clone();
        }
        if let Some(url) = &overrides.detector_url {
            self.detector.endpoint = url.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.models.validate()?;
        if self.rate_limit.enabled && self.rate_limit.requests_per_minute == 0 {
            return Err(Error::config(
                "rate_limit.requests_per_minute must be positive when enabled",
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(Error::config("max_upload_bytes must be positive"));
        }
        Ok(())
    }

    /// Listen address as `host:port`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Configuration for the prediction service
    pub fn vision_config(&self) -> VisionConfig {
        VisionConfig {
            models: self.models.clone(),
            detector: self.detector.clone(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
            max_upload_bytes: default_max_upload_bytes(),
            rate_limit: RateLimitConfig::default(),
            models: ModelsConfig::default(),
            detector: DetectorConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_requests_per_minute() -> usize {
    60
}

fn default_true() -> bool {
    true
}
