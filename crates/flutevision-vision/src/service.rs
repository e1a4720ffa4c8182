//! Multi-mode prediction service
//!
//! [`VisionService`] owns the hand detector and the per-mode model registry
//! and turns an uploaded image plus a mode name into a [`PredictOutcome`].
//! It is constructed explicitly and driven through
//! `initialize` / `predict` / `cleanup`.

use crate::decode::decode_image;
use crate::detector::{detect_hands, DetectorConfig, HandDetector, RemoteHandDetector};
use flutevision_classifiers::{FeatureExtractor, ModelRegistry, ModelsConfig, PredictionResult};
use flutevision_core::{Error, Mode, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Builds a detector from configuration
pub type DetectorFactory =
    Box<dyn Fn(&DetectorConfig) -> Result<Box<dyn HandDetector>> + Send + Sync>;

/// Wrap a typed detector constructor as a [`DetectorFactory`]
pub fn detector_factory<F, D>(build: F) -> DetectorFactory
where
    F: Fn(&DetectorConfig) -> Result<D> + Send + Sync + 'static,
    D: HandDetector + 'static,
{
    Box::new(
        move |config: &DetectorConfig| -> Result<Box<dyn HandDetector>> {
            Ok(Box::new(build(config)?))
        },
    )
}

/// Service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisionConfig {
    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub detector: DetectorConfig,
}

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Uninitialized,
    /// Every mode loaded
    Ready,
    /// At least one mode loaded
    PartiallyReady,
    Shutdown,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
            Self::PartiallyReady => "partially_ready",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Client-facing result of one prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictOutcome {
    pub success: bool,

    /// Predicted label
    pub gesture: Option<String>,

    pub confidence: f64,

    /// Probability per label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_predictions: Option<BTreeMap<String, f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PredictOutcome {
    /// Unsuccessful outcome that is not an error
    pub fn unsuccessful(message: impl Into<String>) -> Self {
        Self {
            success: false,
            gesture: None,
            confidence: 0.0,
            all_predictions: None,
            message: Some(message.into()),
        }
    }

    fn outcome_label(&self) -> &'static str {
        if self.success {
            "success"
        } else {
            "no_gesture"
        }
    }
}

impl From<PredictionResult> for PredictOutcome {
    fn from(result: PredictionResult) -> Self {
        Self {
            success: true,
            gesture: Some(result.label),
            confidence: result.confidence,
            all_predictions: Some(result.distribution.into_iter().collect()),
            message: None,
        }
    }
}

/// Hand-landmark classification service
pub struct VisionService {
    config: VisionConfig,
    factory: DetectorFactory,
    detector: Mutex<Option<Box<dyn HandDetector>>>,
    registry: ModelRegistry,
    extractor: FeatureExtractor,
    state: ServiceState,
}

impl VisionService {
    /// Create an uninitialized service
    pub fn new(config: VisionConfig, factory: DetectorFactory) -> Self {
        Self {
            config,
            factory,
            detector: Mutex::new(None),
            registry: ModelRegistry::new(),
            extractor: FeatureExtractor::new(),
            state: ServiceState::Uninitialized,
        }
    }

    /// Create a service that talks to the configured landmark sidecar
    pub fn with_remote_detector(config: VisionConfig) -> Self {
        Self::new(config, detector_factory(RemoteHandDetector::new))
    }

    /// Start the detector and load every configured mode
    ///
    /// Returns whether at least one mode is ready. Calling this on a ready
    /// service does nothing.
    pub fn initialize(&mut self) -> bool {
        if self.is_ready() {
            return true;
        }

        info!("Initializing vision service");
        self.registry.reset();
        self.release_detector();

        if let Err(e) = self.config.models.validate() {
            error!("Invalid models configuration: {}", e);
            self.state = ServiceState::Uninitialized;
            return false;
        }

        match (self.factory)(&self.config.detector) {
            Ok(detector) => {
                info!("✓ Hand detector ready: {}", detector.name());
                *self.detector.get_mut() = Some(detector);
            }
            Err(e) => {
                error!("✗ Failed to create hand detector: {}", e);
                self.state = ServiceState::Uninitialized;
                return false;
            }
        }

        let ready = self.registry.load_all(&self.config.models);
        self.state = if ready.is_empty() {
            warn!("No classifier artifacts loaded; service stays uninitialized");
            self.release_detector();
            ServiceState::Uninitialized
        } else if ready.len() == Mode::ALL.len() {
            ServiceState::Ready
        } else {
            ServiceState::PartiallyReady
        };

        info!(
            state = self.state.as_str(),
            modes = ?ready,
            "Vision service initialization finished"
        );
        !ready.is_empty()
    }

    /// Whether predictions can be served for at least one mode
    pub fn is_ready(&self) -> bool {
        matches!(
            self.state,
            ServiceState::Ready | ServiceState::PartiallyReady
        ) && !self.registry.ready_modes().is_empty()
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn ready_modes(&self) -> BTreeSet<Mode> {
        self.registry.ready_modes()
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    /// Ordered labels of a mode's artifact
    pub fn list_labels(&self, mode: &str) -> Result<Vec<String>> {
        let mode: Mode = mode.parse()?;
        if !self.is_ready() {
            return Err(Error::NotReady);
        }
        self.registry
            .labels(mode)
            .map(|labels| labels.to_vec())
            .ok_or(Error::ModeNotLoaded(mode))
    }

    /// Classify the hands in one image
    pub fn predict(&self, image: &[u8], mode: &str) -> Result<PredictOutcome> {
        let start = Instant::now();

        if !self.is_ready() {
            return Err(Error::NotReady);
        }
        let mode: Mode = mode.parse()?;
        let engine = self
            .registry
            .engine(mode)
            .ok_or(Error::ModeNotLoaded(mode))?;

        let image = decode_image(image)?;

        let hands = {
            let mut detector = self.detector.lock();
            let detector = detector.as_mut().ok_or(Error::NotReady)?;
            detect_hands(detector.as_mut(), &image)?
        };
        debug!(mode = %mode, hands = hands.len(), "landmarks detected");

        let outcome = if hands.is_empty() {
            PredictOutcome::unsuccessful("no hands detected")
        } else {
            match self.extractor.extract(&hands) {
                Some(features) => PredictOutcome::from(engine.predict(&features)?),
                None => PredictOutcome::unsuccessful("could not extract features"),
            }
        };

        let elapsed_us = start.elapsed().as_micros() as f64;
        metrics::histogram!("flutevision_predict_latency_us", "mode" => mode.as_str())
            .record(elapsed_us);
        metrics::counter!(
            "flutevision_predictions_total",
            "mode" => mode.as_str(),
            "outcome" => outcome.outcome_label()
        )
        .increment(1);

        Ok(outcome)
    }

    /// Stop the detector and drop every loaded artifact
    pub fn cleanup(&mut self) {
        self.release_detector();
        self.registry.reset();
        self.state = ServiceState::Shutdown;
        info!("Vision service shut down");
    }

    fn release_detector(&mut self) {
        if let Some(mut detector) = self.detector.get_mut().take() {
            debug!("Closing hand detector: {}", detector.name());
            detector.close();
        }
    }
}
