//! Classifier trait and common types

use flutevision_core::Result;
use serde::Serialize;

/// Trait for all trained classifier backends
///
/// Class indices are the classifier's internal ordering; the owning artifact
/// maps index `i` to its `i`-th label.
pub trait Classifier: Send + Sync {
    /// Get the classifier family name
    fn name(&self) -> &str;

    /// Number of classes the classifier distinguishes
    fn class_count(&self) -> usize;

    /// Input dimensionality the classifier was trained on
    fn feature_count(&self) -> usize;

    /// Index of the most likely class
    fn predict_index(&self, features: &[f64]) -> Result<usize>;

    /// Probability per class, index-aligned with `predict_index`
    fn predict_distribution(&self, features: &[f64]) -> Result<Vec<f64>>;
}

/// Result of one prediction
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    /// Predicted label
    pub label: String,

    /// Probability of the predicted label (0.0-1.0)
    pub confidence: f64,

    /// Probability for every label, in artifact label order
    pub distribution: Vec<(String, f64)>,

    /// Latency in microseconds
    pub latency_us: u64,
}

impl PredictionResult {
    /// Check if confidence meets a threshold
    pub fn exceeds_threshold(&self, threshold: f64) -> bool {
        self.confidence >= threshold
    }

    /// Probability recorded for one label
    pub fn probability_of(&self, label: &str) -> Option<f64> {
        self.distribution
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, p)| *p)
    }
}

/// Index of the first maximum, ignoring NaN entries
pub(crate) fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if v <= current => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
