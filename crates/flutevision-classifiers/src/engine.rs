//! Prediction over one loaded artifact

use crate::artifact::ClassifierArtifact;
use crate::classifier::PredictionResult;
use crate::features::FeatureVector;
use flutevision_core::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;

/// Runs a mode's classifier and maps class indices back to labels
#[derive(Debug, Clone)]
pub struct PredictionEngine {
    artifact: Arc<ClassifierArtifact>,
}

impl PredictionEngine {
    pub fn new(artifact: Arc<ClassifierArtifact>) -> Self {
        Self { artifact }
    }

    /// Labels in class order
    pub fn labels(&self) -> &[String] {
        self.artifact.labels()
    }

    pub fn artifact(&self) -> &Arc<ClassifierArtifact> {
        &self.artifact
    }

    /// Classify one feature vector
    pub fn predict(&self, features: &FeatureVector) -> Result<PredictionResult> {
        let start = Instant::now();
        let classifier = self.artifact.classifier();
        let labels = self.artifact.labels();

        let index = classifier.predict_index(features.as_slice())?;
        let distribution = classifier.predict_distribution(features.as_slice())?;

        if distribution.len() != labels.len() {
            return Err(Error::classifier(format!(
                "{} returned {} probabilities for {} labels",
                classifier.name(),
                distribution.len(),
                labels.len()
            )));
        }
        let label = labels.get(index).ok_or_else(|| {
            Error::classifier(format!(
                "{} predicted class {} but only {} labels exist",
                classifier.name(),
                index,
                labels.len()
            ))
        })?;

        let confidence = distribution[index];
        let distribution = labels.iter().cloned().zip(distribution).collect();
        let latency_us = start.elapsed().as_micros() as u64;

        trace!(label = %label, confidence, latency_us, "prediction");

        Ok(PredictionResult {
            label: label.clone(),
            confidence,
            distribution,
            latency_us,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;

    struct Fixed {
        index: usize,
        distribution: Vec<f64>,
    }

    impl Classifier for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        fn class_count(&self) -> usize {
            self.distribution.len()
        }
        fn feature_count(&self) -> usize {
            120
        }
        fn predict_index(&self, _features: &[f64]) -> Result<usize> {
            Ok(self.index)
        }
        fn predict_distribution(&self, _features: &[f64]) -> Result<Vec<f64>> {
            Ok(self.distribution.clone())
        }
    }

    fn engine(index: usize, distribution: Vec<f64>, labels: &[&str]) -> PredictionEngine {
        let classifier = Box::new(Fixed {
            index,
            distribution,
        });
        let artifact = ClassifierArtifact::new(
            classifier,
            labels.iter().map(|l| l.to_string()).collect(),
        )
        .unwrap();
        PredictionEngine::new(Arc::new(artifact))
    }

    #[test]
    fn test_labels_zip_in_order() {
        let engine = engine(1, vec![0.1, 0.7, 0.2], &["C", "D", "E"]);
        let result = engine.predict(&FeatureVector::from_raw(vec![])).unwrap();

        assert_eq!(result.label, "D");
        assert_eq!(result.confidence, 0.7);
        let names: Vec<_> = result.distribution.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(names, vec!["C", "D", "E"]);
        assert!((result.distribution.iter().map(|(_, p)| p).sum::<f64>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_index_out_of_range() {
        let engine = engine(5, vec![0.5, 0.5], &["C", "D"]);
        let err = engine.predict(&FeatureVector::from_raw(vec![])).unwrap_err();
        assert!(matches!(err, Error::Classifier(_)));
    }
}
