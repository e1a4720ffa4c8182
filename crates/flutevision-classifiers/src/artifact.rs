//! Persisted classifier artifacts
//!
//! An artifact is a JSON document holding the ordered label list, the
//! expected input width and the model itself. Random forests are embedded
//! inline; MLP documents reference a safetensors weights file that sits
//! next to the document.

use crate::classifier::Classifier;
use crate::features::FEATURE_VECTOR_LEN;
use crate::forest::{ForestSpec, RandomForest};
use flutevision_core::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Artifact schema version this build understands
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// On-disk artifact document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactDocument {
    pub format_version: u32,

    /// Class labels, index-aligned with classifier classes
    pub labels: Vec<String>,

    /// Held-out accuracy recorded at training time, in percent
    #[serde(default)]
    pub test_accuracy: Option<f64>,

    pub feature_count: usize,

    pub model: ModelSpec,
}

/// Serialized model, tagged by family
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelSpec {
    RandomForest(ForestSpec),
    Mlp {
        /// Safetensors file, relative to the document
        weights: PathBuf,
        /// Number of linear layers
        layers: usize,
    },
}

impl ArtifactDocument {
    /// Parse and check the document-level fields
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let doc: Self = serde_json::from_slice(bytes)?;

        if doc.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(Error::classifier(format!(
                "unsupported artifact format version {} (expected {})",
                doc.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        if doc.labels.is_empty() {
            return Err(Error::classifier("artifact has no labels"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = doc.labels.iter().find(|l| !seen.insert(l.as_str())) {
            return Err(Error::classifier(format!("duplicate label '{}'", dup)));
        }
        if doc.feature_count != FEATURE_VECTOR_LEN {
            return Err(Error::classifier(format!(
                "artifact expects {} features, extractor produces {}",
                doc.feature_count, FEATURE_VECTOR_LEN
            )));
        }

        Ok(doc)
    }

    /// Weights file referenced by the document, if any
    pub fn weights_file(&self) -> Option<&Path> {
        match &self.model {
            ModelSpec::Mlp { weights, .. } => Some(weights),
            ModelSpec::RandomForest(_) => None,
        }
    }
}

/// A trained classifier together with the labels it predicts
pub struct ClassifierArtifact {
    classifier: Box<dyn Classifier>,
    labels: Vec<String>,
    test_accuracy: Option<f64>,
    source: PathBuf,
    fingerprint: String,
}

impl std::fmt::Debug for ClassifierArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierArtifact")
            .field("classifier", &self.classifier.name())
            .field("labels", &self.labels)
            .field("test_accuracy", &self.test_accuracy)
            .field("source", &self.source)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

impl ClassifierArtifact {
    /// Wrap an in-memory classifier
    pub fn new(classifier: Box<dyn Classifier>, labels: Vec<String>) -> Result<Self> {
        if classifier.class_count() != labels.len() {
            return Err(Error::classifier(format!(
                "classifier has {} classes but {} labels were given",
                classifier.class_count(),
                labels.len()
            )));
        }
        Ok(Self {
            classifier,
            labels,
            test_accuracy: None,
            source: PathBuf::new(),
            fingerprint: String::new(),
        })
    }

    /// Build the classifier described by an already-parsed document
    pub fn from_document(doc: ArtifactDocument, path: &Path, fingerprint: String) -> Result<Self> {
        let n_classes = doc.labels.len();
        let classifier = build_classifier(&doc.model, path, n_classes, doc.feature_count)
            .map_err(|e| Error::artifact(path, e.to_string()))?;

        let mut artifact =
            Self::new(classifier, doc.labels).map_err(|e| Error::artifact(path, e.to_string()))?;
        artifact.test_accuracy = doc.test_accuracy;
        artifact.source = path.to_path_buf();
        artifact.fingerprint = fingerprint;
        Ok(artifact)
    }

    /// Attach the recorded test accuracy
    pub fn with_test_accuracy(mut self, accuracy: f64) -> Self {
        self.test_accuracy = Some(accuracy);
        self
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn test_accuracy(&self) -> Option<f64> {
        self.test_accuracy
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Hex SHA-256 of the artifact document bytes
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Hex SHA-256 digest
pub fn fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn build_classifier(
    model: &ModelSpec,
    path: &Path,
    n_classes: usize,
    n_features: usize,
) -> Result<Box<dyn Classifier>> {
    match model {
        ModelSpec::RandomForest(spec) => Ok(Box::new(RandomForest::from_spec(
            spec, n_classes, n_features,
        )?)),
        ModelSpec::Mlp { weights, layers } => {
            let weights = match path.parent() {
                Some(dir) if weights.is_relative() => dir.join(weights),
                _ => weights.clone(),
            };
            build_mlp(&weights, *layers, n_classes, n_features)
        }
    }
}

#[cfg(feature = "ml-models")]
fn build_mlp(
    weights: &Path,
    layers: usize,
    n_classes: usize,
    n_features: usize,
) -> Result<Box<dyn Classifier>> {
    let mlp = crate::mlp::MlpClassifier::load(weights, layers, n_classes, n_features)?;
    Ok(Box::new(mlp))
}

#[cfg(not(feature = "ml-models"))]
fn build_mlp(
    _weights: &Path,
    _layers: usize,
    _n_classes: usize,
    _n_features: usize,
) -> Result<Box<dyn Classifier>> {
    Err(Error::classifier(
        "mlp artifacts require the ml-models feature",
    ))
}
