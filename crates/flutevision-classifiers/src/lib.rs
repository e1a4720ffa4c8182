//! FluteVision Classifiers
//!
//! Everything between detected hand landmarks and a labeled prediction:
//! - [`features`]: the geometric feature extractor shared by dataset
//!   extraction and live inference
//! - classifier backends (random forest, Candle MLP) behind [`Classifier`]
//! - persisted artifacts and where to find them
//! - the per-mode [`ModelRegistry`] and its [`PredictionEngine`]s
//!
//! The Candle backend is compiled with the `ml-models` feature (on by default).

pub mod artifact;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod features;
pub mod forest;
#[cfg(feature = "ml-models")]
pub mod mlp;
pub mod model_loader;
pub mod registry;

pub use artifact::{ArtifactDocument, ClassifierArtifact, ModelSpec, ARTIFACT_FORMAT_VERSION};
pub use classifier::{Classifier, PredictionResult};
pub use config::{ModelSourceSpec, ModelsConfig};
pub use engine::PredictionEngine;
pub use features::{FeatureExtractor, FeatureVector, FEATURES_PER_HAND, FEATURE_VECTOR_LEN};
pub use forest::{DecisionTree, ForestSpec, RandomForest, TreeSpec};
#[cfg(feature = "ml-models")]
pub use mlp::MlpClassifier;
pub use model_loader::{load_artifact, ModelSource};
pub use registry::{ModeEntry, ModelRegistry};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::artifact::ClassifierArtifact;
    pub use crate::classifier::{Classifier, PredictionResult};
    pub use crate::config::ModelsConfig;
    pub use crate::engine::PredictionEngine;
    pub use crate::features::{FeatureExtractor, FeatureVector};
    pub use crate::registry::ModelRegistry;
}
