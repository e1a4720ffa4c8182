//! Artifact resolution: local files and the Hugging Face Hub

use crate::artifact::{fingerprint, ArtifactDocument, ClassifierArtifact};
use flutevision_core::{Error, Result};
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::path::PathBuf;
use tracing::{debug, info};

/// Source location for an artifact document
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    /// Load from local file system
    LocalPath(PathBuf),

    /// Download from Hugging Face Hub
    HuggingFace {
        repo_id: String,
        revision: Option<String>,
        filename: String,
    },
}

impl ModelSource {
    /// Human-readable location for logs
    pub fn describe(&self) -> String {
        match self {
            Self::LocalPath(path) => path.display().to_string(),
            Self::HuggingFace {
                repo_id,
                revision,
                filename,
            } => format!(
                "hf://{}@{}/{}",
                repo_id,
                revision.as_deref().unwrap_or("main"),
                filename
            ),
        }
    }

    /// Resolve the document to a local path, downloading if needed
    fn fetch(&self) -> Result<PathBuf> {
        match self {
            Self::LocalPath(path) => {
                if !path.exists() {
                    return Err(Error::artifact(path, "file not found"));
                }
                Ok(path.clone())
            }
            Self::HuggingFace { filename, .. } => self.fetch_sibling(filename),
        }
    }

    /// Make a file that lives next to the document available locally
    ///
    /// For hub sources the sibling is downloaded into the same snapshot
    /// directory; local siblings are already in place.
    fn fetch_sibling(&self, filename: &str) -> Result<PathBuf> {
        match self {
            Self::LocalPath(path) => Ok(path.with_file_name(filename)),
            Self::HuggingFace {
                repo_id, revision, ..
            } => {
                let api = Api::new()
                    .map_err(|e| Error::config(format!("Failed to initialize HF API: {}", e)))?;

                let repo = api.repo(Repo::with_revision(
                    repo_id.clone(),
                    RepoType::Model,
                    revision.clone().unwrap_or_else(|| "main".to_string()),
                ));

                debug!(repo = %repo_id, file = %filename, "fetching from hub");
                repo.get(filename).map_err(|e| {
                    Error::artifact(
                        self.describe(),
                        format!("Failed to download {} from HF: {}", filename, e),
                    )
                })
            }
        }
    }
}

/// Resolve, read, validate and build the artifact for one source
pub fn load_artifact(source: &ModelSource) -> Result<ClassifierArtifact> {
    let path = source.fetch()?;
    let bytes = std::fs::read(&path).map_err(|e| Error::artifact(&path, e.to_string()))?;
    let doc = ArtifactDocument::parse(&bytes).map_err(|e| Error::artifact(&path, e.to_string()))?;

    if let Some(weights) = doc.weights_file() {
        if weights.is_relative() {
            let name = weights.to_string_lossy();
            source.fetch_sibling(&name)?;
        }
    }

    let digest = fingerprint(&bytes);
    let artifact = ClassifierArtifact::from_document(doc, &path, digest)?;

    info!(
        source = %source.describe(),
        classifier = artifact.classifier().name(),
        labels = artifact.labels().len(),
        fingerprint = %artifact.fingerprint(),
        "Loaded classifier artifact"
    );

    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let local = ModelSource::LocalPath(PathBuf::from("/models/flute.json"));
        assert_eq!(local.describe(), "/models/flute.json");

        let hub = ModelSource::HuggingFace {
            repo_id: "org/flute".into(),
            revision: None,
            filename: "flute.json".into(),
        };
        assert_eq!(hub.describe(), "hf://org/flute@main/flute.json");
    }

    #[test]
    fn test_missing_local_file() {
        let source = ModelSource::LocalPath(PathBuf::from("/nonexistent/flute_model.json"));
        let err = load_artifact(&source).unwrap_err();
        assert!(matches!(err, Error::ArtifactLoad { .. }));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_local_sibling() {
        let source = ModelSource::LocalPath(PathBuf::from("/models/hand.json"));
        assert_eq!(
            source.fetch_sibling("hand.safetensors").unwrap(),
            PathBuf::from("/models/hand.safetensors")
        );
    }
}
