//! Configuration for per-mode classifier artifacts

use crate::model_loader::ModelSource;
use flutevision_core::{Error, Mode, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Where each mode's artifact lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Base directory for relative artifact paths
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Artifact source keyed by mode name
    #[serde(default = "default_models")]
    pub models: BTreeMap<String, ModelSourceSpec>,
}

/// Model source specification (for config files)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelSourceSpec {
    /// Hugging Face Hub
    HuggingFace {
        repo_id: String,
        filename: String,
        #[serde(default)]
        revision: Option<String>,
    },

    /// Local file path
    Local { path: PathBuf },
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            models: default_models(),
        }
    }
}

impl ModelsConfig {
    /// Parse from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("invalid models config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Reject keys that do not name a mode
    pub fn validate(&self) -> Result<()> {
        for key in self.models.keys() {
            key.parse::<Mode>().map_err(|_| {
                Error::config(format!(
                    "unknown mode '{}' in models config (expected one of: {})",
                    key,
                    Mode::ALL
                        .iter()
                        .map(|m| m.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })?;
        }
        Ok(())
    }

    /// Resolved source for a mode, `None` when the mode is not configured
    pub fn source_for(&self, mode: Mode) -> Option<ModelSource> {
        let spec = self.models.get(mode.as_str())?;
        Some(match spec {
            ModelSourceSpec::Local { path } => {
                let path = expand_home(path);
                if path.is_absolute() {
                    ModelSource::LocalPath(path)
                } else {
                    ModelSource::LocalPath(expand_home(&self.models_dir).join(path))
                }
            }
            ModelSourceSpec::HuggingFace {
                repo_id,
                filename,
                revision,
            } => ModelSource::HuggingFace {
                repo_id: repo_id.clone(),
                revision: revision.clone(),
                filename: filename.clone(),
            },
        })
    }

    /// Point a mode at a local artifact
    pub fn with_local(mut self, mode: Mode, path: impl Into<PathBuf>) -> Self {
        self.models.insert(
            mode.as_str().to_string(),
            ModelSourceSpec::Local { path: path.into() },
        );
        self
    }

    /// Drop the source for a mode
    pub fn without(mut self, mode: Mode) -> Self {
        self.models.remove(mode.as_str());
        self
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("./models")
}

fn default_models() -> BTreeMap<String, ModelSourceSpec> {
    Mode::ALL
        .iter()
        .map(|mode| {
            (
                mode.as_str().to_string(),
                ModelSourceSpec::Local {
                    path: PathBuf::from(format!("{}_model.json", mode)),
                },
            )
        })
        .collect()
}
