//! Per-mode artifact registry

use crate::artifact::ClassifierArtifact;
use crate::config::ModelsConfig;
use crate::engine::PredictionEngine;
use crate::model_loader::load_artifact;
use flutevision_core::Mode;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Load state of one mode
#[derive(Debug, Clone)]
pub struct ModeEntry {
    pub mode: Mode,
    pub artifact: Option<Arc<ClassifierArtifact>>,
    pub engine: Option<PredictionEngine>,
    pub load_error: Option<String>,
}

impl ModeEntry {
    fn empty(mode: Mode) -> Self {
        Self {
            mode,
            artifact: None,
            engine: None,
            load_error: None,
        }
    }

    /// A mode is ready once its engine exists
    pub fn is_ready(&self) -> bool {
        self.engine.is_some()
    }
}

/// Fixed table of one entry per mode
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    entries: [ModeEntry; 2],
    loaded: bool,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mode::ALL.map(ModeEntry::empty),
            loaded: false,
        }
    }

    /// Load every configured mode, returning the modes that are ready
    ///
    /// A failing mode is recorded and skipped. Once a load pass has run,
    /// later calls return the existing ready set until [`reset`](Self::reset).
    pub fn load_all(&mut self, config: &ModelsConfig) -> BTreeSet<Mode> {
        if self.loaded {
            return self.ready_modes();
        }

        info!("Initializing model registry with {} modes", Mode::ALL.len());

        for mode in Mode::ALL {
            let entry = &mut self.entries[mode.index()];

            let Some(source) = config.source_for(mode) else {
                warn!("✗ No artifact configured for mode {}", mode);
                entry.load_error = Some("no artifact configured".to_string());
                continue;
            };

            match load_artifact(&source) {
                Ok(artifact) => {
                    info!("✓ Loaded model: {} ({} labels)", mode, artifact.labels().len());
                    let artifact = Arc::new(artifact);
                    entry.engine = Some(PredictionEngine::new(Arc::clone(&artifact)));
                    entry.artifact = Some(artifact);
                    entry.load_error = None;
                }
                Err(e) => {
                    warn!("✗ Failed to load model {}: {}", mode, e);
                    entry.load_error = Some(e.to_string());
                }
            }
        }

        self.loaded = true;
        let ready = self.ready_modes();
        info!(
            "Model registry initialized with {}/{} modes",
            ready.len(),
            Mode::ALL.len()
        );
        ready
    }

    /// Install an already-built artifact for a mode
    pub fn insert(&mut self, mode: Mode, artifact: ClassifierArtifact) {
        let artifact = Arc::new(artifact);
        let entry = &mut self.entries[mode.index()];
        entry.engine = Some(PredictionEngine::new(Arc::clone(&artifact)));
        entry.artifact = Some(artifact);
        entry.load_error = None;
        self.loaded = true;
    }

    /// Drop every artifact and forget that a load happened
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn engine(&self, mode: Mode) -> Option<&PredictionEngine> {
        self.entries[mode.index()].engine.as_ref()
    }

    pub fn labels(&self, mode: Mode) -> Option<&[String]> {
        self.entries[mode.index()]
            .artifact
            .as_ref()
            .map(|a| a.labels())
    }

    pub fn entry(&self, mode: Mode) -> &ModeEntry {
        &self.entries[mode.index()]
    }

    pub fn ready_modes(&self) -> BTreeSet<Mode> {
        self.entries
            .iter()
            .filter(|e| e.is_ready())
            .map(|e| e.mode)
            .collect()
    }

    /// Whether a load pass has run
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
