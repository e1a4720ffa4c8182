//! Feature extraction over a labeled image tree
//!
//! Walks `<raw>/<label>/<session>/*.jpg`, runs each image through the same
//! detector and [`FeatureExtractor`] used for live inference, and writes one
//! JSON line `{"label": .., "features": [..]}` per image with hands.

use flutevision_classifiers::{FeatureExtractor, FeatureVector};
use flutevision_core::{Error, Result};
use flutevision_vision::{decode_image, detect_hands, HandDetector};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// One extracted training sample
#[derive(Debug, Serialize)]
struct Sample<'a> {
    label: &'a str,
    features: &'a FeatureVector,
}

/// Per-label sample counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelCounts {
    pub samples: usize,
    pub skipped: usize,
}

/// What an extraction run produced
#[derive(Debug, Clone, Default)]
pub struct DatasetSummary {
    pub labels: BTreeMap<String, LabelCounts>,
}

impl DatasetSummary {
    pub fn total_samples(&self) -> usize {
        self.labels.values().map(|c| c.samples).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.labels.values().map(|c| c.skipped).sum()
    }
}

/// Extract features for every image under `raw_dir` into `out` (JSON lines)
pub fn extract_dataset(
    raw_dir: &Path,
    out: &Path,
    detector: &mut dyn HandDetector,
) -> Result<DatasetSummary> {
    if !raw_dir.is_dir() {
        return Err(Error::config(format!(
            "raw data directory not found: {}",
            raw_dir.display()
        )));
    }

    let extractor = FeatureExtractor::new();
    let mut writer = BufWriter::new(File::create(out)?);
    let mut summary = DatasetSummary::default();

    for label_dir in sorted_dirs(raw_dir)? {
        let Some(label) = label_dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let counts = summary.labels.entry(label.to_string()).or_default();

        for session_dir in sorted_dirs(&label_dir)? {
            for image_path in sorted_images(&session_dir)? {
                match extract_one(&image_path, detector, &extractor) {
                    Ok(Some(features)) => {
                        serde_json::to_writer(&mut writer, &Sample { label, features: &features })?;
                        writer.write_all(b"\n")?;
                        counts.samples += 1;
                    }
                    Ok(None) => counts.skipped += 1,
                    Err(e) => {
                        warn!("Skipping {}: {}", image_path.display(), e);
                        counts.skipped += 1;
                    }
                }
            }
        }

        info!(
            "✓ {}: {} samples (skipped {} with no hands)",
            label, counts.samples, counts.skipped
        );
    }

    writer.flush()?;
    Ok(summary)
}

fn extract_one(
    path: &Path,
    detector: &mut dyn HandDetector,
    extractor: &FeatureExtractor,
) -> Result<Option<FeatureVector>> {
    let bytes = std::fs::read(path)?;
    let image = decode_image(&bytes)?;
    let hands = detect_hands(detector, &image)?;
    Ok(extractor.extract(&hands))
}

fn sorted_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn sorted_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && is_image {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}
