//! VisionService scenarios with a scripted detector and on-disk artifacts

use flutevision_classifiers::ModelsConfig;
use flutevision_core::{Error, ErrorKind, HandLandmarks, Joint, Landmark, Result, LANDMARKS_PER_HAND};
use flutevision_vision::{
    detector_factory, DetectorConfig, HandDetector, ServiceState, VisionConfig, VisionService,
};
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Returns the same hands for every frame and records how it was used
struct ScriptedDetector {
    hands: std::result::Result<Vec<HandLandmarks>, String>,
    calls: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl HandDetector for ScriptedDetector {
    fn name(&self) -> &str {
        "scripted"
    }

    fn detect(&mut self, _image: &DynamicImage) -> Result<Vec<HandLandmarks>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.hands.clone().map_err(Error::detector)
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default, Clone)]
struct Probe {
    built: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl Probe {
    fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Open hand with fingers pointing up
fn open_hand(offset: f64) -> HandLandmarks {
    let mut points = [Landmark::default(); LANDMARKS_PER_HAND];
    points[Joint::Wrist.index()] = Landmark::new(offset + 0.48, 0.9);
    points[Joint::ThumbCmc.index()] = Landmark::new(offset + 0.40, 0.85);
    points[Joint::ThumbMcp.index()] = Landmark::new(offset + 0.35, 0.78);
    points[Joint::ThumbIp.index()] = Landmark::new(offset + 0.31, 0.72);
    points[Joint::ThumbTip.index()] = Landmark::new(offset + 0.28, 0.66);

    for (x, mcp) in [
        (0.42, Joint::IndexMcp),
        (0.48, Joint::MiddleMcp),
        (0.54, Joint::RingMcp),
        (0.60, Joint::PinkyMcp),
    ] {
        let base = mcp.index();
        points[base] = Landmark::new(offset + x, 0.70);
        points[base + 1] = Landmark::new(offset + x, 0.60);
        points[base + 2] = Landmark::new(offset + x, 0.52);
        points[base + 3] = Landmark::new(offset + x, 0.45);
    }
    HandLandmarks::new(points)
}

/// Open hand with the index fingertip folded onto its knuckle
fn index_folded(offset: f64) -> HandLandmarks {
    let mut points = *open_hand(offset).points();
    points[Joint::IndexTip.index()] = Landmark::new(offset + 0.42, 0.69);
    HandLandmarks::new(points)
}

/// Stump on feature 47 (second hand's index bend)
fn write_flute_artifact(dir: &Path) {
    let doc = serde_json::json!({
        "format_version": 1,
        "labels": ["B", "C", "D"],
        "test_accuracy": 96.0,
        "feature_count": 120,
        "model": {
            "type": "random_forest",
            "trees": [{
                "children_left": [1, -1, -1],
                "children_right": [2, -1, -1],
                "feature": [47, -2, -2],
                "threshold": [0.5, -2.0, -2.0],
                "value": [[1.0, 1.0, 1.0], [6.0, 2.0, 2.0], [1.0, 8.0, 1.0]]
            }]
        }
    });
    std::fs::write(dir.join("flute_model.json"), doc.to_string()).unwrap();
}

fn write_hand_artifact(dir: &Path) {
    let doc = serde_json::json!({
        "format_version": 1,
        "labels": ["open", "fist"],
        "feature_count": 120,
        "model": {
            "type": "random_forest",
            "trees": [{
                "children_left": [-1],
                "children_right": [-1],
                "feature": [-2],
                "threshold": [-2.0],
                "value": [[3.0, 1.0]]
            }]
        }
    });
    std::fs::write(dir.join("hand_model.json"), doc.to_string()).unwrap();
}

fn png() -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(8, 8))
        .write_to(&mut buf, ImageOutputFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn service(
    dir: &Path,
    hands: std::result::Result<Vec<HandLandmarks>, String>,
    probe: &Probe,
) -> VisionService {
    let config = VisionConfig {
        models: ModelsConfig {
            models_dir: dir.to_path_buf(),
            ..ModelsConfig::default()
        },
        detector: DetectorConfig::default(),
    };
    let probe = probe.clone();
    VisionService::new(
        config,
        detector_factory(move |_: &DetectorConfig| {
            probe.built.fetch_add(1, Ordering::SeqCst);
            Ok(ScriptedDetector {
                hands: hands.clone(),
                calls: Arc::clone(&probe.calls),
                closed: Arc::clone(&probe.closed),
            })
        }),
    )
}

#[test]
fn test_hand_missing_flute_present() {
    let dir = TempDir::new().unwrap();
    write_flute_artifact(dir.path());
    let probe = Probe::default();
    let mut service = service(dir.path(), Ok(vec![open_hand(0.0), index_folded(0.3)]), &probe);

    assert!(service.initialize());
    assert!(service.is_ready());
    assert_eq!(service.state(), ServiceState::PartiallyReady);

    assert!(matches!(
        service.list_labels("hand"),
        Err(Error::ModeNotLoaded(flutevision_core::Mode::Hand))
    ));
    assert_eq!(service.list_labels("flute").unwrap(), vec!["B", "C", "D"]);

    let outcome = service.predict(&png(), "flute").unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.gesture.as_deref(), Some("C"));
    assert_eq!(outcome.confidence, 0.8);
    let all = outcome.all_predictions.unwrap();
    assert_eq!(all.len(), 3);
    assert!((all.values().sum::<f64>() - 1.0).abs() < 1e-6);
}

#[test]
fn test_single_hand_takes_padding_branch() {
    let dir = TempDir::new().unwrap();
    write_flute_artifact(dir.path());
    let probe = Probe::default();
    let mut service = service(dir.path(), Ok(vec![index_folded(0.0)]), &probe);
    assert!(service.initialize());

    let outcome = service.predict(&png(), "flute").unwrap();
    assert_eq!(outcome.gesture.as_deref(), Some("B"));
    assert_eq!(outcome.confidence, 0.6);
}

#[test]
fn test_predict_unknown_mode() {
    let dir = TempDir::new().unwrap();
    write_flute_artifact(dir.path());
    let probe = Probe::default();
    let mut service = service(dir.path(), Ok(vec![open_hand(0.0)]), &probe);
    assert!(service.initialize());

    let err = service.predict(&png(), "unknown-mode").unwrap_err();
    assert!(matches!(err, Error::InvalidMode(_)));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(probe.calls(), 0);
}

#[test]
fn test_predict_mode_not_loaded() {
    let dir = TempDir::new().unwrap();
    write_flute_artifact(dir.path());
    let probe = Probe::default();
    let mut service = service(dir.path(), Ok(vec![open_hand(0.0)]), &probe);
    assert!(service.initialize());

    let err = service.predict(&png(), "hand").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotReady);
    assert_eq!(probe.calls(), 0);
}

#[test]
fn test_no_hands_is_unsuccessful_outcome() {
    let dir = TempDir::new().unwrap();
    write_flute_artifact(dir.path());
    let probe = Probe::default();
    let mut service = service(dir.path(), Ok(vec![]), &probe);
    assert!(service.initialize());

    let outcome = service.predict(&png(), "flute").unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.gesture, None);
    assert_eq!(outcome.confidence, 0.0);
    assert_eq!(outcome.message.as_deref(), Some("no hands detected"));
    assert!(outcome.all_predictions.is_none());
}

#[test]
fn test_bad_payloads() {
    let dir = TempDir::new().unwrap();
    write_flute_artifact(dir.path());
    let probe = Probe::default();
    let mut service = service(dir.path(), Ok(vec![open_hand(0.0)]), &probe);
    assert!(service.initialize());

    assert!(matches!(
        service.predict(&[], "flute"),
        Err(Error::MissingImage)
    ));
    let err = service.predict(b"GIF89a-but-not-really", "flute").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
    assert_eq!(probe.calls(), 0);
}

#[test]
fn test_extra_hands_truncated() {
    let dir = TempDir::new().unwrap();
    write_flute_artifact(dir.path());
    let probe = Probe::default();
    let hands = vec![open_hand(0.0), index_folded(0.3), open_hand(0.1)];
    let mut service = service(dir.path(), Ok(hands), &probe);
    assert!(service.initialize());

    let outcome = service.predict(&png(), "flute").unwrap();
    assert_eq!(outcome.gesture.as_deref(), Some("C"));
}

#[test]
fn test_detector_failure_is_internal_error() {
    let dir = TempDir::new().unwrap();
    write_flute_artifact(dir.path());
    let probe = Probe::default();
    let mut service = service(dir.path(), Err("sidecar timed out".into()), &probe);
    assert!(service.initialize());

    let err = service.predict(&png(), "flute").unwrap_err();
    assert!(matches!(err, Error::Detector(_)));
    assert_eq!(err.kind(), ErrorKind::Internal);
}

#[test]
fn test_all_modes_ready() {
    let dir = TempDir::new().unwrap();
    write_flute_artifact(dir.path());
    write_hand_artifact(dir.path());
    let probe = Probe::default();
    let mut service = service(dir.path(), Ok(vec![open_hand(0.0)]), &probe);

    assert!(service.initialize());
    assert_eq!(service.state(), ServiceState::Ready);
    assert_eq!(service.ready_modes().len(), 2);

    let outcome = service.predict(&png(), "hand").unwrap();
    assert_eq!(outcome.gesture.as_deref(), Some("open"));
    assert_eq!(outcome.confidence, 0.75);

    // Already ready: no second detector.
    assert!(service.initialize());
    assert_eq!(probe.built(), 1);
}

#[test]
fn test_no_artifacts_stays_uninitialized() {
    let dir = TempDir::new().unwrap();
    let probe = Probe::default();
    let mut service = service(dir.path(), Ok(vec![open_hand(0.0)]), &probe);

    assert!(!service.initialize());
    assert!(!service.is_ready());
    assert_eq!(service.state(), ServiceState::Uninitialized);
    assert!(probe.closed());
    assert!(matches!(
        service.predict(&png(), "flute"),
        Err(Error::NotReady)
    ));
}

#[test]
fn test_cleanup_and_restart() {
    let dir = TempDir::new().unwrap();
    write_flute_artifact(dir.path());
    let probe = Probe::default();
    let mut service = service(dir.path(), Ok(vec![open_hand(0.0)]), &probe);
    assert!(service.initialize());

    service.cleanup();
    assert!(probe.closed());
    assert_eq!(service.state(), ServiceState::Shutdown);
    assert!(!service.is_ready());
    assert!(matches!(
        service.predict(&png(), "flute"),
        Err(Error::NotReady)
    ));

    assert!(service.initialize());
    assert_eq!(service.state(), ServiceState::PartiallyReady);
    assert_eq!(probe.built(), 2);
    assert!(service.predict(&png(), "flute").unwrap().success);
}
