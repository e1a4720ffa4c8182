//! Hand landmark detection
//!
//! Landmark inference runs out of process. [`RemoteHandDetector`] posts each
//! frame to a sidecar (for example a MediaPipe Hands worker) and parses the
//! 21-point hands it returns.

use flutevision_core::{Error, HandLandmarks, Landmark, Result, MAX_HANDS};
use image::{DynamicImage, ImageOutputFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, warn};

/// Something that finds hands in an RGB image
///
/// Implementations may keep per-instance state and need not be reentrant;
/// callers serialize access.
pub trait HandDetector: Send {
    /// Detector name for logs
    fn name(&self) -> &str;

    /// Landmarks for every hand found, in detector order
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<HandLandmarks>>;

    /// Release any held resources
    fn close(&mut self) {}
}

/// Detector tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Sidecar URL accepting `POST image/png`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_max_num_hands")]
    pub max_num_hands: usize,

    #[serde(default = "default_min_detection_confidence")]
    pub min_detection_confidence: f64,

    /// Treat every frame independently instead of tracking across frames
    #[serde(default = "default_static_image_mode")]
    pub static_image_mode: bool,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            max_num_hands: default_max_num_hands(),
            min_detection_confidence: default_min_detection_confidence(),
            static_image_mode: default_static_image_mode(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8001/v1/hands".to_string()
}

fn default_max_num_hands() -> usize {
    MAX_HANDS
}

fn default_min_detection_confidence() -> f64 {
    0.3
}

fn default_static_image_mode() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    5000
}

/// Sidecar response body
#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    hands: Vec<DetectedHand>,
}

#[derive(Debug, Deserialize)]
struct DetectedHand {
    landmarks: Vec<Landmark>,
    #[serde(default)]
    handedness: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

/// Detector backed by an HTTP landmark sidecar
pub struct RemoteHandDetector {
    config: DetectorConfig,
    client: reqwest::blocking::Client,
}

impl RemoteHandDetector {
    /// Build the HTTP client; no request is made until the first frame
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::detector(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        image
            .write_to(&mut buf, ImageOutputFormat::Png)
            .map_err(|e| Error::detector(format!("failed to encode frame: {}", e)))?;
        Ok(buf.into_inner())
    }
}

/// Parse a sidecar response body into hands
pub fn parse_response(body: &[u8]) -> Result<Vec<HandLandmarks>> {
    let response: DetectResponse = serde_json::from_slice(body)
        .map_err(|e| Error::detector(format!("malformed detector response: {}", e)))?;

    response
        .hands
        .into_iter()
        .map(|hand| {
            debug!(
                handedness = hand.handedness.as_deref().unwrap_or("unknown"),
                score = hand.score.unwrap_or_default(),
                "hand detected"
            );
            HandLandmarks::try_from(hand.landmarks)
        })
        .collect()
}

impl HandDetector for RemoteHandDetector {
    fn name(&self) -> &str {
        "remote"
    }

    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<HandLandmarks>> {
        let png = Self::encode_png(image)?;

        let response = self
            .client
            .post(&self.config.endpoint)
            .query(&[
                ("max_num_hands", self.config.max_num_hands.to_string()),
                (
                    "min_detection_confidence",
                    self.config.min_detection_confidence.to_string(),
                ),
                ("static_image_mode", self.config.static_image_mode.to_string()),
            ])
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(png)
            .send()
            .map_err(|e| Error::detector(format!("detector request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::detector(format!("detector returned {}", status)));
        }

        let body = response
            .bytes()
            .map_err(|e| Error::detector(format!("failed to read detector response: {}", e)))?;
        parse_response(&body)
    }
}

/// Run a detector and keep at most [`MAX_HANDS`] hands
pub fn detect_hands(
    detector: &mut dyn HandDetector,
    image: &DynamicImage,
) -> Result<Vec<HandLandmarks>> {
    let mut hands = detector.detect(image)?;
    if hands.len() > MAX_HANDS {
        warn!(
            detector = detector.name(),
            reported = hands.len(),
            "Detector reported more than {} hands, keeping the first {}",
            MAX_HANDS,
            MAX_HANDS
        );
        hands.truncate(MAX_HANDS);
    }
    Ok(hands)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn landmarks_json(count: usize) -> String {
        let points: Vec<String> = (0..count)
            .map(|i| format!(r#"{{"x": {}, "y": 0.5, "z": -0.01}}"#, i as f64 / 100.0))
            .collect();
        format!("[{}]", points.join(","))
    }

    #[test]
    fn test_parse_two_hands() {
        let body = format!(
            r#"{{"hands": [
                {{"landmarks": {}, "handedness": "Left", "score": 0.97}},
                {{"landmarks": {}}}
            ]}}"#,
            landmarks_json(21),
            landmarks_json(21)
        );
        let hands = parse_response(body.as_bytes()).unwrap();
        assert_eq!(hands.len(), 2);
        assert_eq!(hands[0].points()[20].x, 0.2);
        assert_eq!(hands[1].points()[0].z, -0.01);
    }

    #[test]
    fn test_parse_no_hands() {
        assert!(parse_response(br#"{"hands": []}"#).unwrap().is_empty());
        assert!(parse_response(b"{}").unwrap().is_empty());
    }

    #[test]
    fn test_short_hand_is_error() {
        let body = format!(r#"{{"hands": [{{"landmarks": {}}}]}}"#, landmarks_json(20));
        let err = parse_response(body.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Detector(_)));
    }

    #[test]
    fn test_malformed_body() {
        assert!(matches!(
            parse_response(b"<html>"),
            Err(Error::Detector(_))
        ));
    }

    #[test]
    fn test_default_config() {
        let config: DetectorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_num_hands, 2);
        assert_eq!(config.min_detection_confidence, 0.3);
        assert!(config.static_image_mode);
    }

    struct Crowd(usize);

    impl HandDetector for Crowd {
        fn name(&self) -> &str {
            "crowd"
        }

        fn detect(&mut self, _image: &DynamicImage) -> Result<Vec<HandLandmarks>> {
            Ok((0..self.0)
                .map(|_| HandLandmarks::new([Landmark::default(); 21]))
                .collect())
        }
    }

    #[test]
    fn test_detect_hands_truncates() {
        let image = DynamicImage::new_rgb8(1, 1);
        assert_eq!(detect_hands(&mut Crowd(3), &image).unwrap().len(), 2);
        assert_eq!(detect_hands(&mut Crowd(1), &image).unwrap().len(), 1);
    }
}
