//! FluteVision Vision
//!
//! The image side of the pipeline: payload decoding, hand landmark
//! detection, and the [`VisionService`] that ties detection, feature
//! extraction and per-mode classification together.

pub mod decode;
pub mod detector;
pub mod service;

pub use decode::decode_image;
pub use detector::{detect_hands, parse_response, DetectorConfig, HandDetector, RemoteHandDetector};
pub use service::{
    detector_factory, DetectorFactory, PredictOutcome, ServiceState, VisionConfig, VisionService,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::detector::{DetectorConfig, HandDetector};
    pub use crate::service::{PredictOutcome, ServiceState, VisionConfig, VisionService};
}
