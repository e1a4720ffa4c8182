//! FluteVision Core
//!
//! Core types, traits, and utilities shared across FluteVision components.
//!
//! This crate provides:
//! - Hand landmark types indexed by anatomical joint
//! - The closed set of classification modes
//! - Error types, the caller-facing error taxonomy, and result handling

pub mod error;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use types::{HandLandmarks, Joint, Landmark, Mode, LANDMARKS_PER_HAND, MAX_HANDS};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::types::{HandLandmarks, Joint, Landmark, Mode};
}
