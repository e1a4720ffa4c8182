//! Geometric feature extraction from hand landmarks
//!
//! Turns the 0-2 hands reported for one image into the fixed-length vector the
//! trained classifiers consume. Both the dataset path and the live inference
//! path go through [`FeatureExtractor::extract`], so feature order and numeric
//! details here define artifact compatibility.
//!
//! Per hand, in order (47 values):
//! - bend: continuous bend ratio x5 (index, middle, ring, pinky, thumb), then
//!   binary "finger down" x5 in the same order
//! - fingertip orientation around the hand center x4
//! - fingertip spacing for 6 pairs
//! - fingertip height relativity x4
//! - PIP joint angle x4
//! - thumb angle, then distance/dx/dy from thumb tip to each fingertip (13)
//! - hand orientation and knuckle width (2)
//! - fingertip-to-MCP straightness x4
//!
//! The result is zero-padded (or truncated) to [`FEATURE_VECTOR_LEN`].

use flutevision_core::{HandLandmarks, Joint, Landmark};
use serde::Serialize;

/// Fixed length of every feature vector
pub const FEATURE_VECTOR_LEN: usize = 120;

/// Number of values actually computed for one hand
pub const FEATURES_PER_HAND: usize = 47;

/// Height-relativity value used when all fingertips share one height
const FLAT_HEIGHT: f64 = 0.5;

/// Joints of one finger, base to tip
#[derive(Debug, Clone, Copy)]
struct Finger {
    mcp: Joint,
    pip: Joint,
    dip: Joint,
    tip: Joint,
}

const INDEX: Finger = Finger {
    mcp: Joint::IndexMcp,
    pip: Joint::IndexPip,
    dip: Joint::IndexDip,
    tip: Joint::IndexTip,
};

const MIDDLE: Finger = Finger {
    mcp: Joint::MiddleMcp,
    pip: Joint::MiddlePip,
    dip: Joint::MiddleDip,
    tip: Joint::MiddleTip,
};

const RING: Finger = Finger {
    mcp: Joint::RingMcp,
    pip: Joint::RingPip,
    dip: Joint::RingDip,
    tip: Joint::RingTip,
};

const PINKY: Finger = Finger {
    mcp: Joint::PinkyMcp,
    pip: Joint::PinkyPip,
    dip: Joint::PinkyDip,
    tip: Joint::PinkyTip,
};

/// The thumb mapped onto finger roles: CMC acts as base, MCP as middle joint
const THUMB: Finger = Finger {
    mcp: Joint::ThumbCmc,
    pip: Joint::ThumbMcp,
    dip: Joint::ThumbIp,
    tip: Joint::ThumbTip,
};

const FINGERS: [Finger; 4] = [INDEX, MIDDLE, RING, PINKY];

/// Fingertip pairs for the spacing group: adjacent first, then spread pairs
const SPACING_PAIRS: [(Finger, Finger); 6] = [
    (INDEX, MIDDLE),
    (MIDDLE, RING),
    (RING, PINKY),
    (INDEX, RING),
    (INDEX, PINKY),
    (MIDDLE, PINKY),
];

/// Fixed-length feature vector for one image
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    /// Pad with zeros or truncate raw features to the fixed length
    pub fn from_raw(mut values: Vec<f64>) -> Self {
        values.resize(FEATURE_VECTOR_LEN, 0.0);
        Self { values }
    }

    /// Feature values in order
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Always [`FEATURE_VECTOR_LEN`]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Never true; present for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consume into the underlying values
    pub fn into_vec(self) -> Vec<f64> {
        self.values
    }
}

impl AsRef<[f64]> for FeatureVector {
    fn as_ref(&self) -> &[f64] {
        &self.values
    }
}

/// Stateless landmark-to-feature converter
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new extractor
    pub fn new() -> Self {
        Self
    }

    /// Extract the feature vector for all hands detected in one image.
    ///
    /// Returns `None` when no hands are given.
    pub fn extract(&self, hands: &[HandLandmarks]) -> Option<FeatureVector> {
        if hands.is_empty() {
            return None;
        }

        let mut features = Vec::with_capacity(FEATURES_PER_HAND * hands.len());
        for hand in hands {
            extract_hand(hand, &mut features);
        }

        Some(FeatureVector::from_raw(features))
    }
}

fn extract_hand(hand: &HandLandmarks, out: &mut Vec<f64>) {
    bend_features(hand, out);
    fingertip_orientations(hand, out);
    interfinger_spacing(hand, out);
    height_relativity(hand, out);
    joint_angles(hand, out);
    thumb_positioning(hand, out);
    hand_orientation(hand, out);
    finger_straightness(hand, out);
    debug_assert_eq!(out.len() % FEATURES_PER_HAND, 0);
}

fn bend_features(hand: &HandLandmarks, out: &mut Vec<f64>) {
    let fingers = [INDEX, MIDDLE, RING, PINKY, THUMB];

    for finger in fingers {
        out.push(bend_level(&hand[finger.tip], &hand[finger.pip], &hand[finger.mcp]));
    }

    // The thumb compares its tip against the IP joint.
    for finger in fingers {
        let reference = if finger.tip == Joint::ThumbTip {
            finger.dip
        } else {
            finger.pip
        };
        out.push(finger_down(&hand[finger.tip], &hand[reference]));
    }
}

fn fingertip_orientations(hand: &HandLandmarks, out: &mut Vec<f64>) {
    let wrist = &hand[Joint::Wrist];
    let middle_mcp = &hand[Joint::MiddleMcp];
    let center = Landmark::new((wrist.x + middle_mcp.x) / 2.0, (wrist.y + middle_mcp.y) / 2.0);

    for finger in FINGERS {
        out.push(orientation(&center, &hand[finger.tip]));
    }
}

fn interfinger_spacing(hand: &HandLandmarks, out: &mut Vec<f64>) {
    for (a, b) in SPACING_PAIRS {
        out.push(distance(&hand[a.tip], &hand[b.tip]));
    }
}

fn height_relativity(hand: &HandLandmarks, out: &mut Vec<f64>) {
    let heights = FINGERS.map(|finger| hand[finger.tip].y);
    let min = heights.iter().copied().fold(f64::INFINITY, f64::min);
    let max = heights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    if span > 0.0 {
        out.extend(heights.iter().map(|h| (h - min) / span));
    } else {
        out.extend([FLAT_HEIGHT; 4]);
    }
}

fn joint_angles(hand: &HandLandmarks, out: &mut Vec<f64>) {
    for finger in FINGERS {
        out.push(joint_angle(&hand[finger.mcp], &hand[finger.pip], &hand[finger.dip]));
    }
}

fn thumb_positioning(hand: &HandLandmarks, out: &mut Vec<f64>) {
    let thumb_tip = &hand[Joint::ThumbTip];
    out.push(orientation(&hand[Joint::ThumbCmc], thumb_tip));

    for finger in FINGERS {
        let tip = &hand[finger.tip];
        out.push(distance(thumb_tip, tip));
        out.push(thumb_tip.x - tip.x);
        out.push(thumb_tip.y - tip.y);
    }
}

fn hand_orientation(hand: &HandLandmarks, out: &mut Vec<f64>) {
    out.push(orientation(&hand[Joint::Wrist], &hand[Joint::MiddleMcp]));
    out.push(distance(&hand[Joint::IndexMcp], &hand[Joint::PinkyMcp]));
}

fn finger_straightness(hand: &HandLandmarks, out: &mut Vec<f64>) {
    for finger in FINGERS {
        out.push(distance(&hand[finger.tip], &hand[finger.mcp]));
    }
}

/// 2D Euclidean distance.
///
/// Uses `powf(0.5)` rather than `sqrt` to stay bit-identical with the
/// pow-based distance the training artifacts were produced with.
fn distance(a: &Landmark, b: &Landmark) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).powf(0.5)
}

/// 0 = straight, 1 = tip folded onto its base
fn bend_level(tip: &Landmark, pip: &Landmark, mcp: &Landmark) -> f64 {
    let tip_to_mcp = distance(tip, mcp);
    let pip_to_mcp = distance(pip, mcp);
    if pip_to_mcp > 0.0 {
        (1.0 - tip_to_mcp / pip_to_mcp).max(0.0)
    } else {
        0.0
    }
}

fn finger_down(tip: &Landmark, pip: &Landmark) -> f64 {
    if tip.y > pip.y {
        1.0
    } else {
        0.0
    }
}

/// Angle of the vector `from -> to` in radians
fn orientation(from: &Landmark, to: &Landmark) -> f64 {
    (to.y - from.y).atan2(to.x - from.x)
}

/// Angle at `vertex` between the rays towards `a` and `b`, in `[0, pi]`.
///
/// Zero-length rays yield 0.0.
fn joint_angle(a: &Landmark, vertex: &Landmark, b: &Landmark) -> f64 {
    let (v1x, v1y) = (a.x - vertex.x, a.y - vertex.y);
    let (v2x, v2y) = (b.x - vertex.x, b.y - vertex.y);

    let norms = (v1x * v1x + v1y * v1y).sqrt() * (v2x * v2x + v2y * v2y).sqrt();
    if norms == 0.0 {
        return 0.0;
    }

    let cos = (v1x * v2x + v1y * v2y) / norms;
    cos.clamp(-1.0, 1.0).acos()
}
