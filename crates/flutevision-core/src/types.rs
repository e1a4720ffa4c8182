//! Core types for FluteVision

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;
use std::str::FromStr;

/// Number of landmarks the detector reports for one hand
pub const LANDMARKS_PER_HAND: usize = 21;

/// Maximum number of hands considered per image
pub const MAX_HANDS: usize = 2;

/// A single normalized hand-joint coordinate produced by the detector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    /// Horizontal position, normalized to image width
    pub x: f64,

    /// Vertical position, normalized to image height (grows downward)
    pub y: f64,

    /// Relative depth; zero for 2D detectors
    #[serde(default)]
    pub z: f64,
}

impl Landmark {
    /// Create a 2D landmark
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Create a 3D landmark
    pub fn with_depth(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Anatomical joint index within a hand (wrist plus 4 joints per finger)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Joint {
    Wrist = 0,
    ThumbCmc = 1,
    ThumbMcp = 2,
    ThumbIp = 3,
    ThumbTip = 4,
    IndexMcp = 5,
    IndexPip = 6,
    IndexDip = 7,
    IndexTip = 8,
    MiddleMcp = 9,
    MiddlePip = 10,
    MiddleDip = 11,
    MiddleTip = 12,
    RingMcp = 13,
    RingPip = 14,
    RingDip = 15,
    RingTip = 16,
    PinkyMcp = 17,
    PinkyPip = 18,
    PinkyDip = 19,
    PinkyTip = 20,
}

impl Joint {
    /// Position of this joint in a detector landmark list
    pub fn index(self) -> usize {
        self as usize
    }
}

/// The ordered 21 landmarks of one detected hand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Landmark>", into = "Vec<Landmark>")]
pub struct HandLandmarks {
    points: [Landmark; LANDMARKS_PER_HAND],
}

impl HandLandmarks {
    /// Build a hand from exactly 21 landmarks
    pub fn new(points: [Landmark; LANDMARKS_PER_HAND]) -> Self {
        Self { points }
    }

    /// All landmarks in joint order
    pub fn points(&self) -> &[Landmark; LANDMARKS_PER_HAND] {
        &self.points
    }

    /// Landmark for a joint
    pub fn get(&self, joint: Joint) -> &Landmark {
        &self.points[joint.index()]
    }
}

impl Index<Joint> for HandLandmarks {
    type Output = Landmark;

    fn index(&self, joint: Joint) -> &Landmark {
        self.get(joint)
    }
}

impl TryFrom<Vec<Landmark>> for HandLandmarks {
    type Error = Error;

    fn try_from(points: Vec<Landmark>) -> Result<Self> {
        let count = points.len();
        let points: [Landmark; LANDMARKS_PER_HAND] = points.try_into().map_err(|_| {
            Error::detector(format!(
                "expected {} landmarks per hand, got {}",
                LANDMARKS_PER_HAND, count
            ))
        })?;
        Ok(Self { points })
    }
}

impl From<HandLandmarks> for Vec<Landmark> {
    fn from(hand: HandLandmarks) -> Self {
        hand.points.to_vec()
    }
}

/// Label taxonomy / classifier selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Flute fingerings
    Flute,
    /// Generic hand gestures
    Hand,
}

impl Mode {
    /// Every mode, in table order
    pub const ALL: [Mode; 2] = [Mode::Flute, Mode::Hand];

    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flute => "flute",
            Self::Hand => "hand",
        }
    }

    /// Slot of this mode in fixed-size per-mode tables
    pub fn index(self) -> usize {
        match self {
            Self::Flute => 0,
            Self::Hand => 1,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "flute" => Ok(Self::Flute),
            "hand" => Ok(Self::Hand),
            other => Err(Error::InvalidMode(other.to_string())),
        }
    }
}
