//! Channel state store
//!
//! One owned map from channel name to its current smoothed value. The store
//! is seeded with the fixed schema of face, pose and hand channels at rest;
//! producers may add further channels (mocap extras) at runtime.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One atomic batch of raw channel values from a single source
pub type Observation = HashMap<String, f32>;

/// Known channel names
pub mod names {
    // Head rotation (radians) and translation
    pub const PITCH: &str = "pitch";
    pub const YAW: &str = "yaw";
    pub const ROLL: &str = "roll";
    pub const X: &str = "x";
    pub const Y: &str = "y";
    pub const Z: &str = "z";

    // Face
    pub const MOUTH: &str = "mouth";
    pub const LEFT_EYE_OPEN: &str = "leftEyeOpen";
    pub const RIGHT_EYE_OPEN: &str = "rightEyeOpen";
    pub const IRIS_POS: &str = "irisPos";
    pub const IRIS_Y_POS: &str = "irisYPos";
    pub const BROWS: &str = "brows";
    pub const AUTO: &str = "auto";

    // Pose
    pub const TILT: &str = "tilt";
    pub const LEAN: &str = "lean";

    // Mocap-only extras, absent until the first mocap frame
    pub const MOUTH_FUNNEL: &str = "mouthFunnel";
    pub const MOUTH_PUCKER: &str = "mouthPucker";
    pub const MOUTH_STRETCH: &str = "mouthStretch";
    pub const MOUTH_SMILE: &str = "mouthSmile";
    pub const MOUTH_FROWN: &str = "mouthFrown";
    pub const MOUTH_DIMPLE: &str = "mouthDimple";
    pub const MOUTH_PRESS: &str = "mouthPress";
    pub const MOUTH_SHRUG: &str = "mouthShrug";
    pub const MOUTH_ROLL: &str = "mouthRoll";
    pub const TONGUE_OUT: &str = "tongueOut";
    pub const BROW_OUTER_UP: &str = "browOuterUp";
    pub const BROW_DOWN: &str = "browDown";
    pub const CHEEK_PUFF: &str = "cheekPuff";
    pub const CHEEK_SQUINT: &str = "cheekSquint";
}

/// Channel family, used only to pick a smoothing sensitivity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    Face,
    Pose,
    Hand,
    Other,
}

const FACE_KEYS: &[&str] = &[
    names::PITCH,
    names::YAW,
    names::ROLL,
    names::X,
    names::Y,
    names::Z,
    names::MOUTH,
    names::LEFT_EYE_OPEN,
    names::RIGHT_EYE_OPEN,
    names::IRIS_POS,
    names::IRIS_Y_POS,
    names::BROWS,
    names::AUTO,
];

impl KeyType {
    /// Classify a channel name
    pub fn of(name: &str) -> Self {
        if FACE_KEYS.contains(&name) {
            return Self::Face;
        }
        if name == names::TILT || name == names::LEAN {
            return Self::Pose;
        }
        for side in Side::BOTH {
            if let Some(rest) = name.strip_prefix(side.prefix()) {
                if rest == "Spread" || Finger::ALL.iter().any(|f| f.name() == rest) {
                    return Self::Hand;
                }
                if ARM_SUFFIXES.contains(&rest) {
                    return Self::Pose;
                }
            }
        }
        Self::Other
    }
}

/// Left or right limb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    /// Channel and bone name prefix
    pub fn prefix(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    /// Mirror sign: +1 for the left limb, -1 for the right
    pub fn sign(&self) -> f32 {
        match self {
            Side::Left => 1.0,
            Side::Right => -1.0,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// The five fingers, in rig order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Little,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Little,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Finger::Thumb => "Thumb",
            Finger::Index => "Index",
            Finger::Middle => "Middle",
            Finger::Ring => "Ring",
            Finger::Little => "Little",
        }
    }
}

/// Pose channels carried per arm
const ARM_SUFFIXES: &[&str] = &["WristX", "WristY", "Yaw", "Roll", "Pitch"];

/// Curl channel of a finger, e.g. `leftIndex`
pub fn finger_channel(side: Side, finger: Finger) -> String {
    format!("{}{}", side.prefix(), finger.name())
}

/// Spread channel of a hand, e.g. `rightSpread`
pub fn spread_channel(side: Side) -> String {
    format!("{}Spread", side.prefix())
}

/// Arm pose channel, e.g. `leftWristX` or `rightYaw`
pub fn arm_channel(side: Side, suffix: &str) -> String {
    format!("{}{}", side.prefix(), suffix)
}

/// Finger curl value of an open hand
pub const NEUTRAL_FINGER: f32 = 1.0;
/// Spread value that maps to zero spread
pub const NEUTRAL_SPREAD: f32 = 0.1;

/// Rest observation for one hand: every finger open, no spread
pub fn neutral_hand(side: Side) -> Observation {
    let mut obs: Observation = Finger::ALL
        .iter()
        .map(|&f| (finger_channel(side, f), NEUTRAL_FINGER))
        .collect();
    obs.insert(spread_channel(side), NEUTRAL_SPREAD);
    obs
}

/// Current smoothed value of every channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelStore {
    values: HashMap<String, f32>,
}

impl Default for ChannelStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelStore {
    /// Create a store seeded with the default schema
    pub fn new() -> Self {
        let mut values = HashMap::new();

        for &key in FACE_KEYS {
            values.insert(key.to_string(), 0.0);
        }
        values.insert(names::LEFT_EYE_OPEN.to_string(), 1.0);
        values.insert(names::RIGHT_EYE_OPEN.to_string(), 1.0);

        values.insert(names::TILT.to_string(), 0.0);
        values.insert(names::LEAN.to_string(), 0.0);

        for side in Side::BOTH {
            // Arms hang straight down at rest
            values.insert(arm_channel(side, "WristX"), 0.0);
            values.insert(arm_channel(side, "WristY"), -1.0);
            values.insert(arm_channel(side, "Yaw"), 0.0);
            values.insert(arm_channel(side, "Roll"), 0.0);
            values.insert(arm_channel(side, "Pitch"), 0.0);
            values.extend(neutral_hand(side));
        }

        Self { values }
    }

    /// Current value, or `None` if the channel has never been written
    pub fn get(&self, name: &str) -> Option<f32> {
        self.values.get(name).copied()
    }

    /// Current value, treating an absent channel as 0
    pub fn value(&self, name: &str) -> f32 {
        self.get(name).unwrap_or(0.0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Overwrite a channel. Non-finite values are stored as 0.
    pub fn set(&mut self, name: &str, value: f32) {
        let value = if value.is_finite() { value } else { 0.0 };
        match self.values.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                self.values.insert(name.to_string(), value);
            }
        }
    }

    /// Overwrite a channel only if it is part of the store already.
    ///
    /// Returns whether the write happened.
    pub fn set_known(&mut self, name: &str, value: f32) -> bool {
        if !self.contains(name) {
            return false;
        }
        self.set(name, value);
        true
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.values.iter().map(|(k, &v)| (k.as_str(), v))
    }
}
