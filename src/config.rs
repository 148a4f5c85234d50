//! Configuration parsing and management for motion-fusion
//!
//! Every tunable the pipeline reads has a default here, so a missing key in a
//! TOML file never reaches the extractors as "undefined".

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, FusionError};

/// Default iFacialMocap UDP port
pub const DEFAULT_MOCAP_PORT: u16 = 49983;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub smoothing: SmoothingConfig,
    pub mocap: MocapConfig,
    pub face: FaceConfig,
    pub hands: HandsConfig,
    pub body: BodyConfig,
    pub rig: RigConfig,
    pub tracking: TrackingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FusionError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, FusionError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Load configuration from default paths
    pub fn load() -> Result<Self, FusionError> {
        let paths = [
            PathBuf::from("config.toml"),
            PathBuf::from("config/default.toml"),
            dirs_path().join("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), FusionError> {
        let s = &self.smoothing;
        if !s.sensitivity_scale.is_finite() || s.sensitivity_scale <= 0.0 {
            return Err(invalid(
                "smoothing.sensitivity_scale",
                "Sensitivity scale must be greater than 0",
            ));
        }
        for (field, value) in [
            ("smoothing.face", s.face),
            ("smoothing.pose", s.pose),
            ("smoothing.hand", s.hand),
            ("smoothing.other", s.other),
        ] {
            if !(0.0..=s.sensitivity_scale).contains(&value) {
                return Err(invalid(
                    field,
                    "Sensitivity must be between 0 and smoothing.sensitivity_scale",
                ));
            }
        }

        if !(0.0..=1.0).contains(&self.mocap.smoothing) {
            return Err(invalid(
                "mocap.smoothing",
                "Smoothing must be between 0.0 and 1.0",
            ));
        }
        if self.mocap.port == 0 {
            return Err(invalid("mocap.port", "Port must be greater than 0"));
        }

        for (side, eye) in [("left", &self.face.left_eye), ("right", &self.face.right_eye)] {
            if eye.close_threshold >= eye.open_threshold {
                return Err(invalid(
                    &format!("face.{}_eye.close_threshold", side),
                    "Close threshold must be below the open threshold",
                ));
            }
        }

        if !self.hands.finger_grip_ratio.is_finite() || self.hands.finger_grip_ratio <= 0.0 {
            return Err(invalid(
                "hands.finger_grip_ratio",
                "Grip ratio must be greater than 0",
            ));
        }
        if !self.hands.finger_spread_ratio.is_finite() {
            return Err(invalid(
                "hands.finger_spread_ratio",
                "Spread ratio must be a finite number",
            ));
        }

        if !self.hands.idle_timeout_secs.is_finite() || self.hands.idle_timeout_secs < 0.0 {
            return Err(invalid(
                "hands.idle_timeout_secs",
                "Idle timeout must be a finite, non-negative number",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> FusionError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
    .into()
}

/// Per key-type smoothing memory.
///
/// Each value is divided by `sensitivity_scale` before use, so with the
/// default scale of 1.0 a sensitivity of 0 passes raw values straight through
/// and 1 freezes the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub sensitivity_scale: f32,
    pub face: f32,
    pub pose: f32,
    pub hand: f32,
    pub other: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            sensitivity_scale: 1.0,
            face: 0.3,
            pose: 0.5,
            hand: 0.5,
            other: 0.3,
        }
    }
}

/// iFacialMocap network source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MocapConfig {
    /// Use iFacialMocap as the face source instead of webcam face landmarks
    pub enabled: bool,
    /// Address of the phone running iFacialMocap
    pub address: Option<IpAddr>,
    /// UDP port, used both for listening and for the handshake
    pub port: u16,
    /// Fixed low-pass memory for eye openness and iris channels
    pub smoothing: f32,
    /// Jaw-open values below this are forced to 0
    pub mouth_close_threshold: f32,
    /// Scale applied to the iris look differentials
    pub iris_scale: f32,
    /// Brow amplification
    pub brow_amp: f32,
    /// Smile amplification
    pub smile_amp: f32,
}

impl Default for MocapConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: None,
            port: DEFAULT_MOCAP_PORT,
            smoothing: 0.5,
            mouth_close_threshold: 0.05,
            iris_scale: 0.2,
            brow_amp: 2.5,
            smile_amp: 1.2,
        }
    }
}

/// Mood mapping mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoodMode {
    /// Derive happy/angry from the `auto` face channel
    #[default]
    Auto,
    /// Leave mood blendshapes to the renderer
    Manual,
}

/// Blink thresholds for one eye
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EyeThresholds {
    /// Openness at or below this is a full blink
    pub close_threshold: f32,
    /// Openness at or above this is fully open
    pub open_threshold: f32,
    /// Gain on the ramp between the two thresholds
    pub squint_ratio: f32,
}

impl Default for EyeThresholds {
    fn default() -> Self {
        Self {
            close_threshold: 0.2,
            open_threshold: 0.8,
            squint_ratio: 1.0,
        }
    }
}

/// Face retargeting constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceConfig {
    pub mouth_open_offset: f32,
    pub mouth_ratio: f32,
    pub brows_offset: f32,
    pub brows_ratio: f32,
    pub iris_pos_offset: f32,
    pub iris_pos_ratio: f32,
    /// Always drive both eyes from their average
    pub eye_sync: bool,
    /// Eyes closer than this are linked even without `eye_sync`
    pub eye_link_threshold: f32,
    pub left_eye: EyeThresholds,
    pub right_eye: EyeThresholds,
    pub mood: MoodMode,
    pub mood_auto_ratio: f32,
    pub mood_auto_offset: f32,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            mouth_open_offset: 0.05,
            mouth_ratio: 3.0,
            brows_offset: 0.2,
            brows_ratio: 2.0,
            iris_pos_offset: 0.0,
            iris_pos_ratio: 1.0,
            eye_sync: false,
            eye_link_threshold: 0.3,
            left_eye: EyeThresholds::default(),
            right_eye: EyeThresholds::default(),
            mood: MoodMode::Auto,
            mood_auto_ratio: 2.0,
            mood_auto_offset: 0.2,
        }
    }
}

/// Hand retargeting and idle decay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandsConfig {
    pub finger_grip_ratio: f32,
    pub finger_spread_ratio: f32,
    /// Seconds without a hand observation before it relaxes to neutral
    pub idle_timeout_secs: f32,
}

impl Default for HandsConfig {
    fn default() -> Self {
        Self {
            finger_grip_ratio: 1.0,
            finger_spread_ratio: 1.0,
            idle_timeout_secs: 1.0,
        }
    }
}

/// Head/neck/spine distribution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyConfig {
    pub head_ratio: f32,
    pub neck_ratio: f32,
    pub chest_ratio: f32,
    /// How much head translation shifts the wrists
    pub head_hand_ratio: f32,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            head_ratio: 0.5,
            neck_ratio: 0.3,
            chest_ratio: 0.15,
            head_hand_ratio: 0.5,
        }
    }
}

/// Rig axis conventions (VRM 0.x and 1.x flip X and Z)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            x: 1.0,
            y: 1.0,
            z: 1.0,
        }
    }
}

/// What the inference worker is asked to track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    Face,
    #[default]
    UpperBody,
    FullBody,
}

impl TrackingMode {
    /// Whether arm Euler overrides are produced in this mode
    pub fn tracks_arms(&self) -> bool {
        matches!(self, Self::UpperBody)
    }
}

/// Inference pacing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub mode: TrackingMode,
    /// Forwarded to the worker with every request
    pub multi_thread: bool,
    /// Delay between an accepted result and the next frame request
    pub frame_delay_ms: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            mode: TrackingMode::UpperBody,
            multi_thread: true,
            frame_delay_ms: 20,
        }
    }
}

/// Get the platform-specific configuration directory
fn dirs_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(config_dir).join("motion-fusion");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config/motion-fusion");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Application Support/motion-fusion");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("motion-fusion");
        }
    }

    PathBuf::from(".")
}
