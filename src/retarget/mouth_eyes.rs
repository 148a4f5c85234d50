//! Mouth, brows, mood, iris and blink extraction.

use crate::config::{EyeThresholds, FaceConfig, MoodMode};
use crate::fusion::channels::{names, ChannelStore};

use super::movement::MovementRecord;

/// Output blendshape names
pub mod shapes {
    pub const AA: &str = "aa";
    pub const OH: &str = "oh";
    pub const OU: &str = "ou";
    pub const IH: &str = "ih";
    pub const SAD: &str = "sad";
    pub const TONGUE: &str = "tongue";
    pub const PUFF: &str = "puff";
    pub const BROWS_UP: &str = "Brows up";
    pub const ANGRY: &str = "angry";
    pub const HAPPY: &str = "happy";
    pub const BLINK_LEFT: &str = "blinkLeft";
    pub const BLINK_RIGHT: &str = "blinkRight";
}

/// Optional channels below this are treated as noise
const EXTRA_FLOOR: f32 = 0.1;

fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Blink weight for one eye given its openness
pub fn blink(openness: f32, eye: &EyeThresholds, happy_factor: f32) -> f32 {
    if openness <= eye.close_threshold {
        happy_factor
    } else if openness < eye.open_threshold {
        let ratio =
            (openness - eye.close_threshold) / (eye.open_threshold - eye.close_threshold);
        clamp01((happy_factor - ratio) * eye.squint_ratio)
    } else {
        0.0
    }
}

/// Build the mouth and eye part of a movement record.
///
/// `mocap_source` selects the unscaled mouth path used when the face comes
/// from iFacialMocap.
pub fn extract_mouth_eyes(
    store: &ChannelStore,
    config: &FaceConfig,
    mocap_source: bool,
) -> MovementRecord {
    let mut record = MovementRecord::new();
    let b = &mut record.b;

    // Mouth
    let mouth = store.value(names::MOUTH);
    let aa = if mocap_source {
        mouth
    } else {
        clamp01((mouth - config.mouth_open_offset) * config.mouth_ratio)
    };
    b.insert(shapes::AA.into(), aa);

    for (channel, shape) in [
        (names::MOUTH_FUNNEL, shapes::OH),
        (names::MOUTH_PUCKER, shapes::OU),
        (names::MOUTH_STRETCH, shapes::IH),
    ] {
        if let Some(v) = store.get(channel) {
            b.insert(shape.into(), v);
        }
    }
    if let Some(frown) = store.get(names::MOUTH_FROWN) {
        let sad = b.get(shapes::SAD).copied().unwrap_or(0.0);
        b.insert(shapes::SAD.into(), sad.max(frown));
    }
    for (channel, shape) in [
        (names::TONGUE_OUT, shapes::TONGUE),
        (names::CHEEK_PUFF, shapes::PUFF),
    ] {
        if let Some(v) = store.get(channel).filter(|&v| v > EXTRA_FLOOR) {
            b.insert(shape.into(), v);
        }
    }

    // Brows
    let inner = store.value(names::BROWS);
    let outer = store.value(names::BROW_OUTER_UP);
    let brows = ((inner.max(outer) - config.brows_offset).max(0.0) * config.brows_ratio).min(1.0);
    b.insert(shapes::BROWS_UP.into(), brows);
    if let Some(down) = store.get(names::BROW_DOWN) {
        b.insert(shapes::ANGRY.into(), down);
    }

    // Mood
    let smile = store.get(names::MOUTH_SMILE);
    if let Some(s) = smile.filter(|&s| s > EXTRA_FLOOR) {
        b.insert(shapes::HAPPY.into(), s);
    }
    if config.mood == MoodMode::Auto && smile.is_none() {
        let auto = (store.value(names::AUTO) * config.mood_auto_ratio).clamp(-1.0, 1.0);
        let strength = (auto.abs() - config.mood_auto_offset).max(0.0);
        let shape = if auto < 0.0 { shapes::ANGRY } else { shapes::HAPPY };
        let current = b.get(shape).copied().unwrap_or(0.0);
        b.insert(shape.into(), current.max(strength));
    }

    // Iris
    let iris_yaw = finite_or_zero(
        (finite_or_zero(store.value(names::IRIS_POS)) - config.iris_pos_offset)
            * config.iris_pos_ratio,
    );
    let iris_pitch =
        finite_or_zero(-finite_or_zero(store.value(names::IRIS_Y_POS)) * config.iris_pos_ratio);
    record.rotation("leftEye", [iris_pitch, iris_yaw, 0.0]);
    record.rotation("rightEye", [iris_pitch, iris_yaw, 0.0]);

    // Blink, squinting less when smiling
    let happy = record.b.get(shapes::HAPPY).copied().unwrap_or(0.0);
    let happy_factor = if happy > 0.5 { 1.0 - (happy - 0.5) } else { 1.0 };

    let mut left = store.value(names::LEFT_EYE_OPEN);
    let mut right = store.value(names::RIGHT_EYE_OPEN);
    if config.eye_sync || (right - left).abs() < config.eye_link_threshold {
        let avg = (left + right) / 2.0;
        left = avg;
        right = avg;
    }
    record.blendshape(shapes::BLINK_RIGHT, blink(right, &config.right_eye, happy_factor));
    record.blendshape(shapes::BLINK_LEFT, blink(left, &config.left_eye, happy_factor));

    record
}
