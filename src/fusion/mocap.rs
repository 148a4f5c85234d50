//! iFacialMocap → channel store mapping.
//!
//! Mocap frames skip the key-type resolver: head rotation is assigned
//! directly, eye and iris channels use a fixed low-pass, and the remaining
//! face channels are written as-is after scaling.

use crate::config::MocapConfig;
use crate::tracking::ifacialmocap::blendshapes as bs;

use super::channels::{names, ChannelStore, Observation};
use super::smoothing::low_pass;

/// Blendshape value rescaled from 0–100 to 0–1; absent or NaN reads as 0
fn unit(face: &Observation, key: &str) -> f32 {
    match face.get(key) {
        Some(&v) if !v.is_nan() => v / 100.0,
        _ => 0.0,
    }
}

fn pair(face: &Observation, left: &str, right: &str) -> f32 {
    (unit(face, left) + unit(face, right)) * 0.5
}

/// Apply one merged iFacialMocap face snapshot to the store
pub fn apply_mocap(store: &mut ChannelStore, face: &Observation, config: &MocapConfig) {
    // Head rotation arrives in degrees and bypasses smoothing
    for (source, target) in [
        (bs::HEAD_PITCH, names::PITCH),
        (bs::HEAD_YAW, names::YAW),
        (bs::HEAD_ROLL, names::ROLL),
    ] {
        if let Some(&deg) = face.get(source) {
            if deg.is_finite() {
                store.set(target, deg.to_radians());
            }
        }
    }

    let smooth = |store: &mut ChannelStore, key: &str, target: f32| {
        let old = store.value(key);
        store.set(key, low_pass(old, target, config.smoothing));
    };

    // Eyes
    smooth(store, names::LEFT_EYE_OPEN, 1.0 - unit(face, bs::EYE_BLINK_L));
    smooth(store, names::RIGHT_EYE_OPEN, 1.0 - unit(face, bs::EYE_BLINK_R));

    let iris_x = (unit(face, bs::EYE_LOOK_IN_L) + unit(face, bs::EYE_LOOK_OUT_R))
        - (unit(face, bs::EYE_LOOK_OUT_L) + unit(face, bs::EYE_LOOK_IN_R));
    smooth(store, names::IRIS_POS, iris_x * config.iris_scale);

    let iris_y = (unit(face, bs::EYE_LOOK_UP_L) + unit(face, bs::EYE_LOOK_UP_R))
        - (unit(face, bs::EYE_LOOK_DOWN_L) + unit(face, bs::EYE_LOOK_DOWN_R));
    smooth(store, names::IRIS_Y_POS, iris_y * config.iris_scale);

    // Mouth, jaw thresholded so a resting mouth reads exactly closed
    let mut jaw = unit(face, bs::JAW_OPEN);
    if jaw < config.mouth_close_threshold {
        jaw = 0.0;
    }
    store.set(names::MOUTH, jaw.min(1.0));
    store.set(names::MOUTH_FUNNEL, unit(face, bs::MOUTH_FUNNEL).min(1.0));
    store.set(names::MOUTH_PUCKER, unit(face, bs::MOUTH_PUCKER).min(1.0));
    store.set(
        names::MOUTH_STRETCH,
        pair(face, bs::MOUTH_STRETCH_L, bs::MOUTH_STRETCH_R).min(1.0),
    );
    store.set(
        names::MOUTH_SMILE,
        (pair(face, bs::MOUTH_SMILE_L, bs::MOUTH_SMILE_R) * config.smile_amp).min(1.0),
    );
    store.set(
        names::MOUTH_FROWN,
        pair(face, bs::MOUTH_FROWN_L, bs::MOUTH_FROWN_R).min(1.0),
    );
    store.set(
        names::MOUTH_DIMPLE,
        pair(face, bs::MOUTH_DIMPLE_L, bs::MOUTH_DIMPLE_R).min(1.0),
    );
    store.set(
        names::MOUTH_PRESS,
        pair(face, bs::MOUTH_PRESS_L, bs::MOUTH_PRESS_R).min(1.0),
    );
    store.set(
        names::MOUTH_SHRUG,
        pair(face, bs::MOUTH_SHRUG_LOWER, bs::MOUTH_SHRUG_UPPER).min(1.0),
    );
    store.set(
        names::MOUTH_ROLL,
        pair(face, bs::MOUTH_ROLL_LOWER, bs::MOUTH_ROLL_UPPER).min(1.0),
    );
    store.set(names::TONGUE_OUT, unit(face, bs::TONGUE_OUT));

    // Brows
    store.set(
        names::BROWS,
        (unit(face, bs::BROW_INNER_UP) * config.brow_amp).min(1.0),
    );
    store.set(
        names::BROW_OUTER_UP,
        (pair(face, bs::BROW_OUTER_UP_L, bs::BROW_OUTER_UP_R) * config.brow_amp).min(1.0),
    );
    store.set(
        names::BROW_DOWN,
        (pair(face, bs::BROW_DOWN_L, bs::BROW_DOWN_R) * config.brow_amp).min(1.0),
    );

    // Cheeks
    store.set(names::CHEEK_PUFF, unit(face, bs::CHEEK_PUFF));
    store.set(
        names::CHEEK_SQUINT,
        pair(face, bs::CHEEK_SQUINT_L, bs::CHEEK_SQUINT_R),
    );
}
