//! Head, neck and spine rotation plus optional arms.

use std::f32::consts::FRAC_PI_2;

use crate::config::{BodyConfig, RigConfig, TrackingMode};
use crate::fusion::channels::{arm_channel, names, ChannelStore, Side};

use super::arm::{arm_euler, ArmInput};
use super::movement::MovementRecord;

fn rad_limit(rad: f32) -> f32 {
    rad.clamp(-FRAC_PI_2, FRAC_PI_2)
}

/// Head position as `p.position`
pub fn extract_position(store: &ChannelStore) -> MovementRecord {
    let mut record = MovementRecord::new();
    record.position(
        "position",
        [
            store.value(names::X),
            store.value(names::Y),
            store.value(names::Z),
        ],
    );
    record
}

/// Spread head rotation across head, neck and spine, and solve the arms
/// when the tracking mode includes them
pub fn extract_body(
    store: &ChannelStore,
    body: &BodyConfig,
    rig: &RigConfig,
    mode: TrackingMode,
) -> MovementRecord {
    let mut record = MovementRecord::new();

    let pitch = store.value(names::PITCH);
    let yaw = store.value(names::YAW);
    let roll = store.value(names::ROLL);
    let tilt = store.value(names::TILT).clamp(-0.2, 0.2);
    let lean = store.value(names::LEAN).clamp(-1.0, 1.0) * 0.6;

    let joint = |ratio: f32, lean_share: f32, tilt_share: f32| {
        [
            rad_limit(pitch * ratio) * rig.x,
            rad_limit(yaw * ratio + lean * lean_share) * rig.y,
            rad_limit(roll * ratio + tilt * tilt_share) * rig.z,
        ]
    };
    record.rotation("head", joint(body.head_ratio, -0.3, -0.3));
    record.rotation("neck", joint(body.neck_ratio, -0.7, -0.7));
    record.rotation("spine", joint(body.chest_ratio, 1.0, 1.0));

    if mode.tracks_arms() {
        let head_x = store.value(names::X);
        for side in Side::BOTH {
            let input = ArmInput {
                wrist_x: store.value(&arm_channel(side, "WristX")) + head_x * body.head_hand_ratio,
                wrist_y: store.value(&arm_channel(side, "WristY")),
                yaw: store.value(&arm_channel(side, "Yaw")),
                roll: store.value(&arm_channel(side, "Roll")),
                pitch: store.value(&arm_channel(side, "Pitch")),
            };
            for (bone, euler) in arm_euler(input, side, rig).bones() {
                record.euler(format!("{}{}", side.prefix(), bone), euler);
            }
        }
    }

    record
}
