//! Planar two-bone arm model.
//!
//! Wrist position relative to the shoulder is given in arm lengths, with
//! `(0, -1)` the arm hanging straight down. The upper arm points at the wrist
//! and is lifted by the elbow angle needed to shorten the reach; the forearm
//! folds back by twice that angle. Hand yaw, roll and pitch rotate the hand
//! bone directly.

use glam::Vec2;
use std::f32::consts::FRAC_PI_2;

use crate::config::RigConfig;
use crate::fusion::channels::Side;

use super::movement::EulerOverride;

/// Raw arm channels for one side, each expected in `[-1, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ArmInput {
    pub wrist_x: f32,
    pub wrist_y: f32,
    pub yaw: f32,
    pub roll: f32,
    pub pitch: f32,
}

/// Euler overrides for the three arm bones of one side
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmPose {
    pub upper_arm: EulerOverride,
    pub lower_arm: EulerOverride,
    pub hand: EulerOverride,
}

impl ArmPose {
    /// `(bone suffix, rotation)` pairs, e.g. `("UpperArm", ..)`
    pub fn bones(&self) -> [(&'static str, EulerOverride); 3] {
        [
            ("UpperArm", self.upper_arm),
            ("LowerArm", self.lower_arm),
            ("Hand", self.hand),
        ]
    }
}

fn unit(v: f32) -> f32 {
    if v.is_finite() {
        v.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Solve one arm
pub fn arm_euler(input: ArmInput, side: Side, rig: &RigConfig) -> ArmPose {
    let sign = side.sign();

    // Outward is +x for both sides
    let wrist = Vec2::new(sign * unit(input.wrist_x), unit(input.wrist_y)).clamp_length_max(1.0);
    let reach = wrist.length();
    let direction = wrist.y.atan2(wrist.x);
    let elbow = reach.clamp(0.0, 1.0).acos();

    let upper = EulerOverride::xyz(0.0, 0.0, sign * (direction + elbow) * rig.z);
    let lower = EulerOverride::xyz(0.0, 0.0, sign * -2.0 * elbow * rig.z);
    let hand = EulerOverride::xyz(
        unit(input.pitch) * FRAC_PI_2 * rig.x,
        sign * unit(input.yaw) * FRAC_PI_2 * rig.y,
        sign * unit(input.roll) * FRAC_PI_2 * rig.z,
    );

    ArmPose {
        upper_arm: upper,
        lower_arm: lower,
        hand,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_3, FRAC_PI_6};

    fn solve(wrist_x: f32, wrist_y: f32, side: Side) -> ArmPose {
        arm_euler(
            ArmInput {
                wrist_x,
                wrist_y,
                ..ArmInput::default()
            },
            side,
            &RigConfig::default(),
        )
    }

    #[test]
    fn test_rest_pose_hangs_down() {
        let left = solve(0.0, -1.0, Side::Left);
        assert!((left.upper_arm.z + FRAC_PI_2).abs() < 1e-5);
        assert!(left.lower_arm.z.abs() < 1e-5);

        let right = solve(0.0, -1.0, Side::Right);
        assert!((right.upper_arm.z - FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_outstretched_arm_is_t_pose() {
        let left = solve(1.0, 0.0, Side::Left);
        assert!(left.upper_arm.z.abs() < 1e-5);
        let right = solve(-1.0, 0.0, Side::Right);
        assert!(right.upper_arm.z.abs() < 1e-5);
    }

    #[test]
    fn test_short_reach_bends_elbow() {
        let left = solve(0.0, -0.5, Side::Left);
        // acos(0.5) = 60deg
        assert!((left.upper_arm.z + FRAC_PI_6).abs() < 1e-5);
        assert!((left.lower_arm.z + 2.0 * FRAC_PI_3).abs() < 1e-5);
    }

    #[test]
    fn test_inputs_are_clamped() {
        let wild = arm_euler(
            ArmInput {
                wrist_x: 5.0,
                wrist_y: f32::NAN,
                yaw: 3.0,
                roll: -9.0,
                pitch: 0.0,
            },
            Side::Left,
            &RigConfig::default(),
        );
        assert!(wild.upper_arm.is_finite() && wild.lower_arm.is_finite() && wild.hand.is_finite());
        assert!((wild.hand.y - FRAC_PI_2).abs() < 1e-5);
        assert!((wild.hand.z + FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_bone_names() {
        let pose = solve(0.0, -1.0, Side::Right);
        let names: Vec<_> = pose.bones().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["UpperArm", "LowerArm", "Hand"]);
    }
}
