//! Sensor fusion core
//!
//! [`FusionCore`] owns the channel store and everything that writes to it.
//! It is driven from a single task, so no locking is involved.

pub mod channels;
pub mod idle;
pub mod mocap;
pub mod smoothing;

pub use channels::{ChannelStore, KeyType, Observation, Side};
pub use idle::IdleDecay;
pub use smoothing::Resolver;

use std::time::Instant;

use crate::config::Config;
use crate::retarget::{compose_movement, MovementRecord};
use crate::tracking::ifacialmocap::MocapFrame;
use crate::tracking::pacing::HolisticLandmarks;

/// Store, resolver and idle monitor behind one owner
#[derive(Debug)]
pub struct FusionCore {
    config: Config,
    store: ChannelStore,
    resolver: Resolver,
    idle: IdleDecay,
}

impl FusionCore {
    pub fn new(config: Config) -> Self {
        Self::with_start(config, Instant::now())
    }

    /// Create a core whose idle timers start at `now`
    pub fn with_start(config: Config, now: Instant) -> Self {
        let resolver = Resolver::new(&config.smoothing);
        let idle = IdleDecay::from_secs(config.hands.idle_timeout_secs, now);
        Self {
            config,
            store: ChannelStore::new(),
            resolver,
            idle,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &ChannelStore {
        &self.store
    }

    /// Whether iFacialMocap drives the face instead of the webcam
    pub fn mocap_face(&self) -> bool {
        self.config.mocap.enabled
    }

    /// Apply one holistic result in face, pose, left hand, right hand order.
    ///
    /// Hands missing from the result decay toward neutral once idle. Returns
    /// whether a movement record should be published for this result.
    pub fn apply_holistic(&mut self, landmarks: &HolisticLandmarks, now: Instant) -> bool {
        if let Some(face) = &landmarks.face {
            if !self.mocap_face() {
                self.resolver.resolve(&mut self.store, face);
            }
        }
        if let Some(pose) = &landmarks.pose {
            self.resolver.resolve(&mut self.store, pose);
        }

        for (side, hand) in [
            (Side::Left, &landmarks.left_hand),
            (Side::Right, &landmarks.right_hand),
        ] {
            match hand {
                Some(hand) => {
                    self.resolver.resolve_hand(&mut self.store, hand);
                    self.idle.observe(side, now);
                }
                None => {
                    if self.idle.decay(side, now, &mut self.store, &self.resolver) {
                        tracing::trace!("{} hand idle, relaxing", side);
                    }
                }
            }
        }

        landmarks.face.is_some() || self.mocap_face()
    }

    /// Apply a merged iFacialMocap snapshot
    pub fn apply_mocap_frame(&mut self, frame: &MocapFrame) {
        mocap::apply_mocap(&mut self.store, &frame.face, &self.config.mocap);
    }

    /// Composite the current store into a movement record
    pub fn movement(&self) -> MovementRecord {
        compose_movement(&self.store, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::channels::{finger_channel, names, Finger, NEUTRAL_FINGER};
    use crate::tracking::ifacialmocap::blendshapes as bs;
    use std::time::Duration;

    fn obs(pairs: &[(&str, f32)]) -> Observation {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.smoothing.face = 0.0;
        config.smoothing.pose = 0.0;
        config.smoothing.hand = 0.5;
        config
    }

    #[test]
    fn test_holistic_order_and_publish_flag() {
        let start = Instant::now();
        let mut core = FusionCore::with_start(config(), start);

        let result = HolisticLandmarks {
            face: Some(obs(&[(names::MOUTH, 0.4)])),
            pose: Some(obs(&[(names::LEAN, 0.2)])),
            ..HolisticLandmarks::default()
        };
        assert!(core.apply_holistic(&result, start));
        assert_eq!(core.store().get(names::MOUTH), Some(0.4));
        assert_eq!(core.store().get(names::LEAN), Some(0.2));

        let pose_only = HolisticLandmarks {
            pose: Some(obs(&[(names::TILT, 0.1)])),
            ..HolisticLandmarks::default()
        };
        assert!(!core.apply_holistic(&pose_only, start));
    }

    #[test]
    fn test_mocap_suppresses_webcam_face() {
        let mut cfg = config();
        cfg.mocap.enabled = true;
        let start = Instant::now();
        let mut core = FusionCore::with_start(cfg, start);

        let result = HolisticLandmarks {
            face: Some(obs(&[(names::MOUTH, 0.9)])),
            ..HolisticLandmarks::default()
        };
        assert!(core.apply_holistic(&result, start));
        assert_eq!(core.store().get(names::MOUTH), Some(0.0));

        core.apply_mocap_frame(&MocapFrame {
            changed: obs(&[(bs::JAW_OPEN, 50.0)]),
            face: obs(&[(bs::JAW_OPEN, 50.0)]),
        });
        assert!((core.store().value(names::MOUTH) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_missing_hand_decays_after_timeout() {
        let start = Instant::now();
        let mut core = FusionCore::with_start(config(), start);
        let index = finger_channel(Side::Left, Finger::Index);

        let gripping = HolisticLandmarks {
            left_hand: Some(obs(&[(index.as_str(), 0.0)])),
            ..HolisticLandmarks::default()
        };
        core.apply_holistic(&gripping, start);
        assert!((core.store().value(&index) - 0.5).abs() < 1e-6);

        // Still within the timeout: hand holds
        let empty = HolisticLandmarks::default();
        core.apply_holistic(&empty, start + Duration::from_millis(500));
        assert!((core.store().value(&index) - 0.5).abs() < 1e-6);

        core.apply_holistic(&empty, start + Duration::from_secs(2));
        let v = core.store().value(&index);
        assert!(v > 0.5 && v < NEUTRAL_FINGER);
    }

    #[test]
    fn test_unknown_hand_channels_are_ignored() {
        let start = Instant::now();
        let mut core = FusionCore::with_start(config(), start);
        let before = core.store().len();
        let result = HolisticLandmarks {
            right_hand: Some(obs(&[("rightWristNoise", 3.0)])),
            ..HolisticLandmarks::default()
        };
        core.apply_holistic(&result, start);
        assert_eq!(core.store().len(), before);
    }

    #[test]
    fn test_movement_reflects_store() {
        let start = Instant::now();
        let mut core = FusionCore::with_start(config(), start);
        let result = HolisticLandmarks {
            face: Some(obs(&[(names::YAW, 0.4)])),
            ..HolisticLandmarks::default()
        };
        core.apply_holistic(&result, start);
        let movement = core.movement();
        assert!((movement.r["head"][1] - 0.2).abs() < 1e-6);
    }
}
