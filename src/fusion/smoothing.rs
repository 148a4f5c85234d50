//! Temporal smoothing resolver.
//!
//! One-pole low-pass per channel: `v = (1 - sr) * raw + sr * previous`, with
//! `sr = sensitivity(key_type) / sensitivity_scale`. A larger `sr` keeps more
//! of the old value and responds slower.

use crate::config::SmoothingConfig;

use super::channels::{ChannelStore, KeyType, Observation};

/// Blend `raw` into `previous`. Non-finite results collapse to 0.
pub fn low_pass(previous: f32, raw: f32, sr: f32) -> f32 {
    let v = (1.0 - sr) * raw + sr * previous;
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Applies observations to a [`ChannelStore`]
#[derive(Debug, Clone)]
pub struct Resolver {
    scale: f32,
    face: f32,
    pose: f32,
    hand: f32,
    other: f32,
}

impl Resolver {
    pub fn new(config: &SmoothingConfig) -> Self {
        Self {
            scale: config.sensitivity_scale,
            face: config.face,
            pose: config.pose,
            hand: config.hand,
            other: config.other,
        }
    }

    /// Normalized smoothing coefficient for a key type
    pub fn coefficient(&self, key_type: KeyType) -> f32 {
        let sensitivity = match key_type {
            KeyType::Face => self.face,
            KeyType::Pose => self.pose,
            KeyType::Hand => self.hand,
            KeyType::Other => self.other,
        };
        sensitivity / self.scale
    }

    /// Resolve a face or pose observation.
    ///
    /// Each channel picks its coefficient from its own key type. Channels not
    /// yet in the store are blended against 0.
    pub fn resolve(&self, store: &mut ChannelStore, observation: &Observation) {
        for (name, &raw) in observation {
            let sr = self.coefficient(KeyType::of(name));
            let previous = store.value(name);
            store.set(name, low_pass(previous, raw, sr));
        }
    }

    /// Resolve a hand observation with the hand coefficient.
    ///
    /// Only channels already in the store are updated, so noise channels from
    /// hand tracking never enter the schema. Returns how many were applied.
    pub fn resolve_hand(&self, store: &mut ChannelStore, observation: &Observation) -> usize {
        let sr = self.coefficient(KeyType::Hand);
        let mut applied = 0;
        for (name, &raw) in observation {
            if let Some(previous) = store.get(name) {
                store.set_known(name, low_pass(previous, raw, sr));
                applied += 1;
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::channels::names;
    use proptest::prelude::*;

    fn resolver(sensitivity: f32) -> Resolver {
        Resolver::new(&SmoothingConfig {
            sensitivity_scale: 1.0,
            face: sensitivity,
            pose: sensitivity,
            hand: sensitivity,
            other: sensitivity,
        })
    }

    fn obs(pairs: &[(&str, f32)]) -> Observation {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_zero_sensitivity_passes_raw_value() {
        let mut store = ChannelStore::new();
        store.set(names::MOUTH, 0.9);
        resolver(0.0).resolve(&mut store, &obs(&[(names::MOUTH, 0.25)]));
        assert_eq!(store.get(names::MOUTH), Some(0.25));
    }

    #[test]
    fn test_full_sensitivity_freezes_channel() {
        let mut store = ChannelStore::new();
        store.set(names::YAW, 0.4);
        let r = resolver(1.0);
        for raw in [1.0, -3.0, 100.0] {
            r.resolve(&mut store, &obs(&[(names::YAW, raw)]));
        }
        assert_eq!(store.get(names::YAW), Some(0.4));
    }

    #[test]
    fn test_half_sensitivity_averages() {
        let mut store = ChannelStore::new();
        resolver(0.5).resolve(&mut store, &obs(&[(names::MOUTH, 1.0)]));
        assert!((store.value(names::MOUTH) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_scale_divides_sensitivity() {
        let r = Resolver::new(&SmoothingConfig {
            sensitivity_scale: 4.0,
            face: 2.0,
            ..SmoothingConfig::default()
        });
        assert!((r.coefficient(KeyType::Face) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_non_finite_observation_becomes_zero() {
        let mut store = ChannelStore::new();
        store.set(names::ROLL, 0.3);
        resolver(0.2).resolve(&mut store, &obs(&[(names::ROLL, f32::NAN)]));
        assert_eq!(store.get(names::ROLL), Some(0.0));
    }

    #[test]
    fn test_new_face_channel_blends_against_zero() {
        let mut store = ChannelStore::new();
        resolver(0.25).resolve(&mut store, &obs(&[("cheekWiggle", 1.0)]));
        assert!((store.value("cheekWiggle") - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_hand_gate_ignores_unknown_channels() {
        let mut store = ChannelStore::new();
        let applied = resolver(0.0).resolve_hand(
            &mut store,
            &obs(&[("leftIndex", 0.2), ("leftPinkyToe", 0.7)]),
        );
        assert_eq!(applied, 1);
        assert_eq!(store.get("leftIndex"), Some(0.2));
        assert!(!store.contains("leftPinkyToe"));
    }

    proptest! {
        #[test]
        fn prop_result_is_convex_combination(
            previous in -10.0f32..10.0,
            raw in -10.0f32..10.0,
            sr in 0.0f32..=1.0,
        ) {
            let v = low_pass(previous, raw, sr);
            let lo = previous.min(raw) - 1e-4;
            let hi = previous.max(raw) + 1e-4;
            prop_assert!(v >= lo && v <= hi);
        }
    }
}
