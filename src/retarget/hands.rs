//! Finger curl and spread → finger bone rotations.
//!
//! Each finger has one curl channel (1.0 open, 0.0 fist) and each hand one
//! spread channel. Curls drive all three segments around z; spread fans the
//! proximal segments around y. The thumb swings on a different axis mix.

use crate::config::{HandsConfig, RigConfig};
use crate::fusion::channels::{finger_channel, spread_channel, ChannelStore, Finger, Side};

use super::movement::MovementRecord;

const FINGER_SEGMENTS: [&str; 3] = ["Distal", "Intermediate", "Proximal"];
/// Thumb segments with their curl weight in degrees
const THUMB_SEGMENTS: [(&str, f32); 3] = [("Distal", 40.0), ("Metacarpal", 60.0), ("Proximal", 20.0)];
const THUMB_SWING_DEG: f32 = 20.0;
const FINGER_CURL_DEG: f32 = 70.0;

/// Curl channel value that counts as a full grip, before the grip ratio
fn grip_rate(finger: Finger) -> f32 {
    match finger {
        Finger::Thumb => 0.8,
        Finger::Index | Finger::Middle | Finger::Ring => 0.7,
        Finger::Little => 0.6,
    }
}

/// Proximal fan angle at full spread, in degrees
fn spread_rate(finger: Finger) -> f32 {
    match finger {
        Finger::Thumb => 0.0,
        Finger::Index => -30.0,
        Finger::Middle => -10.0,
        Finger::Ring => 10.0,
        Finger::Little => 30.0,
    }
}

fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn bone(side: Side, finger: Finger, segment: &str) -> String {
    format!("{}{}{}", side.prefix(), finger.name(), segment)
}

/// Build finger bone rotations for both hands
pub fn extract_hands(store: &ChannelStore, hands: &HandsConfig, rig: &RigConfig) -> MovementRecord {
    let mut record = MovementRecord::new();

    for side in Side::BOTH {
        let sign = side.sign();
        let spread_raw = store.value(&spread_channel(side));

        for finger in Finger::ALL {
            let rate = grip_rate(finger) * hands.finger_grip_ratio;
            let fan = spread_rate(finger) * hands.finger_spread_ratio;
            let raw = store.value(&finger_channel(side, finger));

            // 0 when open, 1 when fully gripped; a degenerate rate never grips
            let ratio = if rate > 0.0 {
                finite_or_zero(1.0 - raw.min(rate).max(0.0) / rate)
            } else {
                0.0
            };
            let spread_in = if raw < 0.0 { 0.1 } else { spread_raw };
            let spread_deg = finite_or_zero((spread_in - 0.1).clamp(-0.2, 1.0) * fan);

            if finger == Finger::Thumb {
                for (segment, weight) in THUMB_SEGMENTS {
                    let curl = (sign * ratio * weight).to_radians();
                    let swing = (sign * (0.5 - (0.5 - ratio).abs()) * THUMB_SWING_DEG).to_radians();
                    record.rotation(bone(side, finger, segment), [0.0, curl * rig.y, swing * rig.z]);
                }
            } else {
                let curl = (sign * ratio * FINGER_CURL_DEG).to_radians();
                let spread = (sign * spread_deg).to_radians();
                for segment in FINGER_SEGMENTS {
                    let rotation = if segment == "Proximal" {
                        [0.0, spread * rig.y, curl * rig.z]
                    } else {
                        [0.0, 0.0, curl * rig.z]
                    };
                    record.rotation(bone(side, finger, segment), rotation);
                }
            }
        }
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(store: &ChannelStore) -> MovementRecord {
        extract_hands(store, &HandsConfig::default(), &RigConfig::default())
    }

    #[test]
    fn test_open_hand_is_flat() {
        let record = extract(&ChannelStore::new());
        // 5 fingers x 3 segments x 2 hands
        assert_eq!(record.r.len(), 30);
        for (bone, rotation) in &record.r {
            for v in rotation {
                assert!(v.abs() < 1e-6, "{bone}: {rotation:?}");
            }
        }
    }

    #[test]
    fn test_fist_curls_mirrored() {
        let mut store = ChannelStore::new();
        store.set("leftIndex", 0.0);
        store.set("rightIndex", 0.0);
        let record = extract(&store);

        let curl = 70f32.to_radians();
        assert!((record.r["leftIndexDistal"][2] - curl).abs() < 1e-5);
        assert!((record.r["rightIndexDistal"][2] + curl).abs() < 1e-5);
        assert!((record.r["leftIndexProximal"][2] - curl).abs() < 1e-5);
    }

    #[test]
    fn test_thumb_swing_peaks_at_half_grip() {
        let mut store = ChannelStore::new();
        store.set("leftThumb", 0.4);
        let record = extract(&store);
        // ratio = 1 - 0.4/0.8 = 0.5
        let swing = 10f32.to_radians();
        assert!((record.r["leftThumbMetacarpal"][2] - swing).abs() < 1e-5);
        assert!((record.r["leftThumbMetacarpal"][1] - 30f32.to_radians()).abs() < 1e-5);
    }

    #[test]
    fn test_spread_fans_proximal_only() {
        let mut store = ChannelStore::new();
        store.set("rightSpread", 1.1);
        let record = extract(&store);
        // (1.1 - 0.1) clamped to 1 * 30deg, mirrored
        assert!((record.r["rightLittleProximal"][1] + 30f32.to_radians()).abs() < 1e-5);
        assert!((record.r["rightIndexProximal"][1] - 30f32.to_radians()).abs() < 1e-5);
        assert_eq!(record.r["rightLittleDistal"][1], 0.0);
    }

    #[test]
    fn test_negative_curl_disables_spread() {
        let mut store = ChannelStore::new();
        store.set("leftSpread", 1.0);
        store.set("leftRing", -0.5);
        let record = extract(&store);
        assert!(record.r["leftRingProximal"][1].abs() < 1e-6);
        assert!(record.r["leftLittleProximal"][1] > 0.0);
    }

    #[test]
    fn test_degenerate_ratios_stay_finite() {
        let mut store = ChannelStore::new();
        store.set("leftIndex", 0.3);
        store.set("rightSpread", 0.8);
        let hands = HandsConfig {
            finger_grip_ratio: 0.0,
            finger_spread_ratio: f32::NAN,
            ..HandsConfig::default()
        };
        let record = extract_hands(&store, &hands, &RigConfig::default());
        assert_eq!(record.r.len(), 30);
        for (bone, rotation) in &record.r {
            assert!(rotation.iter().all(|v| v.is_finite()), "{bone}: {rotation:?}");
        }
        assert_eq!(record.r["leftIndexDistal"][2], 0.0);
    }

    #[test]
    fn test_rig_axes_flip_signs() {
        let mut store = ChannelStore::new();
        store.set("leftMiddle", 0.0);
        let rig = RigConfig {
            z: -1.0,
            ..RigConfig::default()
        };
        let record = extract_hands(&store, &HandsConfig::default(), &rig);
        assert!(record.r["leftMiddleDistal"][2] < 0.0);
    }
}
