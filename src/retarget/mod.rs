//! Retargeting: channel store → avatar movement record
//!
//! Each extractor reads the store and produces a partial [`MovementRecord`];
//! [`compose_movement`] merges them in a fixed order.

pub mod arm;
pub mod body;
pub mod hands;
pub mod mouth_eyes;
pub mod movement;

pub use movement::{compose, EulerOrder, EulerOverride, MovementRecord};

use crate::config::Config;
use crate::fusion::channels::ChannelStore;

/// Run every extractor over the store and merge the results.
///
/// Order is position, mouth/eyes, hands, body; later extractors win on
/// conflicting leaves.
pub fn compose_movement(store: &ChannelStore, config: &Config) -> MovementRecord {
    compose([
        body::extract_position(store),
        mouth_eyes::extract_mouth_eyes(store, &config.face, config.mocap.enabled),
        hands::extract_hands(store, &config.hands, &config.rig),
        body::extract_body(store, &config.body, &config.rig, config.tracking.mode),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_store_produces_every_group() {
        let record = compose_movement(&ChannelStore::new(), &Config::default());
        assert!(record.p.contains_key("position"));
        assert!(record.b.contains_key(mouth_eyes::shapes::AA));
        assert!(record.r.contains_key("head"));
        assert!(record.r.contains_key("leftThumbDistal"));
        assert!(record.e.contains_key("rightUpperArm"));

        let json = serde_json::to_value(&record).unwrap();
        for group in ["b", "r", "p", "e"] {
            assert!(json.get(group).is_some(), "{group}");
        }
    }

    #[test]
    fn test_face_mode_leaves_euler_group_empty_but_present() {
        let mut config = Config::default();
        config.tracking.mode = crate::config::TrackingMode::Face;
        let record = compose_movement(&ChannelStore::new(), &config);
        assert!(record.e.is_empty());
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["e"].as_object().unwrap().is_empty());
    }
}
