//! Movement record and compositor

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rotation applied to a bone as Euler angles in a fixed axis order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EulerOverride {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub order: EulerOrder,
}

impl EulerOverride {
    pub fn xyz(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            order: EulerOrder::Xyz,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Euler application order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EulerOrder {
    #[default]
    #[serde(rename = "XYZ")]
    Xyz,
    #[serde(rename = "ZYX")]
    Zyx,
}

/// One rendered frame of avatar motion.
///
/// `b` holds blendshape weights, `r` bone rotations in radians, `p` bone
/// positions and `e` full Euler overrides. All four groups always exist,
/// possibly empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementRecord {
    #[serde(default)]
    pub b: BTreeMap<String, f32>,
    #[serde(default)]
    pub r: BTreeMap<String, [f32; 3]>,
    #[serde(default)]
    pub p: BTreeMap<String, [f32; 3]>,
    #[serde(default)]
    pub e: BTreeMap<String, EulerOverride>,
}

impl MovementRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blendshape(&mut self, name: impl Into<String>, weight: f32) {
        self.b.insert(name.into(), weight);
    }

    pub fn rotation(&mut self, bone: impl Into<String>, rotation: [f32; 3]) {
        self.r.insert(bone.into(), rotation);
    }

    pub fn position(&mut self, bone: impl Into<String>, position: [f32; 3]) {
        self.p.insert(bone.into(), position);
    }

    pub fn euler(&mut self, bone: impl Into<String>, euler: EulerOverride) {
        self.e.insert(bone.into(), euler);
    }

    /// Shallow merge: each leaf of `other` replaces the same leaf here
    pub fn merge(&mut self, other: MovementRecord) {
        self.b.extend(other.b);
        self.r.extend(other.r);
        self.p.extend(other.p);
        self.e.extend(other.e);
    }

    pub fn is_empty(&self) -> bool {
        self.b.is_empty() && self.r.is_empty() && self.p.is_empty() && self.e.is_empty()
    }
}

/// Merge partial records in order, later records winning per leaf
pub fn compose<I>(parts: I) -> MovementRecord
where
    I: IntoIterator<Item = MovementRecord>,
{
    parts.into_iter().fold(MovementRecord::new(), |mut acc, part| {
        acc.merge(part);
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_record_serializes_all_groups() {
        let json = serde_json::to_value(MovementRecord::new()).unwrap();
        let obj = json.as_object().unwrap();
        for group in ["b", "r", "p", "e"] {
            assert!(obj[group].as_object().unwrap().is_empty(), "{group}");
        }
    }

    #[test]
    fn test_merge_is_leaf_last_writer_wins() {
        let mut first = MovementRecord::new();
        first.blendshape("aa", 0.2);
        first.blendshape("happy", 0.4);
        first.rotation("head", [0.1, 0.0, 0.0]);

        let mut second = MovementRecord::new();
        second.blendshape("aa", 0.9);
        second.rotation("neck", [0.0, 0.3, 0.0]);

        let merged = compose([first, second]);
        assert_eq!(merged.b["aa"], 0.9);
        assert_eq!(merged.b["happy"], 0.4);
        assert_eq!(merged.r.len(), 2);
    }

    #[test]
    fn test_euler_serializes_order_name() {
        let json = serde_json::to_value(EulerOverride::xyz(0.0, 1.0, 2.0)).unwrap();
        assert_eq!(json["order"], "XYZ");
        assert_eq!(json["y"], 1.0);
    }

    #[test]
    fn test_deserialize_tolerates_missing_groups() {
        let record: MovementRecord = serde_json::from_str(r#"{"b": {"aa": 0.5}}"#).unwrap();
        assert_eq!(record.b["aa"], 0.5);
        assert!(record.e.is_empty());
    }
}
