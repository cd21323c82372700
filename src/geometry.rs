//! Planar joint-angle math over normalized landmarks.

use serde::Deserialize;

/// One tracked joint in normalized image space.
///
/// `x`/`y` are image-relative in [0,1]; `z` is depth relative to the wrist,
/// smaller meaning closer to the camera. Deserializes from either
/// `[x, y, z]` or `{"x": .., "y": .., "z": ..}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Interior angle at `b` between `b→a` and `b→c`, in degrees [0,180].
///
/// Only x/y are used. Coincident points give 0 instead of NaN.
pub fn angle(a: &Landmark, b: &Landmark, c: &Landmark) -> f32 {
    let ba = (a.x - b.x, a.y - b.y);
    let bc = (c.x - b.x, c.y - b.y);

    let dot = ba.0 * bc.0 + ba.1 * bc.1;
    let mag_ba = ba.0.hypot(ba.1);
    let mag_bc = bc.0.hypot(bc.1);

    if mag_ba * mag_bc == 0.0 {
        return 0.0;
    }

    let cos_angle = (dot / (mag_ba * mag_bc)).clamp(-1.0, 1.0);
    cos_angle.acos().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lm(x: f32, y: f32) -> Landmark {
        Landmark::new(x, y, 0.0)
    }

    #[test]
    fn coincident_points_give_zero() {
        let p = lm(0.3, 0.7);
        let q = lm(0.9, 0.1);
        assert_eq!(angle(&p, &p, &q), 0.0);
        assert_eq!(angle(&q, &p, &p), 0.0);
        assert_eq!(angle(&p, &p, &p), 0.0);
    }

    #[test]
    fn coincident_outer_points_are_not_degenerate() {
        // a == c but both differ from b: vectors are identical, angle 0
        let a = lm(0.5, 0.2);
        let b = lm(0.5, 0.5);
        assert!(angle(&a, &b, &a).abs() < 0.1);
    }

    #[test]
    fn colinear_points_give_straight_angle() {
        let a = lm(0.1, 0.1);
        let b = lm(0.4, 0.4);
        let c = lm(0.9, 0.9);
        assert!((angle(&a, &b, &c) - 180.0).abs() < 0.1);
    }

    #[test]
    fn right_angle() {
        let a = lm(0.0, 0.5);
        let b = lm(0.5, 0.5);
        let c = lm(0.5, 0.0);
        assert!((angle(&a, &b, &c) - 90.0).abs() < 0.01);
    }

    #[test]
    fn depth_is_ignored() {
        let a = Landmark::new(0.0, 0.5, -0.4);
        let b = Landmark::new(0.5, 0.5, 0.3);
        let c = Landmark::new(0.5, 0.0, 0.9);
        assert!((angle(&a, &b, &c) - 90.0).abs() < 0.01);
    }

    #[test]
    fn deserializes_array_and_object_forms() {
        let a: Landmark = serde_json::from_str("[0.25, 0.5, -0.1]").unwrap();
        let b: Landmark = serde_json::from_str(r#"{"x":0.25,"y":0.5,"z":-0.1}"#).unwrap();
        assert_eq!(a, b);
    }
}
