use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::config::Thresholds;
use crate::geometry::angle;
use crate::pose::{Finger, JointId, Pose};

/// Per-frame gesture vocabulary. `Unknown` is "no confident call", not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureLabel {
    MoveForward,
    MoveBackward,
    Stop,
    Unknown,
}

impl GestureLabel {
    /// Wire representation, shared with mailbox readers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MoveForward => "Move Forward",
            Self::MoveBackward => "Move Backward",
            Self::Stop => "Stop",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("not a gesture label: {0:?}")]
pub struct LabelParseError(pub String);

impl FromStr for GestureLabel {
    type Err = LabelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Move Forward" => Ok(Self::MoveForward),
            "Move Backward" => Ok(Self::MoveBackward),
            "Stop" => Ok(Self::Stop),
            "Unknown" => Ok(Self::Unknown),
            other => Err(LabelParseError(other.to_string())),
        }
    }
}

/// Bend angle at the DIP joint of each non-thumb finger, in degrees.
/// 180 is a straight finger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FingerAngles {
    pub index: f32,
    pub middle: f32,
    pub ring: f32,
    pub pinky: f32,
}

impl FingerAngles {
    pub fn of(pose: &Pose) -> Self {
        let at = |finger: Finger| {
            let [a, b, c] = finger.distal_chain();
            angle(&pose[a], &pose[b], &pose[c])
        };
        Self {
            index: at(Finger::Index),
            middle: at(Finger::Middle),
            ring: at(Finger::Ring),
            pinky: at(Finger::Pinky),
        }
    }

    fn all(&self) -> [f32; 4] {
        [self.index, self.middle, self.ring, self.pinky]
    }
}

impl fmt::Display for FingerAngles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Index: {:.1}, Middle: {:.1}, Ring: {:.1}, Pinky: {:.1}",
            self.index, self.middle, self.ring, self.pinky
        )
    }
}

/// Stateless pose → raw label mapping.
#[derive(Debug, Clone)]
pub struct PoseClassifier {
    th: Thresholds,
}

impl Default for PoseClassifier {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}

impl PoseClassifier {
    pub fn new(th: Thresholds) -> Self {
        Self { th }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.th
    }

    pub fn set_thresholds(&mut self, th: Thresholds) {
        self.th = th;
    }

    /// Index extended, the other three curled.
    pub fn is_pointing(&self, angles: &FingerAngles) -> bool {
        angles.index > self.th.extended_deg
            && angles.middle < self.th.curled_deg
            && angles.ring < self.th.curled_deg
            && angles.pinky < self.th.curled_deg
    }

    /// All four fingers extended, thumb spread, palm toward the camera.
    pub fn is_open_palm(&self, pose: &Pose, angles: &FingerAngles) -> bool {
        let wrist = &pose[JointId::Wrist];
        let thumb_open = (pose[JointId::ThumbTip].x - wrist.x).abs() > self.th.thumb_spread;
        let facing_camera = pose[JointId::MiddleTip].z < wrist.z;

        angles.all().iter().all(|a| *a > self.th.extended_deg) && thumb_open && facing_camera
    }

    pub fn classify(&self, pose: Option<&Pose>) -> GestureLabel {
        match pose {
            Some(p) => self.classify_with(p, &FingerAngles::of(p)),
            None => GestureLabel::Unknown,
        }
    }

    /// Classify with precomputed angles, so callers reporting them don't
    /// measure twice.
    pub fn classify_with(&self, pose: &Pose, angles: &FingerAngles) -> GestureLabel {
        if self.is_pointing(angles) {
            let dx = pose[JointId::IndexTip].x - pose[JointId::Wrist].x;
            if dx > self.th.direction_dead_zone {
                GestureLabel::MoveForward
            } else if dx < -self.th.direction_dead_zone {
                GestureLabel::MoveBackward
            } else {
                GestureLabel::Unknown
            }
        } else if self.is_open_palm(pose, angles) {
            GestureLabel::Stop
        } else {
            GestureLabel::Unknown
        }
    }
}


#[cfg(test)]
mod tests {
    use super::synth::*;
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.05
    }

    #[test]
    fn builder_produces_requested_angles() {
        let pose = HandBuilder::new().finger(Finger::Ring, 170.0).build();
        let a = FingerAngles::of(&pose);
        assert!(close(a.index, 90.0), "{a}");
        assert!(close(a.middle, 90.0), "{a}");
        assert!(close(a.ring, 170.0), "{a}");
        assert!(close(a.pinky, 90.0), "{a}");
    }

    #[test]
    fn pointing_right_moves_forward() {
        let c = PoseClassifier::default();
        assert_eq!(c.classify(Some(&pointing(0.05))), GestureLabel::MoveForward);
    }

    #[test]
    fn pointing_left_moves_backward() {
        let c = PoseClassifier::default();
        assert_eq!(c.classify(Some(&pointing(-0.05))), GestureLabel::MoveBackward);
    }

    #[test]
    fn centered_pointing_is_unknown() {
        let c = PoseClassifier::default();
        assert_eq!(c.classify(Some(&pointing(0.0))), GestureLabel::Unknown);
        assert_eq!(c.classify(Some(&pointing(0.015))), GestureLabel::Unknown);
        assert_eq!(c.classify(Some(&pointing(-0.015))), GestureLabel::Unknown);
    }

    #[test]
    fn open_palm_is_stop() {
        let c = PoseClassifier::default();
        assert_eq!(c.classify(Some(&open_palm())), GestureLabel::Stop);
    }

    #[test]
    fn open_palm_needs_spread_thumb() {
        let mut b = HandBuilder::new();
        for f in Finger::ALL {
            b = b.finger(f, 170.0);
        }
        let pose = b
            .thumb_offset(0.05)
            .depth(JointId::MiddleTip, -0.05)
            .build();
        assert_eq!(PoseClassifier::default().classify(Some(&pose)), GestureLabel::Unknown);
    }

    #[test]
    fn back_of_hand_is_not_stop() {
        let mut b = HandBuilder::new();
        for f in Finger::ALL {
            b = b.finger(f, 170.0);
        }
        let pose = b
            .thumb_offset(0.15)
            .depth(JointId::Wrist, 0.0)
            .depth(JointId::MiddleTip, 0.05)
            .build();
        assert_eq!(PoseClassifier::default().classify(Some(&pose)), GestureLabel::Unknown);
    }

    #[test]
    fn curled_hand_is_unknown() {
        let pose = HandBuilder::new().thumb_offset(0.15).build();
        assert_eq!(PoseClassifier::default().classify(Some(&pose)), GestureLabel::Unknown);
    }

    #[test]
    fn no_pose_is_unknown() {
        assert_eq!(PoseClassifier::default().classify(None), GestureLabel::Unknown);
    }

    #[test]
    fn collapsed_hand_fails_closed() {
        let pose = Pose::new([crate::geometry::Landmark::new(0.5, 0.5, 0.0); 21]);
        assert_eq!(PoseClassifier::default().classify(Some(&pose)), GestureLabel::Unknown);
    }

    #[test]
    fn thresholds_are_configurable() {
        let th = Thresholds {
            direction_dead_zone: 0.1,
            ..Thresholds::default()
        };
        let c = PoseClassifier::new(th);
        assert_eq!(c.classify(Some(&pointing(0.05))), GestureLabel::Unknown);
    }

    #[test]
    fn labels_round_trip_wire_strings() {
        for l in [
            GestureLabel::MoveForward,
            GestureLabel::MoveBackward,
            GestureLabel::Stop,
            GestureLabel::Unknown,
        ] {
            assert_eq!(l.as_str().parse::<GestureLabel>(), Ok(l));
        }
        assert!("move forward".parse::<GestureLabel>().is_err());
    }
}
