//! Hand poses: the 21-joint skeleton and per-frame estimator output.

use serde::Deserialize;
use thiserror::Error;

use crate::geometry::Landmark;

/// Number of landmarks in one hand pose.
pub const JOINT_COUNT: usize = 21;

/// Anatomical position of a landmark, in estimator order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointId {
    Wrist = 0,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

impl JointId {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// The four non-thumb fingers, in the order the classifier reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finger {
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 4] = [Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky];

    /// The (PIP, DIP, TIP) chain; the finger angle is measured at DIP.
    pub fn distal_chain(self) -> [JointId; 3] {
        use JointId::*;
        match self {
            Finger::Index => [IndexPip, IndexDip, IndexTip],
            Finger::Middle => [MiddlePip, MiddleDip, MiddleTip],
            Finger::Ring => [RingPip, RingDip, RingTip],
            Finger::Pinky => [PinkyPip, PinkyDip, PinkyTip],
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoseError {
    #[error("hand pose must have 21 landmarks, got {0}")]
    WrongLength(usize),
}

/// Exactly 21 landmarks for one hand in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    landmarks: [Landmark; JOINT_COUNT],
}

impl Pose {
    pub fn new(landmarks: [Landmark; JOINT_COUNT]) -> Self {
        Self { landmarks }
    }

    pub fn joint(&self, id: JointId) -> &Landmark {
        &self.landmarks[id.index()]
    }

    pub fn landmarks(&self) -> &[Landmark; JOINT_COUNT] {
        &self.landmarks
    }
}

impl std::ops::Index<JointId> for Pose {
    type Output = Landmark;

    fn index(&self, id: JointId) -> &Landmark {
        self.joint(id)
    }
}

impl TryFrom<&[Landmark]> for Pose {
    type Error = PoseError;

    fn try_from(v: &[Landmark]) -> Result<Self, PoseError> {
        let landmarks: [Landmark; JOINT_COUNT] =
            v.try_into().map_err(|_| PoseError::WrongLength(v.len()))?;
        Ok(Self { landmarks })
    }
}

/// One line of landmark-source output.
///
/// `hands` may be missing or `null` when nothing was detected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Frame {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub hands: Vec<Vec<Landmark>>,
}

fn null_as_empty<'de, D>(de: D) -> Result<Vec<Vec<Landmark>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Vec<Landmark>>>::deserialize(de)?.unwrap_or_default())
}

impl Frame {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The first reported hand, validated. Further hands are ignored.
    pub fn first_pose(&self) -> Result<Option<Pose>, PoseError> {
        match self.hands.first() {
            Some(h) => Pose::try_from(h.as_slice()).map(Some),
            None => Ok(None),
        }
    }
}
