use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Body joints consumed by the distance estimator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Joint {
    LeftShoulder,
    RightShoulder,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl Joint {
    pub const SHOULDERS: [Joint; 2] = [Joint::LeftShoulder, Joint::RightShoulder];
    pub const HIPS: [Joint; 2] = [Joint::LeftHip, Joint::RightHip];
    pub const KNEES: [Joint; 2] = [Joint::LeftKnee, Joint::RightKnee];
    pub const ANKLES: [Joint; 2] = [Joint::LeftAnkle, Joint::RightAnkle];
}

/// Skeletal layout produced by the active pose model.
///
/// - `Coco17`: the 17-joint COCO ordering (shoulders 5/6, hips 11/12,
///   knees 13/14, ankles 15/16).
/// - `Reduced8`: the 8-joint lower-body model (shoulders 0/1, hips 2/3,
///   knees 4/5, ankles 6/7).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JointLayout {
    Coco17,
    #[default]
    Reduced8,
}

impl JointLayout {
    /// Number of keypoints a pose of this layout must carry.
    pub const fn keypoint_count(self) -> usize {
        match self {
            JointLayout::Coco17 => 17,
            JointLayout::Reduced8 => 8,
        }
    }

    /// Index of `joint` inside a keypoint array of this layout.
    pub const fn index(self, joint: Joint) -> usize {
        match self {
            JointLayout::Coco17 => match joint {
                Joint::LeftShoulder => 5,
                Joint::RightShoulder => 6,
                Joint::LeftHip => 11,
                Joint::RightHip => 12,
                Joint::LeftKnee => 13,
                Joint::RightKnee => 14,
                Joint::LeftAnkle => 15,
                Joint::RightAnkle => 16,
            },
            JointLayout::Reduced8 => match joint {
                Joint::LeftShoulder => 0,
                Joint::RightShoulder => 1,
                Joint::LeftHip => 2,
                Joint::RightHip => 3,
                Joint::LeftKnee => 4,
                Joint::RightKnee => 5,
                Joint::LeftAnkle => 6,
                Joint::RightAnkle => 7,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JointLayout::Coco17 => "coco17",
            JointLayout::Reduced8 => "reduced8",
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "coco17" | "coco" | "17" => Ok(JointLayout::Coco17),
            "reduced8" | "8" => Ok(JointLayout::Reduced8),
            other => Err(anyhow!(
                "unknown pose layout '{}' (expected coco17 or reduced8)",
                other
            )),
        }
    }
}

impl std::str::FromStr for JointLayout {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for JointLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
