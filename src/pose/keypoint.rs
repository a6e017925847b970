use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use super::layout::{Joint, JointLayout};

/// Pixel-space point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Single keypoint as emitted by the pose estimator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Confidence score (0.0..=1.0).
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// True when the confidence strictly exceeds `threshold`.
    pub fn exceeds(&self, threshold: f32) -> bool {
        self.confidence > threshold
    }

    pub fn position(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

/// Axis-aligned person bounding box in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }
}

/// Unvalidated pose output from a backend.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPose {
    pub bbox: BoundingBox,
    pub keypoints: Vec<Keypoint>,
}

/// One detected person for one frame, validated against a joint layout.
///
/// Keypoints are private: the only way to read a joint is through the layout
/// the detection was validated with, so indices are never trusted ad hoc.
#[derive(Clone, Debug, PartialEq)]
pub struct PersonDetection {
    bbox: BoundingBox,
    keypoints: Vec<Keypoint>,
    layout: JointLayout,
}

impl PersonDetection {
    pub fn new(bbox: BoundingBox, keypoints: Vec<Keypoint>, layout: JointLayout) -> Result<Self> {
        if keypoints.len() != layout.keypoint_count() {
            return Err(anyhow!(
                "pose has {} keypoints, layout {} expects {}",
                keypoints.len(),
                layout,
                layout.keypoint_count()
            ));
        }
        let coords = [bbox.x1, bbox.y1, bbox.x2, bbox.y2];
        if coords.iter().any(|v| !v.is_finite()) {
            return Err(anyhow!("bounding box has non-finite coordinates"));
        }
        if keypoints
            .iter()
            .any(|kp| !kp.x.is_finite() || !kp.y.is_finite())
        {
            return Err(anyhow!("pose has non-finite keypoint coordinates"));
        }
        Ok(Self {
            bbox,
            keypoints,
            layout,
        })
    }

    pub fn from_raw(raw: RawPose, layout: JointLayout) -> Result<Self> {
        Self::new(raw.bbox, raw.keypoints, layout)
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn box_height(&self) -> f32 {
        self.bbox.height()
    }

    pub fn layout(&self) -> JointLayout {
        self.layout
    }

    pub fn joint(&self, joint: Joint) -> &Keypoint {
        &self.keypoints[self.layout.index(joint)]
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_keypoint_count_mismatch() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 20.0);
        let err = PersonDetection::new(bbox, vec![Keypoint::default(); 17], JointLayout::Reduced8)
            .unwrap_err();
        assert!(err.to_string().contains("expects 8"));
        assert!(
            PersonDetection::new(bbox, vec![Keypoint::default(); 17], JointLayout::Coco17).is_ok()
        );
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 20.0);
        let mut kps = vec![Keypoint::default(); 8];
        kps[3].y = f32::NAN;
        assert!(PersonDetection::new(bbox, kps, JointLayout::Reduced8).is_err());

        let bad_box = BoundingBox::new(0.0, f32::INFINITY, 10.0, 20.0);
        assert!(
            PersonDetection::new(bad_box, vec![Keypoint::default(); 8], JointLayout::Reduced8)
                .is_err()
        );
    }

    #[test]
    fn joint_lookup_goes_through_layout() {
        let mut kps = vec![Keypoint::default(); 17];
        kps[15] = Keypoint::new(100.0, 400.0, 0.9);
        let person = PersonDetection::new(
            BoundingBox::new(80.0, 100.0, 140.0, 410.0),
            kps,
            JointLayout::Coco17,
        )
        .unwrap();
        assert_eq!(person.joint(Joint::LeftAnkle).y, 400.0);
        assert_eq!(person.box_height(), 310.0);
    }

    #[test]
    fn exceeds_is_strict() {
        assert!(!Keypoint::new(0.0, 0.0, 0.5).exceeds(0.5));
        assert!(Keypoint::new(0.0, 0.0, 0.51).exceeds(0.5));
    }
}
