use super::keypoint::{PersonDetection, Point2};
use super::layout::Joint;

/// A keypoint contributes only when its confidence exceeds this value.
pub const CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Knee-derived foot points are pushed down by this fraction of box height.
pub const KNEE_TO_FOOT_RATIO: f32 = 0.25;

/// Where the foot point came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FootSource {
    /// Averaged from visible ankles.
    Real,
    /// Approximated from knees when both ankles are occluded.
    Virtual,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FootPoint {
    pub point: Point2,
    pub source: FootSource,
}

/// Geometry features derived from one person detection.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BodyFeatures {
    pub foot: Option<FootPoint>,
    /// Vertical pixel distance between shoulder and hip midpoints.
    pub torso_length: Option<f32>,
}

impl BodyFeatures {
    pub fn is_empty(&self) -> bool {
        self.foot.is_none() && self.torso_length.is_none()
    }
}

/// Derive foot-ground contact point and torso length from a detection.
pub fn extract_features(person: &PersonDetection) -> BodyFeatures {
    let foot = if let Some(ankles) = confident_mean(person, Joint::ANKLES) {
        Some(FootPoint {
            point: ankles,
            source: FootSource::Real,
        })
    } else {
        confident_mean(person, Joint::KNEES).map(|knees| FootPoint {
            point: Point2::new(
                knees.x,
                knees.y + person.box_height() * KNEE_TO_FOOT_RATIO,
            ),
            source: FootSource::Virtual,
        })
    };

    let torso_length = match (
        confident_mean(person, Joint::SHOULDERS),
        confident_mean(person, Joint::HIPS),
    ) {
        (Some(shoulders), Some(hips)) => Some((hips.y - shoulders.y).abs()),
        _ => None,
    };

    BodyFeatures { foot, torso_length }
}

fn confident_mean(person: &PersonDetection, joints: [Joint; 2]) -> Option<Point2> {
    let mut sum = Point2::default();
    let mut count = 0u32;
    for joint in joints {
        let kp = person.joint(joint);
        if kp.exceeds(CONFIDENCE_THRESHOLD) {
            sum.x += kp.x;
            sum.y += kp.y;
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    Some(Point2::new(sum.x / count as f32, sum.y / count as f32))
}
