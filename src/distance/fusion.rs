//! Ensemble distance fusion and safety classification.
//!
//! Two estimators with different failure modes are combined opportunistically:
//! the homography estimate breaks down when feet are clipped or occluded near
//! the camera, the torso model breaks down when upper-body landmarks are
//! unreliable. Whichever is usable is used; when both are, they are averaged.

use serde::Deserialize;

use super::calibration::CalibrationMapping;
use super::statistical::DistanceProfile;
use crate::frame::FrameSize;
use crate::pose::{extract_features, BodyFeatures, FootSource, PersonDetection};

/// Below this distance a person is in the danger zone.
pub const DANGER_DISTANCE_M: f64 = 1.5;
/// Below this distance (and at or above `DANGER_DISTANCE_M`) a person triggers a warning.
pub const WARNING_DISTANCE_M: f64 = 2.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EstimationMethod {
    Stat,
    Homo,
    Mix,
}

impl std::fmt::Display for EstimationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EstimationMethod::Stat => "Stat",
            EstimationMethod::Homo => "Homo",
            EstimationMethod::Mix => "Mix",
        })
    }
}

/// Safety status, ordered by severity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SafetyStatus {
    #[default]
    Safe,
    Warning,
    Danger,
}

impl SafetyStatus {
    /// Negative (uncorrected near-field) and NaN distances classify as DANGER.
    pub fn classify(distance_m: f64) -> Self {
        if distance_m.is_nan() || distance_m < DANGER_DISTANCE_M {
            SafetyStatus::Danger
        } else if distance_m < WARNING_DISTANCE_M {
            SafetyStatus::Warning
        } else {
            SafetyStatus::Safe
        }
    }
}

impl std::fmt::Display for SafetyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SafetyStatus::Safe => "Safe",
            SafetyStatus::Warning => "WARNING",
            SafetyStatus::Danger => "DANGER",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceEstimate {
    /// Lateral offset from the optical axis in metres (right positive).
    pub lateral_offset_m: f64,
    pub distance_m: f64,
    pub method: EstimationMethod,
    pub status: SafetyStatus,
    /// Origin of the foot point, when one was found.
    pub foot_source: Option<FootSource>,
}

/// Geometry constants of the fusion policy.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct FusionSettings {
    /// Feet below `clip_ratio × image height` are treated as clipped.
    pub clip_ratio: f64,
    /// Metres of lateral offset per pixel per metre of distance, used when the
    /// homography cannot place the person.
    pub lateral_sensitivity: f64,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            clip_ratio: 0.95,
            lateral_sensitivity: 0.002,
        }
    }
}

/// Per-frame output: every estimate plus the most severe status among them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameReport {
    pub estimates: Vec<DistanceEstimate>,
    pub alert: SafetyStatus,
}

impl FrameReport {
    pub fn from_estimates(estimates: Vec<DistanceEstimate>) -> Self {
        let alert = estimates
            .iter()
            .map(|e| e.status)
            .max()
            .unwrap_or_default();
        Self { estimates, alert }
    }

    pub fn closest(&self) -> Option<&DistanceEstimate> {
        self.estimates
            .iter()
            .min_by(|a, b| a.distance_m.total_cmp(&b.distance_m))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FusionPolicy {
    profile: DistanceProfile,
    settings: FusionSettings,
}

impl FusionPolicy {
    pub fn new(profile: DistanceProfile, settings: FusionSettings) -> Self {
        Self { profile, settings }
    }

    pub fn profile(&self) -> &DistanceProfile {
        &self.profile
    }

    /// Fuse one person's features into a distance estimate.
    ///
    /// Returns `None` only when the person has neither a foot point nor a torso.
    pub fn estimate(
        &self,
        features: &BodyFeatures,
        frame: FrameSize,
        mapping: Option<&CalibrationMapping>,
    ) -> Option<DistanceEstimate> {
        if features.is_empty() {
            return None;
        }

        let stat = self.profile.estimate(features.torso_length);
        let dist_stat = stat.unwrap_or(0.0);

        let clip_limit = self.settings.clip_ratio * f64::from(frame.height);
        let foot = features.foot.filter(|f| f64::from(f.point.y) <= clip_limit);

        let homo = match (foot, mapping) {
            (Some(foot), Some(mapping)) => mapping.map(foot.point).map(|ground| {
                let forward = if self.profile.correct_homography {
                    self.profile.correct(ground.forward_m)
                } else {
                    ground.forward_m
                };
                (forward, ground.lateral_m)
            }),
            _ => None,
        };

        let (distance_m, lateral_offset_m, method) = match homo {
            None => {
                // Clipped foot, no calibration, or projection failure.
                let lateral = features.foot.map_or(0.0, |f| {
                    let center_x = f64::from(frame.width) / 2.0;
                    (f64::from(f.point.x) - center_x) * dist_stat * self.settings.lateral_sensitivity
                });
                (dist_stat, lateral, EstimationMethod::Stat)
            }
            // A negative torso estimate means "very close" and is still averaged.
            Some((dist_homo, lateral)) if dist_homo > 0.0 => match stat {
                Some(_) => ((dist_homo + dist_stat) / 2.0, lateral, EstimationMethod::Mix),
                None => (dist_homo, lateral, EstimationMethod::Homo),
            },
            Some((_, lateral)) => (dist_stat, lateral, EstimationMethod::Stat),
        };

        Some(DistanceEstimate {
            lateral_offset_m,
            distance_m,
            method,
            status: SafetyStatus::classify(distance_m),
            foot_source: features.foot.map(|f| f.source),
        })
    }

    /// Estimate every detected person in a frame.
    pub fn evaluate_frame(
        &self,
        people: &[PersonDetection],
        frame: FrameSize,
        mapping: Option<&CalibrationMapping>,
    ) -> FrameReport {
        let estimates = people
            .iter()
            .filter_map(|person| {
                let features = extract_features(person);
                let estimate = self.estimate(&features, frame, mapping);
                if estimate.is_none() {
                    log::debug!("person skipped: no usable landmarks");
                }
                estimate
            })
            .collect();
        FrameReport::from_estimates(estimates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::Homography;
    use crate::pose::{FootPoint, Point2};
    use nalgebra::Matrix3;

    const VGA: FrameSize = FrameSize::new(640, 480);

    /// Identity correction, `alpha / torso` without offset.
    fn plain_profile(alpha: f64) -> DistanceProfile {
        DistanceProfile {
            alpha,
            beta: 0.0,
            correct_a: 0.0,
            correct_b: 1.0,
            correct_c: 0.0,
            clamp_negative: false,
            correct_homography: false,
        }
    }

    /// Pinhole camera 1 m above the floor, f = 200 px, principal point (320, 240).
    fn pinhole_mapping() -> CalibrationMapping {
        let h = Matrix3::new(0.005, 0.0, -1.6, 0.0, 0.0, 1.0, 0.0, 0.005, -1.2);
        CalibrationMapping::from_homography(Homography::from_matrix(h).unwrap())
    }

    fn features(foot: Option<(f32, f32)>, torso: Option<f32>) -> BodyFeatures {
        BodyFeatures {
            foot: foot.map(|(x, y)| FootPoint {
                point: Point2::new(x, y),
                source: FootSource::Real,
            }),
            torso_length: torso,
        }
    }

    #[test]
    fn averages_both_estimators() {
        let policy = FusionPolicy::new(plain_profile(100.0), FusionSettings::default());
        let mapping = pinhole_mapping();
        // torso 50 px -> 2.0 m; foot at v = 306.67 -> 3.0 m ahead.
        let est = policy
            .estimate(&features(Some((320.0, 306.666_67)), Some(50.0)), VGA, Some(&mapping))
            .unwrap();
        assert_eq!(est.method, EstimationMethod::Mix);
        assert!((est.distance_m - 2.5).abs() < 1e-4, "{:?}", est);
        assert!(est.lateral_offset_m.abs() < 1e-6);
        assert_eq!(est.status, SafetyStatus::Safe);
    }

    #[test]
    fn clipped_foot_always_uses_torso_model() {
        let policy = FusionPolicy::new(plain_profile(100.0), FusionSettings::default());
        let mapping = pinhole_mapping();
        let y = 0.96 * 480.0;
        let est = policy
            .estimate(&features(Some((420.0, y)), Some(50.0)), VGA, Some(&mapping))
            .unwrap();
        assert_eq!(est.method, EstimationMethod::Stat);
        assert_eq!(est.distance_m, 2.0);
        // (420 - 320) px * 2.0 m * 0.002
        assert!((est.lateral_offset_m - 0.4).abs() < 1e-9);
    }

    #[test]
    fn homography_alone_when_torso_missing() {
        let policy = FusionPolicy::new(plain_profile(100.0), FusionSettings::default());
        let mapping = pinhole_mapping();
        let est = policy
            .estimate(&features(Some((420.0, 340.0)), None), VGA, Some(&mapping))
            .unwrap();
        assert_eq!(est.method, EstimationMethod::Homo);
        assert!((est.distance_m - 2.0).abs() < 1e-6);
        assert!((est.lateral_offset_m - 1.0).abs() < 1e-6);
        assert_eq!(est.status, SafetyStatus::Warning);
    }

    #[test]
    fn missing_calibration_degrades_to_torso_model() {
        let policy = FusionPolicy::new(plain_profile(100.0), FusionSettings::default());
        let est = policy
            .estimate(&features(Some((320.0, 300.0)), Some(100.0)), VGA, None)
            .unwrap();
        assert_eq!(est.method, EstimationMethod::Stat);
        assert_eq!(est.distance_m, 1.0);
        assert_eq!(est.status, SafetyStatus::Danger);
    }

    #[test]
    fn neither_estimator_falls_back_to_zero_stat() {
        let policy = FusionPolicy::new(plain_profile(100.0), FusionSettings::default());
        // Above the horizon the pinhole mapping puts the foot behind the camera.
        let mapping = pinhole_mapping();
        let est = policy
            .estimate(&features(Some((320.0, 200.0)), None), VGA, Some(&mapping))
            .unwrap();
        assert_eq!(est.method, EstimationMethod::Stat);
        assert_eq!(est.distance_m, 0.0);
        assert_eq!(est.status, SafetyStatus::Danger);
    }

    #[test]
    fn torso_only_person_without_foot_gets_estimate() {
        let policy = FusionPolicy::new(plain_profile(150.0), FusionSettings::default());
        let est = policy
            .estimate(&features(None, Some(50.0)), VGA, Some(&pinhole_mapping()))
            .unwrap();
        assert_eq!(est.method, EstimationMethod::Stat);
        assert_eq!(est.distance_m, 3.0);
        assert_eq!(est.lateral_offset_m, 0.0);
        assert_eq!(est.foot_source, None);
    }

    #[test]
    fn person_without_landmarks_is_skipped() {
        let policy = FusionPolicy::default();
        assert!(policy
            .estimate(&BodyFeatures::default(), VGA, Some(&pinhole_mapping()))
            .is_none());
    }

    #[test]
    fn homography_output_goes_through_correction_when_enabled() {
        let mut profile = plain_profile(100.0);
        profile.correct_b = 2.0;
        profile.correct_homography = true;
        let policy = FusionPolicy::new(profile, FusionSettings::default());
        let est = policy
            .estimate(&features(Some((420.0, 340.0)), None), VGA, Some(&pinhole_mapping()))
            .unwrap();
        assert!((est.distance_m - 4.0).abs() < 1e-6);
    }

    #[test]
    fn negative_torso_estimate_is_averaged_with_homography() {
        // Unclamped correction: torso 400 px -> 100 / 400 - 1 = -0.75 m.
        let mut profile = plain_profile(100.0);
        profile.beta = -1.0;
        let policy = FusionPolicy::new(profile, FusionSettings::default());
        let est = policy
            .estimate(&features(Some((320.0, 306.666_67)), Some(400.0)), VGA, Some(&pinhole_mapping()))
            .unwrap();
        assert_eq!(est.method, EstimationMethod::Mix);
        assert!((est.distance_m - 1.125).abs() < 1e-4, "{:?}", est);
        assert_eq!(est.status, SafetyStatus::Danger);
    }

    #[test]
    fn classification_boundaries() {
        assert_eq!(SafetyStatus::classify(1.4999), SafetyStatus::Danger);
        assert_eq!(SafetyStatus::classify(1.5), SafetyStatus::Warning);
        assert_eq!(SafetyStatus::classify(2.4999), SafetyStatus::Warning);
        assert_eq!(SafetyStatus::classify(2.5), SafetyStatus::Safe);
        assert_eq!(SafetyStatus::classify(-0.5), SafetyStatus::Danger);
        assert_eq!(SafetyStatus::classify(f64::NAN), SafetyStatus::Danger);
    }

    #[test]
    fn frame_alert_is_most_severe() {
        let est = |d: f64| DistanceEstimate {
            lateral_offset_m: 0.0,
            distance_m: d,
            method: EstimationMethod::Stat,
            status: SafetyStatus::classify(d),
            foot_source: None,
        };
        let report = FrameReport::from_estimates(vec![est(4.0), est(2.0), est(3.0)]);
        assert_eq!(report.alert, SafetyStatus::Warning);
        assert_eq!(report.closest().unwrap().distance_m, 2.0);
        assert_eq!(FrameReport::from_estimates(vec![]).alert, SafetyStatus::Safe);
    }
}
