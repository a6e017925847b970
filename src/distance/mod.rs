//! Camera-to-person distance estimation.
//!
//! Two independent estimators feed a fusion policy:
//! - `homography`: projective pixel → ground-plane transform fitted by DLT
//! - `calibration`: the marker file and the mapping built from it
//! - `statistical`: inverse-law torso-length model with a quadratic correction
//! - `fusion`: combines whichever estimates are usable and classifies the result

mod calibration;
mod fusion;
mod homography;
mod statistical;

pub use calibration::{
    load_calibration, save_calibration, CalibrationMapping, CalibrationPoints, GroundPoint,
    SharedCalibration, MARKER_DISTANCES_M, SCALE_POINT_GROUND_M, SCALE_POINT_OFFSET_PX,
};
pub use fusion::{
    DistanceEstimate, EstimationMethod, FrameReport, FusionPolicy, FusionSettings, SafetyStatus,
    DANGER_DISTANCE_M, WARNING_DISTANCE_M,
};
pub use homography::{Homography, HomographyError};
pub use statistical::{DistanceProfile, MIN_PROFILE_SAMPLES};
