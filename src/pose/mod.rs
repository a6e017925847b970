//! Pose keypoint contract and body feature extraction.
//!
//! The pose estimator is an external collaborator. It hands us, per detected
//! person, a bounding box and a fixed-length keypoint array whose joint order
//! depends on the model variant. This module:
//! - Names the joints we care about and maps them through a typed `JointLayout`
//! - Validates keypoint arrays against the active layout once, at construction
//! - Derives the foot-ground contact point and torso length used for distance

mod features;
mod keypoint;
mod layout;

pub use features::{
    extract_features, BodyFeatures, FootPoint, FootSource, CONFIDENCE_THRESHOLD,
    KNEE_TO_FOOT_RATIO,
};
pub use keypoint::{BoundingBox, Keypoint, PersonDetection, Point2, RawPose};
pub use layout::{Joint, JointLayout};
