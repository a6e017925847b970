//! Forklift perception core.
//!
//! This crate implements the safety-relevant core of a forklift-mounted sensing
//! unit: it estimates the distance from the camera to nearby persons and decides,
//! from inertial motion state, which perception task may run.
//!
//! # Architecture
//!
//! The core is built around two guarantees:
//!
//! 1. **Opportunistic distance fusion**: a ground-plane homography estimate and a
//!    torso-length statistical estimate are combined when both are usable and
//!    either one alone is used otherwise. A person is never dropped because one
//!    estimator failed.
//! 2. **Motion-gated exclusivity**: a debounced `MOVING`/`STATIONARY` state selects
//!    exactly one workload (pedestrian distance vs. cargo tilt inspection). Workers
//!    block on a monitor and never poll.
//!
//! # Module Structure
//!
//! - `pose`: keypoint data contract, typed joint layouts, feature extraction
//! - `distance`: homography calibration, statistical model, ensemble fusion
//! - `motion`: inertial samples, IMU sources, hysteresis state detector
//! - `schedule`: motion gate monitor, latest-frame slot, worker runtime
//! - `workers`: the pedestrian-distance and tilt-inspection workloads
//! - `detect`: pluggable perception backends (pose estimator, line detector)
//! - `frame`: frame data contract and sources
//! - `tilt`: cargo tilt verdict from detected line segments
//! - `alert`: per-frame alert sinks
//! - `config`: layered file + environment configuration

pub mod alert;
pub mod config;
pub mod detect;
pub mod distance;
pub mod frame;
pub mod motion;
pub mod pose;
pub mod schedule;
pub mod tilt;
pub mod workers;

pub use alert::{AlertSink, ChannelAlertSink, LogAlertSink};
pub use detect::{BackendRegistry, DetectionCapability, PerceptionBackend, StubBackend};
pub use distance::{
    CalibrationMapping, CalibrationPoints, DistanceEstimate, DistanceProfile, EstimationMethod,
    FrameReport, FusionPolicy, FusionSettings, GroundPoint, Homography, HomographyError,
    SafetyStatus, SharedCalibration,
};
pub use frame::{Frame, FrameSize, FrameSource, SharedFrameSource, SyntheticSource};
pub use motion::{
    ImuSource, InertialSample, MotionReading, MotionState, MotionStateDetector, MotionThresholds,
    ReplayImu, SimulatedImu,
};
pub use pose::{
    extract_features, BodyFeatures, BoundingBox, FootPoint, FootSource, Joint, JointLayout,
    Keypoint, PersonDetection, Point2, RawPose,
};
pub use schedule::{
    spawn_worker, FrameSlot, GateWait, GatedWorker, MotionGate, MotionLoop, Scheduler,
    WorkerHandle, WorkerStats,
};
pub use tilt::{classify_tilt, LineSegment, TiltReport, TiltSettings, TiltVerdict};
pub use workers::{PedestrianWorker, Presentation, TiltWorker};
