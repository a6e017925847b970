use anyhow::{anyhow, Result};

use crate::frame::Frame;
use crate::pose::RawPose;
use crate::tilt::LineSegment;

/// Perception capabilities a backend can provide.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionCapability {
    /// Person boxes with body keypoints.
    PoseEstimation,
    /// Straight line segments for load-edge analysis.
    LineSegments,
}

/// Perception backend trait.
///
/// Wraps an external inference engine. The core never looks at pixels itself;
/// backends receive the frame read-only and return geometry.
///
/// Backends must:
/// - Not retain frame pixels beyond the call
/// - Return keypoints in the joint order of the layout they were configured for
pub trait PerceptionBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Returns true when the backend supports a capability.
    fn supports(&self, capability: DetectionCapability) -> bool;

    /// Estimate person poses in a frame.
    fn estimate_poses(&mut self, _frame: &Frame) -> Result<Vec<RawPose>> {
        Err(anyhow!("backend '{}' does not estimate poses", self.name()))
    }

    /// Detect straight line segments in a frame.
    fn detect_lines(&mut self, _frame: &Frame) -> Result<Vec<LineSegment>> {
        Err(anyhow!("backend '{}' does not detect lines", self.name()))
    }

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
