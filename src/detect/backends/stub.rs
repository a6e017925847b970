use anyhow::Result;

use crate::detect::backend::{DetectionCapability, PerceptionBackend};
use crate::frame::{Frame, FrameSize};
use crate::pose::{BoundingBox, Joint, JointLayout, Keypoint, RawPose};
use crate::tilt::LineSegment;

/// Stub backend for testing and `stub://` deployments.
///
/// Replays scripted outputs in order, wrapping around. An empty script yields
/// empty results.
#[derive(Debug, Clone, Default)]
pub struct StubBackend {
    poses: Vec<Vec<RawPose>>,
    lines: Vec<Vec<LineSegment>>,
    pose_calls: usize,
    line_calls: usize,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(poses: Vec<Vec<RawPose>>, lines: Vec<Vec<LineSegment>>) -> Self {
        Self {
            poses,
            lines,
            pose_calls: 0,
            line_calls: 0,
        }
    }

    /// One person walking from about 6 m to about 1 m in front of the camera,
    /// then leaving, and a load whose edges alternate between upright and leaning.
    pub fn demo(layout: JointLayout, size: FrameSize, steps: usize) -> Self {
        let steps = steps.max(2);
        let mut poses: Vec<Vec<RawPose>> = (0..steps)
            .map(|i| {
                let t = i as f32 / (steps - 1) as f32;
                vec![walker(layout, size, 6.0 - 5.0 * t)]
            })
            .collect();
        poses.push(Vec::new());

        let upright = vec![
            LineSegment::new(200.0, 100.0, 201.0, 380.0),
            LineSegment::new(440.0, 100.0, 440.0, 380.0),
        ];
        let leaning = vec![
            LineSegment::new(200.0, 100.0, 230.0, 380.0),
            LineSegment::new(440.0, 100.0, 468.0, 380.0),
        ];
        Self::scripted(poses, vec![upright, leaning])
    }
}

/// Synthetic pose at roughly `distance_m`, scaled for a 640×480 field camera.
fn walker(layout: JointLayout, size: FrameSize, distance_m: f32) -> RawPose {
    let w = size.width as f32;
    let h = size.height as f32;
    let torso = 268.82 / (distance_m + 3.9) * h / 480.0;
    let foot_y = (h * 0.5 + h * 0.4 / distance_m).min(h * 0.93);
    let hip_y = foot_y - torso * 1.6;
    let shoulder_y = hip_y - torso;
    let knee_y = (hip_y + foot_y) / 2.0;
    let cx = w / 2.0;
    let half = torso * 0.25;

    let mut keypoints = vec![Keypoint::default(); layout.keypoint_count()];
    let mut place = |joint: Joint, x: f32, y: f32| {
        keypoints[layout.index(joint)] = Keypoint::new(x, y, 0.9);
    };
    place(Joint::LeftShoulder, cx - half, shoulder_y);
    place(Joint::RightShoulder, cx + half, shoulder_y);
    place(Joint::LeftHip, cx - half * 0.8, hip_y);
    place(Joint::RightHip, cx + half * 0.8, hip_y);
    place(Joint::LeftKnee, cx - half * 0.6, knee_y);
    place(Joint::RightKnee, cx + half * 0.6, knee_y);
    place(Joint::LeftAnkle, cx - half * 0.6, foot_y);
    place(Joint::RightAnkle, cx + half * 0.6, foot_y);

    RawPose {
        bbox: BoundingBox::new(cx - torso, shoulder_y - torso * 0.6, cx + torso, foot_y + 4.0),
        keypoints,
    }
}

fn next_scripted<T: Clone>(script: &[Vec<T>], calls: &mut usize) -> Vec<T> {
    if script.is_empty() {
        return Vec::new();
    }
    let out = script[*calls % script.len()].clone();
    *calls += 1;
    out
}

impl PerceptionBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        matches!(
            capability,
            DetectionCapability::PoseEstimation | DetectionCapability::LineSegments
        )
    }

    fn estimate_poses(&mut self, _frame: &Frame) -> Result<Vec<RawPose>> {
        Ok(next_scripted(&self.poses, &mut self.pose_calls))
    }

    fn detect_lines(&mut self, _frame: &Frame) -> Result<Vec<LineSegment>> {
        Ok(next_scripted(&self.lines, &mut self.line_calls))
    }
}
