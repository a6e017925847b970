use anyhow::Result;
use std::sync::Arc;

use super::{lock, Presentation};
use crate::alert::AlertSink;
use crate::detect::SharedBackend;
use crate::distance::{FusionPolicy, SharedCalibration};
use crate::frame::SharedFrameSource;
use crate::motion::MotionState;
use crate::pose::{JointLayout, PersonDetection};
use crate::schedule::{FrameSlot, GatedWorker};

pub struct PedestrianWorker {
    source: SharedFrameSource,
    backend: SharedBackend,
    layout: JointLayout,
    policy: FusionPolicy,
    calibration: Arc<SharedCalibration>,
    sink: Box<dyn AlertSink>,
    slot: Arc<FrameSlot<Presentation>>,
}

impl PedestrianWorker {
    pub fn new(
        source: SharedFrameSource,
        backend: SharedBackend,
        layout: JointLayout,
        policy: FusionPolicy,
        calibration: Arc<SharedCalibration>,
        sink: Box<dyn AlertSink>,
        slot: Arc<FrameSlot<Presentation>>,
    ) -> Self {
        Self {
            source,
            backend,
            layout,
            policy,
            calibration,
            sink,
            slot,
        }
    }
}

impl GatedWorker for PedestrianWorker {
    fn name(&self) -> &'static str {
        "pedestrian"
    }

    fn trigger(&self) -> MotionState {
        MotionState::Moving
    }

    fn run_once(&mut self) -> Result<()> {
        let frame = lock(&self.source, "frame source")?.next_frame()?;
        let raw = lock(&self.backend, "pose backend")?.estimate_poses(&frame)?;

        let people: Vec<PersonDetection> = raw
            .into_iter()
            .filter_map(|pose| match PersonDetection::from_raw(pose, self.layout) {
                Ok(person) => Some(person),
                Err(e) => {
                    log::warn!("frame {}: pose rejected: {}", frame.sequence(), e);
                    None
                }
            })
            .collect();

        // One snapshot per frame; a reset mid-frame applies to the next one.
        let mapping = self.calibration.current();
        let report = self
            .policy
            .evaluate_frame(&people, frame.size(), mapping.as_deref());

        self.slot.publish(Presentation::Pedestrian {
            frame: frame.sequence(),
            report: report.clone(),
            calibrated: mapping.is_some(),
        });
        self.sink.publish(&report)
    }
}
