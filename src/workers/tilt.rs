use anyhow::Result;
use std::sync::Arc;

use super::{lock, Presentation};
use crate::detect::SharedBackend;
use crate::frame::SharedFrameSource;
use crate::motion::MotionState;
use crate::schedule::{FrameSlot, GatedWorker};
use crate::tilt::{classify_tilt, TiltSettings, TiltVerdict};

pub struct TiltWorker {
    source: SharedFrameSource,
    backend: SharedBackend,
    settings: TiltSettings,
    slot: Arc<FrameSlot<Presentation>>,
    last_verdict: Option<TiltVerdict>,
}

impl TiltWorker {
    pub fn new(
        source: SharedFrameSource,
        backend: SharedBackend,
        settings: TiltSettings,
        slot: Arc<FrameSlot<Presentation>>,
    ) -> Self {
        Self {
            source,
            backend,
            settings,
            slot,
            last_verdict: None,
        }
    }
}

impl GatedWorker for TiltWorker {
    fn name(&self) -> &'static str {
        "tilt"
    }

    fn trigger(&self) -> MotionState {
        MotionState::Stationary
    }

    fn run_once(&mut self) -> Result<()> {
        let frame = lock(&self.source, "frame source")?.next_frame()?;
        let lines = lock(&self.backend, "line backend")?.detect_lines(&frame)?;
        let report = classify_tilt(&lines, &self.settings);

        if self.last_verdict != Some(report.verdict) {
            if report.verdict == TiltVerdict::Normal {
                log::info!("load {} ({} lines)", report.verdict, report.lines_used);
            } else {
                log::warn!(
                    "load {}: mean {:.1} deg, std {:.1} deg",
                    report.verdict,
                    report.mean_angle_deg,
                    report.std_angle_deg
                );
            }
            self.last_verdict = Some(report.verdict);
        }

        self.slot.publish(Presentation::Tilt {
            frame: frame.sequence(),
            report,
        });
        Ok(())
    }
}
