//! The two gated workloads.
//!
//! - `PedestrianWorker` runs while MOVING: pose estimation, distance fusion,
//!   alerting.
//! - `TiltWorker` runs while STATIONARY: line detection and tilt verdict.
//!
//! Both publish what they last saw to a shared `FrameSlot<Presentation>`.

mod pedestrian;
mod tilt;

pub use pedestrian::PedestrianWorker;
pub use tilt::TiltWorker;

use anyhow::{anyhow, Result};
use std::sync::MutexGuard;

use crate::distance::FrameReport;
use crate::tilt::TiltReport;

/// Latest worker output for the display side.
#[derive(Clone, Debug, PartialEq)]
pub enum Presentation {
    Pedestrian {
        frame: u64,
        report: FrameReport,
        calibrated: bool,
    },
    Tilt {
        frame: u64,
        report: TiltReport,
    },
}

impl Presentation {
    pub fn frame(&self) -> u64 {
        match self {
            Presentation::Pedestrian { frame, .. } | Presentation::Tilt { frame, .. } => *frame,
        }
    }
}

impl std::fmt::Display for Presentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Presentation::Pedestrian {
                frame,
                report,
                calibrated,
            } => {
                write!(f, "frame {} | {} | {} people", frame, report.alert, report.estimates.len())?;
                if let Some(closest) = report.closest() {
                    write!(f, " | closest {:.2} m ({})", closest.distance_m, closest.method)?;
                }
                if !calibrated {
                    f.write_str(" | uncalibrated")?;
                }
                Ok(())
            }
            Presentation::Tilt { frame, report } => write!(
                f,
                "frame {} | load {} | mean {:.1} deg | std {:.1} deg | {} lines",
                frame, report.verdict, report.mean_angle_deg, report.std_angle_deg, report.lines_used
            ),
        }
    }
}

fn lock<'a, T: ?Sized>(mutex: &'a std::sync::Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex.lock().map_err(|_| anyhow!("{} lock poisoned", what))
}
