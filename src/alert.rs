//! Per-frame alert sinks.
//!
//! The display and buzzer are external. The pedestrian worker hands every
//! `FrameReport` to an `AlertSink`; what the sink does with it is up to the
//! deployment.

use anyhow::{anyhow, Result};
use std::sync::mpsc::{Receiver, Sender};

use crate::distance::{FrameReport, SafetyStatus};

pub trait AlertSink: Send {
    fn publish(&mut self, report: &FrameReport) -> Result<()>;
}

/// Logs changes of the frame alert level.
#[derive(Debug, Default)]
pub struct LogAlertSink {
    last: Option<SafetyStatus>,
}

impl LogAlertSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlertSink for LogAlertSink {
    fn publish(&mut self, report: &FrameReport) -> Result<()> {
        for (i, est) in report.estimates.iter().enumerate() {
            log::debug!(
                "person {}: {:.2} m, lateral {:+.2} m via {} ({})",
                i,
                est.distance_m,
                est.lateral_offset_m,
                est.method,
                est.status
            );
        }
        if self.last == Some(report.alert) {
            return Ok(());
        }
        match (report.alert, report.closest()) {
            (SafetyStatus::Safe, _) | (_, None) => {
                log::info!("alert level {}", report.alert)
            }
            (level, Some(closest)) => log::warn!(
                "alert level {}: person at {:.2} m ({})",
                level,
                closest.distance_m,
                closest.method
            ),
        }
        self.last = Some(report.alert);
        Ok(())
    }
}

/// Forwards reports to another thread.
#[derive(Debug)]
pub struct ChannelAlertSink {
    tx: Sender<FrameReport>,
}

impl ChannelAlertSink {
    pub fn new() -> (Self, Receiver<FrameReport>) {
        let (tx, rx) = std::sync::mpsc::channel();
        (Self { tx }, rx)
    }
}

impl AlertSink for ChannelAlertSink {
    fn publish(&mut self, report: &FrameReport) -> Result<()> {
        self.tx
            .send(report.clone())
            .map_err(|_| anyhow!("alert receiver dropped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{DistanceEstimate, EstimationMethod};

    fn report(distance_m: f64) -> FrameReport {
        FrameReport::from_estimates(vec![DistanceEstimate {
            lateral_offset_m: 0.0,
            distance_m,
            method: EstimationMethod::Mix,
            status: SafetyStatus::classify(distance_m),
            foot_source: None,
        }])
    }

    #[test]
    fn channel_sink_forwards_reports() {
        let (mut sink, rx) = ChannelAlertSink::new();
        sink.publish(&report(1.0)).unwrap();
        assert_eq!(rx.recv().unwrap().alert, SafetyStatus::Danger);
        drop(rx);
        assert!(sink.publish(&report(1.0)).is_err());
    }

    #[test]
    fn log_sink_tracks_last_level() {
        let mut sink = LogAlertSink::new();
        sink.publish(&report(2.0)).unwrap();
        assert_eq!(sink.last, Some(SafetyStatus::Warning));
        sink.publish(&FrameReport::default()).unwrap();
        assert_eq!(sink.last, Some(SafetyStatus::Safe));
    }
}
