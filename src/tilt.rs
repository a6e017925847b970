//! Cargo tilt verdict from detected line segments.
//!
//! The line detector (edge extraction plus probabilistic Hough transform) is an
//! external backend. This module judges the segments it returns: load edges
//! should be vertical, so a consistent lean means tilted cargo and a wide
//! spread of angles means an unstable stack.

use anyhow::{anyhow, Result};
use serde::Deserialize;

/// Steepest deviation from vertical still treated as a load edge.
const MAX_EDGE_ANGLE_DEG: f64 = 45.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineSegment {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl LineSegment {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Absolute deviation from vertical in degrees, for near-vertical segments.
    pub fn vertical_deviation_deg(&self) -> Option<f64> {
        let dx = f64::from(self.x2 - self.x1);
        let dy = f64::from(self.y2 - self.y1);
        if dy == 0.0 || dx.abs() > dy.abs() {
            return None;
        }
        let angle = (dx / dy).atan().to_degrees().abs();
        (angle <= MAX_EDGE_ANGLE_DEG).then_some(angle)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct TiltSettings {
    /// Mean deviation above which the load is tilted.
    pub tilt_threshold_deg: f64,
    /// Standard deviation above which the load is unstable.
    pub instability_threshold_deg: f64,
}

impl Default for TiltSettings {
    fn default() -> Self {
        Self {
            tilt_threshold_deg: 3.0,
            instability_threshold_deg: 2.0,
        }
    }
}

impl TiltSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.tilt_threshold_deg > 0.0 && self.tilt_threshold_deg < MAX_EDGE_ANGLE_DEG) {
            return Err(anyhow!("tilt threshold must be within (0, 45) degrees"));
        }
        if !(self.instability_threshold_deg > 0.0 && self.instability_threshold_deg.is_finite()) {
            return Err(anyhow!("instability threshold must be positive"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TiltVerdict {
    #[default]
    Normal,
    Tilted,
    Unstable,
}

impl std::fmt::Display for TiltVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TiltVerdict::Normal => "NORMAL",
            TiltVerdict::Tilted => "TILTED",
            TiltVerdict::Unstable => "UNSTABLE",
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TiltReport {
    pub verdict: TiltVerdict,
    pub mean_angle_deg: f64,
    pub std_angle_deg: f64,
    pub lines_used: usize,
}

pub fn classify_tilt(lines: &[LineSegment], settings: &TiltSettings) -> TiltReport {
    let angles: Vec<f64> = lines
        .iter()
        .filter_map(LineSegment::vertical_deviation_deg)
        .collect();
    if angles.is_empty() {
        return TiltReport::default();
    }

    let n = angles.len() as f64;
    let mean = angles.iter().sum::<f64>() / n;
    let variance = angles.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();

    let verdict = if mean > settings.tilt_threshold_deg {
        TiltVerdict::Tilted
    } else if std > settings.instability_threshold_deg {
        TiltVerdict::Unstable
    } else {
        TiltVerdict::Normal
    };

    TiltReport {
        verdict,
        mean_angle_deg: mean,
        std_angle_deg: std,
        lines_used: angles.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Segment of length 100 leaning `deg` degrees from vertical.
    fn leaning(deg: f64) -> LineSegment {
        let r = deg.to_radians();
        LineSegment::new(0.0, 0.0, (100.0 * r.sin()) as f32, (100.0 * r.cos()) as f32)
    }

    #[test]
    fn no_lines_is_normal() {
        let report = classify_tilt(&[], &TiltSettings::default());
        assert_eq!(report.verdict, TiltVerdict::Normal);
        assert_eq!(report.lines_used, 0);
        assert_eq!(report.mean_angle_deg, 0.0);
    }

    #[test]
    fn horizontal_and_shallow_lines_are_ignored() {
        let lines = [
            LineSegment::new(0.0, 0.0, 100.0, 0.0),
            LineSegment::new(0.0, 0.0, 100.0, 20.0),
            leaning(1.0),
        ];
        let report = classify_tilt(&lines, &TiltSettings::default());
        assert_eq!(report.lines_used, 1);
        assert!((report.mean_angle_deg - 1.0).abs() < 1e-3);
    }

    #[test]
    fn direction_of_lean_does_not_matter() {
        let report = classify_tilt(&[leaning(5.0), leaning(-5.0)], &TiltSettings::default());
        assert_eq!(report.verdict, TiltVerdict::Tilted);
        assert!(report.std_angle_deg < 1e-3);
    }

    #[test]
    fn upright_but_scattered_is_unstable() {
        let lines = [leaning(0.0), leaning(0.0), leaning(6.0), leaning(0.5)];
        let report = classify_tilt(&lines, &TiltSettings::default());
        assert!(report.mean_angle_deg <= 3.0);
        assert_eq!(report.verdict, TiltVerdict::Unstable);
    }

    #[test]
    fn consistent_upright_edges_are_normal() {
        let lines = [leaning(0.5), leaning(1.0), leaning(-0.8)];
        assert_eq!(
            classify_tilt(&lines, &TiltSettings::default()).verdict,
            TiltVerdict::Normal
        );
    }
}
