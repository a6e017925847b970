//! Ground-plane calibration: the calibration file, the fitted mapping, and the
//! shared slot the pedestrian worker reads it from.
//!
//! The capture tool (external) records the pixel position of markers placed
//! 1, 2, 3 and 4 metres straight ahead of the camera. Those four points all lie
//! on the optical axis, so a synthetic fifth point 100 px to the right of the
//! 1 m marker is mapped to 0.5 m lateral to fix the horizontal scale.
//!
//! Five such points cannot pin a general homography, so the fit assumes a
//! level camera: forward distance depends on pixel row only.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use super::homography::{Homography, HomographyError};
use crate::pose::Point2;

/// Forward distances of the four calibration markers, in file order.
pub const MARKER_DISTANCES_M: [f64; 4] = [1.0, 2.0, 3.0, 4.0];

/// Pixel offset of the synthetic horizontal-scale point from the 1 m marker.
pub const SCALE_POINT_OFFSET_PX: f64 = 100.0;

/// Ground coordinates `(lateral, forward)` of the synthetic point.
pub const SCALE_POINT_GROUND_M: [f64; 2] = [0.5, 1.0];

#[derive(Debug, Serialize, Deserialize)]
struct CalibrationFile {
    pixel_points: Vec<[f64; 2]>,
}

/// Pixel positions of the 1..4 m markers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationPoints {
    pixels: [[f64; 2]; 4],
}

impl CalibrationPoints {
    pub fn new(pixels: [[f64; 2]; 4]) -> Result<Self> {
        if pixels.iter().any(|p| !p[0].is_finite() || !p[1].is_finite()) {
            return Err(anyhow!("calibration points must be finite"));
        }
        Ok(Self { pixels })
    }

    pub fn from_slice(points: &[[f64; 2]]) -> Result<Self> {
        let pixels: [[f64; 2]; 4] = points.try_into().map_err(|_| {
            anyhow!(
                "calibration requires exactly 4 pixel points, got {}",
                points.len()
            )
        })?;
        Self::new(pixels)
    }

    pub fn pixels(&self) -> &[[f64; 2]; 4] {
        &self.pixels
    }

    /// Pixel and ground correspondences including the synthetic scale point.
    pub fn correspondences(&self) -> (Vec<[f64; 2]>, Vec<[f64; 2]>) {
        let mut src = self.pixels.to_vec();
        let mut dst: Vec<[f64; 2]> = MARKER_DISTANCES_M.iter().map(|&d| [0.0, d]).collect();
        let p1 = self.pixels[0];
        src.push([p1[0] + SCALE_POINT_OFFSET_PX, p1[1]]);
        dst.push(SCALE_POINT_GROUND_M);
        (src, dst)
    }
}

pub fn load_calibration(path: &Path) -> Result<CalibrationPoints> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read calibration file {}", path.display()))?;
    let file: CalibrationFile = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid calibration file {}: {}", path.display(), e))?;
    CalibrationPoints::from_slice(&file.pixel_points)
        .with_context(|| format!("invalid calibration file {}", path.display()))
}

pub fn save_calibration(path: &Path, points: &CalibrationPoints) -> Result<()> {
    let file = CalibrationFile {
        pixel_points: points.pixels.to_vec(),
    };
    let json = serde_json::to_string_pretty(&file)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write calibration file {}", path.display()))?;
    Ok(())
}

/// Ground-plane position in metres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundPoint {
    pub lateral_m: f64,
    pub forward_m: f64,
}

/// Pixel → ground mapping fitted from calibration points.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationMapping {
    homography: Homography,
}

impl CalibrationMapping {
    pub fn from_points(points: &CalibrationPoints) -> Result<Self, HomographyError> {
        let (src, dst) = points.correspondences();
        let homography = Homography::fit_level(&src, &dst)?;
        log::debug!(
            "calibration fit rms residual {:.4} m",
            homography.rms_error(&src, &dst)
        );
        Ok(Self { homography })
    }

    /// Wrap a transform whose output is already `(lateral, forward)` metres.
    pub fn from_homography(homography: Homography) -> Self {
        Self { homography }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let points = load_calibration(path)?;
        Self::from_points(&points)
            .map_err(|e| anyhow!("calibration {} rejected: {}", path.display(), e))
    }

    pub fn homography(&self) -> &Homography {
        &self.homography
    }

    pub fn map(&self, point: Point2) -> Option<GroundPoint> {
        let [lateral_m, forward_m] = self.homography.project(point.x as f64, point.y as f64)?;
        Some(GroundPoint {
            lateral_m,
            forward_m,
        })
    }
}

/// Calibration owned for the session, replaced only on explicit reset.
///
/// Readers take a cheap `Arc` snapshot per frame; a reload swaps the slot
/// without blocking a frame already in flight.
#[derive(Debug)]
pub struct SharedCalibration {
    path: Option<PathBuf>,
    mapping: RwLock<Option<Arc<CalibrationMapping>>>,
}

impl SharedCalibration {
    pub fn new(mapping: Option<CalibrationMapping>) -> Self {
        Self {
            path: None,
            mapping: RwLock::new(mapping.map(Arc::new)),
        }
    }

    /// Load from `path`, degrading to "no calibration" on any failure.
    pub fn load_or_degrade(path: &Path) -> Self {
        let shared = Self {
            path: Some(path.to_path_buf()),
            mapping: RwLock::new(None),
        };
        shared.reload();
        shared
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn current(&self) -> Option<Arc<CalibrationMapping>> {
        self.mapping
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_available(&self) -> bool {
        self.current().is_some()
    }

    pub fn replace(&self, mapping: Option<CalibrationMapping>) {
        *self
            .mapping
            .write()
            .unwrap_or_else(PoisonError::into_inner) = mapping.map(Arc::new);
    }

    /// Re-read the calibration file. Returns true when a mapping is now active.
    pub fn reload(&self) -> bool {
        let Some(path) = self.path.as_deref() else {
            log::warn!("calibration reset requested but no calibration path is configured");
            return self.is_available();
        };
        match CalibrationMapping::load(path) {
            Ok(mapping) => {
                log::info!("calibration loaded from {}", path.display());
                self.replace(Some(mapping));
                true
            }
            Err(e) => {
                log::warn!(
                    "homography unavailable, falling back to torso-only distance: {:#}",
                    e
                );
                self.replace(None);
                false
            }
        }
    }
}
