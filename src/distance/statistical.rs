use anyhow::{anyhow, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Fewest `(torso, distance)` samples `DistanceProfile::fit` accepts.
pub const MIN_PROFILE_SAMPLES: usize = 5;

/// Smallest accepted ratio of extreme singular values in a profile fit.
const MIN_FIT_CONDITION: f64 = 1e-10;

/// Calibration profile for the torso-length distance model.
///
/// First stage: `raw = alpha / torso_px + beta` (inverse-law fit).
/// Second stage: `a·raw² + b·raw + c`, an empirical bias correction.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistanceProfile {
    pub alpha: f64,
    pub beta: f64,
    pub correct_a: f64,
    pub correct_b: f64,
    pub correct_c: f64,
    /// Clamp corrected distances at zero. When unset, negative outputs pass
    /// through and classify as DANGER.
    pub clamp_negative: bool,
    /// Run the homography forward distance through the same correction.
    pub correct_homography: bool,
}

impl DistanceProfile {
    /// 640×480 integration profile fit against ground truth on site.
    pub const fn field() -> Self {
        Self {
            alpha: 268.82,
            beta: -3.90,
            correct_a: 0.030258,
            correct_b: 0.853139,
            correct_c: 0.151990,
            clamp_negative: false,
            correct_homography: true,
        }
    }

    /// Full-FOV capture profile with an identity correction.
    pub const fn wide_view() -> Self {
        Self {
            alpha: 830.93,
            beta: 1.09,
            correct_a: 0.0,
            correct_b: 1.0,
            correct_c: 0.0,
            clamp_negative: true,
            correct_homography: true,
        }
    }

    pub fn preset(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "field" => Ok(Self::field()),
            "wide_view" | "wide-view" => Ok(Self::wide_view()),
            other => Err(anyhow!("unknown distance profile preset '{}'", other)),
        }
    }

    /// Apply the quadratic correction.
    pub fn correct(&self, distance: f64) -> f64 {
        let corrected =
            self.correct_a * distance * distance + self.correct_b * distance + self.correct_c;
        if self.clamp_negative {
            corrected.max(0.0)
        } else {
            corrected
        }
    }

    /// Corrected torso-only distance; `None` unless torso length is positive.
    pub fn estimate(&self, torso_length_px: Option<f32>) -> Option<f64> {
        let torso = f64::from(torso_length_px?);
        if torso.is_nan() || torso <= 0.0 {
            return None;
        }
        let raw = self.alpha / torso + self.beta;
        Some(self.correct(raw))
    }

    /// Fit a profile from `(torso_px, distance_m)` ground-truth samples.
    ///
    /// Stage one is a least-squares fit of `distance = alpha / torso + beta`.
    /// Stage two fits the quadratic correction of the stage-one predictions
    /// against the same ground truth. Flags are taken from the field preset.
    pub fn fit(samples: &[(f64, f64)]) -> Result<Self> {
        if samples.len() < MIN_PROFILE_SAMPLES {
            return Err(anyhow!(
                "profile fit needs at least {} samples, got {}",
                MIN_PROFILE_SAMPLES,
                samples.len()
            ));
        }
        if let Some((torso, distance)) = samples
            .iter()
            .find(|(t, d)| !t.is_finite() || *t <= 0.0 || !d.is_finite())
        {
            return Err(anyhow!(
                "invalid profile sample: torso {} px, distance {} m",
                torso,
                distance
            ));
        }

        let n = samples.len();
        let truth = DVector::from_iterator(n, samples.iter().map(|&(_, d)| d));

        let inverse = DMatrix::from_fn(n, 2, |i, j| if j == 0 { 1.0 / samples[i].0 } else { 1.0 });
        let first = least_squares(inverse, &truth)?;
        let (alpha, beta) = (first[0], first[1]);

        let predicted: Vec<f64> = samples.iter().map(|&(t, _)| alpha / t + beta).collect();
        let quadratic = DMatrix::from_fn(n, 3, |i, j| predicted[i].powi(2 - j as i32));
        let second = least_squares(quadratic, &truth)?;

        let field = Self::field();
        let profile = Self {
            alpha,
            beta,
            correct_a: second[0],
            correct_b: second[1],
            correct_c: second[2],
            clamp_negative: field.clamp_negative,
            correct_homography: field.correct_homography,
        };
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<()> {
        let constants = [
            ("alpha", self.alpha),
            ("beta", self.beta),
            ("correct_a", self.correct_a),
            ("correct_b", self.correct_b),
            ("correct_c", self.correct_c),
        ];
        for (name, value) in constants {
            if !value.is_finite() {
                return Err(anyhow!("distance profile {} must be finite", name));
            }
        }
        if self.alpha <= 0.0 {
            return Err(anyhow!("distance profile alpha must be positive"));
        }
        Ok(())
    }
}

fn least_squares(design: DMatrix<f64>, rhs: &DVector<f64>) -> Result<DVector<f64>> {
    let svd = design.svd(true, true);
    let largest = svd.singular_values.iter().fold(0.0_f64, |m, &v| m.max(v));
    let smallest = svd
        .singular_values
        .iter()
        .fold(f64::INFINITY, |m, &v| m.min(v));
    if !largest.is_finite() || smallest <= MIN_FIT_CONDITION * largest {
        return Err(anyhow!(
            "profile samples do not determine a fit (need varied torso lengths)"
        ));
    }
    svd.solve(rhs, 1e-12)
        .map_err(|e| anyhow!("profile fit failed: {}", e))
}

impl Default for DistanceProfile {
    fn default() -> Self {
        Self::field()
    }
}
