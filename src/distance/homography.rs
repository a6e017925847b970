//! Image-to-ground projective transform estimated by DLT with Hartley normalization.
//!
//! Provides:
//! - Least-squares Direct Linear Transform over ≥4 point correspondences.
//! - A constrained fit for a level, forward-facing camera, where the second
//!   output and the projective scale depend on source y only.
//! - Degeneracy rejection (non-unique or non-invertible fits never escape as NaN).
//! - Point projection and RMS reprojection error.

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

/// Smallest |w| accepted when dehomogenizing a projected point.
const MIN_HOMOGENEOUS_W: f64 = 1e-12;

/// A second null direction this small (relative to the largest eigenvalue of AᵀA)
/// means the correspondences do not pin down a unique transform.
const NULLSPACE_GAP: f64 = 1e-10;

/// Minimum |det| of the unit-norm transform in normalized coordinates.
const MIN_NORMALIZED_DET: f64 = 1e-9;

/// Smallest accepted ratio of extreme singular values in the level fit.
const MIN_LEVEL_CONDITION: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub enum HomographyError {
    TooFewPoints { needed: usize, got: usize },
    LengthMismatch { src: usize, dst: usize },
    NonFinite,
    NumericalFailure(String),
    Degenerate(String),
}

impl std::fmt::Display for HomographyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewPoints { needed, got } => {
                write!(f, "too few points: need {}, got {}", needed, got)
            }
            Self::LengthMismatch { src, dst } => {
                write!(f, "correspondence mismatch: {} source vs {} destination points", src, dst)
            }
            Self::NonFinite => write!(f, "correspondences contain non-finite coordinates"),
            Self::NumericalFailure(msg) => write!(f, "numerical failure: {}", msg),
            Self::Degenerate(msg) => write!(f, "degenerate homography: {}", msg),
        }
    }
}

impl std::error::Error for HomographyError {}

/// Validated, invertible 3×3 projective transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    /// Fit H such that `dst ≈ project(H, src)` in the least-squares sense.
    pub fn fit(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Self, HomographyError> {
        if src.len() != dst.len() {
            return Err(HomographyError::LengthMismatch {
                src: src.len(),
                dst: dst.len(),
            });
        }
        let n = src.len();
        if n < 4 {
            return Err(HomographyError::TooFewPoints { needed: 4, got: n });
        }
        if src
            .iter()
            .chain(dst.iter())
            .any(|p| !p[0].is_finite() || !p[1].is_finite())
        {
            return Err(HomographyError::NonFinite);
        }

        let (t_src, src_n) = normalize_points(src);
        let (t_dst, dst_n) = normalize_points(dst);

        // 2n × 9 design matrix
        let mut a = DMatrix::zeros(2 * n, 9);
        for i in 0..n {
            let (sx, sy) = (src_n[i][0], src_n[i][1]);
            let (dx, dy) = (dst_n[i][0], dst_n[i][1]);

            a[(2 * i, 3)] = -sx;
            a[(2 * i, 4)] = -sy;
            a[(2 * i, 5)] = -1.0;
            a[(2 * i, 6)] = dy * sx;
            a[(2 * i, 7)] = dy * sy;
            a[(2 * i, 8)] = dy;

            a[(2 * i + 1, 0)] = sx;
            a[(2 * i + 1, 1)] = sy;
            a[(2 * i + 1, 2)] = 1.0;
            a[(2 * i + 1, 6)] = -dx * sx;
            a[(2 * i + 1, 7)] = -dx * sy;
            a[(2 * i + 1, 8)] = -dx;
        }

        // h is the eigenvector of the smallest eigenvalue of AᵀA.
        let ata = a.transpose() * &a;
        let eig = nalgebra::SymmetricEigen::new(ata);

        let mut order: Vec<usize> = (0..9).collect();
        order.sort_by(|&i, &j| {
            eig.eigenvalues[i]
                .abs()
                .total_cmp(&eig.eigenvalues[j].abs())
        });
        let smallest = order[0];
        let second = eig.eigenvalues[order[1]].abs();
        let largest = eig.eigenvalues[order[8]].abs();
        if !largest.is_finite() || largest <= 0.0 {
            return Err(HomographyError::NumericalFailure(
                "design matrix has no usable spectrum".into(),
            ));
        }
        if second <= NULLSPACE_GAP * largest {
            return Err(HomographyError::Degenerate(
                "correspondences do not determine a unique transform".into(),
            ));
        }

        let h: Vec<f64> = (0..9).map(|j| eig.eigenvectors[(j, smallest)]).collect();
        let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);
        if h_norm.determinant().abs() < MIN_NORMALIZED_DET {
            return Err(HomographyError::Degenerate(
                "fitted transform is singular".into(),
            ));
        }

        denormalize(&t_src, &t_dst, h_norm)
    }

    /// Fit with `h21 = h31 = 0`: the second output and the projective scale
    /// depend on source y only, as for a level camera with no roll.
    ///
    /// Leaves six unknowns, so points along one image column plus a single
    /// point off it determine the transform.
    pub fn fit_level(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<Self, HomographyError> {
        if src.len() != dst.len() {
            return Err(HomographyError::LengthMismatch {
                src: src.len(),
                dst: dst.len(),
            });
        }
        let n = src.len();
        if n < 4 {
            return Err(HomographyError::TooFewPoints { needed: 4, got: n });
        }
        if src
            .iter()
            .chain(dst.iter())
            .any(|p| !p[0].is_finite() || !p[1].is_finite())
        {
            return Err(HomographyError::NonFinite);
        }

        // Normalization keeps both zero entries zero, so the constraint holds
        // in normalized coordinates too.
        let (t_src, src_n) = normalize_points(src);
        let (t_dst, dst_n) = normalize_points(dst);

        // Unknowns [h11, h12, h13, h22, h23, h32] with h33 = 1.
        let mut a = DMatrix::<f64>::zeros(2 * n, 6);
        let mut b = DVector::<f64>::zeros(2 * n);
        for i in 0..n {
            let (sx, sy) = (src_n[i][0], src_n[i][1]);
            let (dx, dy) = (dst_n[i][0], dst_n[i][1]);

            a[(2 * i, 0)] = sx;
            a[(2 * i, 1)] = sy;
            a[(2 * i, 2)] = 1.0;
            a[(2 * i, 5)] = -dx * sy;
            b[2 * i] = dx;

            a[(2 * i + 1, 3)] = sy;
            a[(2 * i + 1, 4)] = 1.0;
            a[(2 * i + 1, 5)] = -dy * sy;
            b[2 * i + 1] = dy;
        }

        let svd = a.svd(true, true);
        let largest = svd.singular_values.iter().fold(0.0_f64, |m, &v| m.max(v));
        let smallest = svd
            .singular_values
            .iter()
            .fold(f64::INFINITY, |m, &v| m.min(v));
        if !largest.is_finite() || largest <= 0.0 {
            return Err(HomographyError::NumericalFailure(
                "design matrix has no usable spectrum".into(),
            ));
        }
        if smallest <= MIN_LEVEL_CONDITION * largest {
            return Err(HomographyError::Degenerate(
                "correspondences do not determine a unique transform".into(),
            ));
        }
        let p = svd
            .solve(&b, 1e-12)
            .map_err(|e| HomographyError::NumericalFailure(e.to_string()))?;

        let h_norm = Matrix3::new(p[0], p[1], p[2], 0.0, p[3], p[4], 0.0, p[5], 1.0);
        if h_norm.determinant().abs() < MIN_NORMALIZED_DET {
            return Err(HomographyError::Degenerate(
                "fitted transform is singular".into(),
            ));
        }
        denormalize(&t_src, &t_dst, h_norm)
    }

    /// Wrap an existing matrix, rejecting non-finite or non-invertible input.
    pub fn from_matrix(matrix: Matrix3<f64>) -> Result<Self, HomographyError> {
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(HomographyError::NonFinite);
        }
        if matrix.try_inverse().is_none() {
            return Err(HomographyError::Degenerate("matrix is not invertible".into()));
        }
        Ok(Self { matrix })
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Transform mapping the other way.
    pub fn inverse(&self) -> Result<Self, HomographyError> {
        let inv = self
            .matrix
            .try_inverse()
            .ok_or_else(|| HomographyError::Degenerate("matrix is not invertible".into()))?;
        Self::from_matrix(inv)
    }

    /// Project `(x, y)`; `None` for points mapped to (or near) infinity.
    pub fn project(&self, x: f64, y: f64) -> Option<[f64; 2]> {
        let p = self.matrix * Vector3::new(x, y, 1.0);
        if p[2].abs() < MIN_HOMOGENEOUS_W {
            return None;
        }
        let out = [p[0] / p[2], p[1] / p[2]];
        (out[0].is_finite() && out[1].is_finite()).then_some(out)
    }

    /// RMS of ||project(H, src) - dst|| over all correspondences.
    pub fn rms_error(&self, src: &[[f64; 2]], dst: &[[f64; 2]]) -> f64 {
        let n = src.len().min(dst.len());
        if n == 0 {
            return 0.0;
        }
        let sum: f64 = src
            .iter()
            .zip(dst)
            .map(|(s, d)| match self.project(s[0], s[1]) {
                Some(p) => (p[0] - d[0]).powi(2) + (p[1] - d[1]).powi(2),
                None => f64::INFINITY,
            })
            .sum();
        (sum / n as f64).sqrt()
    }
}

/// H = T_dst^-1 * H_norm * T_src, scaled so that h33 = 1.
fn denormalize(
    t_src: &Matrix3<f64>,
    t_dst: &Matrix3<f64>,
    h_norm: Matrix3<f64>,
) -> Result<Homography, HomographyError> {
    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or_else(|| HomographyError::NumericalFailure("T_dst not invertible".into()))?;
    let h = t_dst_inv * h_norm * t_src;

    let scale = h[(2, 2)];
    let h = if scale.abs() < 1e-15 { h } else { h / scale };
    Homography::from_matrix(h)
}

/// Translate centroid to origin, scale mean distance to sqrt(2).
fn normalize_points(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let n = pts.len() as f64;
    let cx: f64 = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy: f64 = pts.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist: f64 = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts
        .iter()
        .map(|p| [s * (p[0] - cx), s * (p[1] - cy)])
        .collect();

    (t, normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: [f64; 2], b: [f64; 2], tol: f64) {
        assert!(
            (a[0] - b[0]).abs() < tol && (a[1] - b[1]).abs() < tol,
            "{:?} vs {:?}",
            a,
            b
        );
    }

    #[test]
    fn fits_four_points_in_general_position() {
        let src = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let dst = [[10.0, 20.0], [110.0, 25.0], [105.0, 130.0], [5.0, 120.0]];
        let h = Homography::fit(&src, &dst).unwrap();
        for (s, d) in src.iter().zip(dst.iter()) {
            assert_close(h.project(s[0], s[1]).unwrap(), *d, 1e-6);
        }
        assert!(h.rms_error(&src, &dst) < 1e-6);
    }

    #[test]
    fn recovers_known_transform_from_overdetermined_set() {
        let truth = Matrix3::new(0.9, 0.05, 12.0, -0.03, 1.1, -4.0, 0.0004, 0.0002, 1.0);
        let truth = Homography::from_matrix(truth).unwrap();
        let src: Vec<[f64; 2]> = [
            [0.0, 0.0],
            [200.0, 10.0],
            [180.0, 220.0],
            [15.0, 240.0],
            [100.0, 100.0],
            [60.0, 150.0],
        ]
        .to_vec();
        let dst: Vec<[f64; 2]> = src
            .iter()
            .map(|p| truth.project(p[0], p[1]).unwrap())
            .collect();
        let fitted = Homography::fit(&src, &dst).unwrap();
        let point = fitted.project(50.0, 75.0).unwrap();
        assert_close(point, truth.project(50.0, 75.0).unwrap(), 1e-6);
    }

    #[test]
    fn level_fit_recovers_pinhole_ground_plane() {
        // f = 200 px, principal point (320, 240), camera 1 m up.
        let truth = Homography::from_matrix(Matrix3::new(
            0.005, 0.0, -1.6, 0.0, 0.0, 1.0, 0.0, 0.005, -1.2,
        ))
        .unwrap();
        let src = [[320.0, 440.0], [320.0, 340.0], [320.0, 306.0], [320.0, 290.0], [420.0, 440.0]];
        let dst: Vec<[f64; 2]> = src
            .iter()
            .map(|p| truth.project(p[0], p[1]).unwrap())
            .collect();
        let fitted = Homography::fit_level(&src, &dst).unwrap();
        assert_close(
            fitted.project(150.0, 300.0).unwrap(),
            truth.project(150.0, 300.0).unwrap(),
            1e-6,
        );
    }

    #[test]
    fn level_fit_needs_a_point_off_the_column() {
        let src = [[320.0, 440.0], [320.0, 340.0], [320.0, 306.0], [320.0, 290.0]];
        let dst = [[0.0, 1.0], [0.0, 2.0], [0.0, 3.0], [0.0, 4.0]];
        assert!(matches!(
            Homography::fit_level(&src, &dst),
            Err(HomographyError::Degenerate(_))
        ));
    }

    #[test]
    fn rejects_too_few_and_mismatched_points() {
        let three = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        assert_eq!(
            Homography::fit(&three, &three),
            Err(HomographyError::TooFewPoints { needed: 4, got: 3 })
        );
        let four = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        assert!(matches!(
            Homography::fit(&four, &three),
            Err(HomographyError::LengthMismatch { src: 4, dst: 3 })
        ));
    }

    #[test]
    fn rejects_coincident_points() {
        let src = [[5.0, 5.0]; 4];
        let dst = [[0.0, 1.0], [0.0, 2.0], [0.0, 3.0], [0.0, 4.0]];
        assert!(matches!(
            Homography::fit(&src, &dst),
            Err(HomographyError::Degenerate(_))
        ));
    }

    #[test]
    fn rejects_non_finite_input() {
        let src = [[0.0, 0.0], [1.0, 0.0], [1.0, f64::NAN], [0.0, 1.0]];
        let dst = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        assert_eq!(Homography::fit(&src, &dst), Err(HomographyError::NonFinite));
    }

    #[test]
    fn singular_matrix_is_rejected() {
        let singular = Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0);
        assert!(Homography::from_matrix(singular).is_err());
    }

    #[test]
    fn points_at_infinity_do_not_project() {
        // w = y - 1 vanishes on the line y = 1.
        let h = Homography::from_matrix(Matrix3::new(
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, -1.0,
        ))
        .unwrap();
        assert!(h.project(3.0, 1.0).is_none());
        assert!(h.project(3.0, 2.0).is_some());
    }

    #[test]
    fn inverse_round_trips_a_point() {
        let h = Homography::from_matrix(Matrix3::new(
            0.005, 0.0, -1.6, 0.0, 0.0, 1.0, 0.0, 0.005, -1.2,
        ))
        .unwrap();
        let ground = h.project(420.0, 340.0).unwrap();
        assert_close(ground, [1.0, 2.0], 1e-9);
        let back = h.inverse().unwrap().project(ground[0], ground[1]).unwrap();
        assert_close(back, [420.0, 340.0], 1e-6);
    }
}
