//! Homography estimation (plane-induced projective transform).
//!
//! Implements the normalized Direct Linear Transform (DLT). The homography
//! `H` maps **source points** to **destination points**: `x' ~ H x`. Input
//! points should be in consistent units; normalization is applied internally
//! for numerical stability and the output is de-normalized.

use crate::math::{mat3_from_vec, normalize_points_2d, null_vector, spread_ratio_2d};
use courtcal_core::{from_homogeneous, to_homogeneous, CalibError, CalibResult, Mat3, Pt2, Real};
use nalgebra::DMatrix;

/// Minimum `spread_ratio_2d` for a point set to count as non-collinear.
const MIN_SPREAD: Real = 1e-6;

/// High-level entry point for homography estimation.
#[derive(Debug, Clone, Copy)]
pub struct HomographySolver;

/// Estimate `H` such that `dst ~ H src` using normalized DLT.
pub fn dlt_homography(src: &[Pt2], dst: &[Pt2]) -> CalibResult<Mat3> {
    HomographySolver::dlt(src, dst)
}

impl HomographySolver {
    /// Estimate a homography `H` such that `dst ~ H src` using the normalized DLT.
    ///
    /// Fails with [`CalibError::InsufficientData`] for fewer than 4 pairs and
    /// with [`CalibError::NumericDivergence`] for collinear or otherwise
    /// degenerate configurations. The result is scaled so that `H[2,2] == 1`
    /// when possible.
    pub fn dlt(src: &[Pt2], dst: &[Pt2]) -> CalibResult<Mat3> {
        let n = src.len();
        if dst.len() != n {
            return Err(CalibError::InvalidInput(format!(
                "source / destination point counts must match: {} vs {}",
                n,
                dst.len()
            )));
        }
        if n < 4 {
            return Err(CalibError::insufficient("homography correspondences", 4, n));
        }
        if spread_ratio_2d(src) < MIN_SPREAD || spread_ratio_2d(dst) < MIN_SPREAD {
            return Err(CalibError::divergence(
                "collinear correspondences cannot define a homography",
            ));
        }

        let degenerate = || CalibError::divergence("degenerate point configuration for normalization");
        let (src_n, t_s) = normalize_points_2d(src).ok_or_else(degenerate)?;
        let (dst_n, t_d) = normalize_points_2d(dst).ok_or_else(degenerate)?;

        let mut a = DMatrix::<Real>::zeros(2 * n, 9);
        for (i, (ps, pd)) in src_n.iter().zip(dst_n.iter()).enumerate() {
            let (x, y) = (ps.x, ps.y);
            let (u, v) = (pd.x, pd.y);
            let r0 = 2 * i;
            let r1 = 2 * i + 1;

            a[(r0, 0)] = -x;
            a[(r0, 1)] = -y;
            a[(r0, 2)] = -1.0;
            a[(r0, 6)] = u * x;
            a[(r0, 7)] = u * y;
            a[(r0, 8)] = u;

            a[(r1, 3)] = -x;
            a[(r1, 4)] = -y;
            a[(r1, 5)] = -1.0;
            a[(r1, 6)] = v * x;
            a[(r1, 7)] = v * y;
            a[(r1, 8)] = v;
        }

        let h_n = mat3_from_vec(&null_vector(a)?);
        let t_d_inv = t_d
            .try_inverse()
            .ok_or_else(|| CalibError::divergence("normalization transform is singular"))?;
        let mut h = t_d_inv * h_n * t_s;

        let scale = h[(2, 2)];
        if scale.abs() > Real::EPSILON {
            h /= scale;
        }

        if h.iter().any(|v| !v.is_finite()) || h.determinant().abs() <= Real::EPSILON * h.norm().powi(3) {
            return Err(CalibError::divergence("homography fit is singular"));
        }
        Ok(h)
    }

    /// Per-point transfer error `|H src - dst|` in destination units.
    ///
    /// Points mapped to infinity get `f64::INFINITY`.
    pub fn transfer_errors(h: &Mat3, src: &[Pt2], dst: &[Pt2]) -> Vec<Real> {
        src.iter()
            .zip(dst.iter())
            .map(|(s, d)| match from_homogeneous(&(h * to_homogeneous(s))) {
                Some(p) => (p - *d).norm(),
                None => Real::INFINITY,
            })
            .collect()
    }
}
