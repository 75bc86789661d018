use courtcal_core::{CalibError, CalibResult, Intrinsics, Mat3, Real};
use nalgebra::{DMatrix, SVector};

use crate::math::null_vector;

/// Build the 6-vector v_ij(H) as in Zhang's method (0-based column indices).
fn v_ij(hmtx: &Mat3, i: usize, j: usize) -> SVector<Real, 6> {
    let hi = hmtx.column(i);
    let hj = hmtx.column(j);

    SVector::<Real, 6>::from_row_slice(&[
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

/// Estimate camera intrinsics K from a set of plane homographies H_k
/// (board → pixel) using Zhang's closed-form solution with zero skew.
///
/// Requires at least 3 homographies. Pixel coordinates are rescaled to unit
/// magnitude internally so the conic system stays well conditioned for
/// 4K-sized images.
pub fn estimate_intrinsics_from_homographies(hmtxs: &[Mat3]) -> CalibResult<Intrinsics> {
    if hmtxs.len() < 3 {
        return Err(CalibError::insufficient(
            "homographies for intrinsics estimation",
            3,
            hmtxs.len(),
        ));
    }

    // Typical pixel magnitude, from where each board origin lands.
    let scale = hmtxs
        .iter()
        .filter(|h| h[(2, 2)].abs() > Real::EPSILON)
        .map(|h| (h[(0, 2)] / h[(2, 2)]).hypot(h[(1, 2)] / h[(2, 2)]))
        .sum::<Real>()
        / hmtxs.len() as Real;
    let scale = if scale.is_finite() && scale > 1.0 { scale } else { 1.0 };
    let to_unit = Mat3::new(1.0 / scale, 0.0, 0.0, 0.0, 1.0 / scale, 0.0, 0.0, 0.0, 1.0);

    // Zero skew removes B12, leaving b = [B11, B22, B13, B23, B33].
    let m = hmtxs.len();
    let mut vmtx = DMatrix::<Real>::zeros(2 * m, 5);
    for (k, hmtx) in hmtxs.iter().enumerate() {
        let h = to_unit * hmtx;
        let norm = h.norm();
        if norm <= Real::EPSILON || !norm.is_finite() {
            return Err(CalibError::divergence(format!("homography {k} is degenerate")));
        }
        let h = h / norm;

        let v12 = v_ij(&h, 0, 1);
        let vd = v_ij(&h, 0, 0) - v_ij(&h, 1, 1);
        for (col, src) in [0usize, 2, 3, 4, 5].into_iter().enumerate() {
            vmtx[(2 * k, col)] = v12[src];
            vmtx[(2 * k + 1, col)] = vd[src];
        }
    }

    let b = null_vector(vmtx)?;
    let (b11, b22, b13, b23, b33) = (b[0], b[1], b[2], b[3], b[4]);

    // From Zhang's paper with B12 = 0:
    //
    // v0 = -B23 / B22
    // λ  = B33 - (B13^2 + v0 (-B11 B23)) / B11
    // α  = sqrt(λ / B11), β = sqrt(λ B11 / (B11 B22)), u0 = -B13 α^2 / λ
    let denom = b11 * b22;
    let denom_norm = b11 * b11 + b22 * b22;
    if denom_norm <= 0.0 || denom.abs() / denom_norm < 1e-6 {
        return Err(CalibError::divergence(
            "degenerate configuration in intrinsics estimation",
        ));
    }

    let v0 = -b11 * b23 / denom;
    let lambda = b33 - (b13 * b13 + v0 * (-b11 * b23)) / b11;
    let alpha_sq = lambda / b11;
    let beta_sq = lambda * b11 / denom;
    if alpha_sq <= 0.0 || beta_sq <= 0.0 {
        return Err(CalibError::divergence(
            "invalid sign for λ; views do not constrain the intrinsics",
        ));
    }
    let alpha = alpha_sq.sqrt();
    let beta = beta_sq.sqrt();
    let u0 = -b13 * alpha_sq / lambda;

    let intr = Intrinsics {
        fx: alpha * scale,
        fy: beta * scale,
        cx: u0 * scale,
        cy: v0 * scale,
        skew: 0.0,
    };
    if ![intr.fx, intr.fy, intr.cx, intr.cy].iter().all(|v| v.is_finite()) {
        return Err(CalibError::divergence("non-finite intrinsics estimate"));
    }
    Ok(intr)
}
