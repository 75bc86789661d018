use courtcal_core::{CalibError, CalibResult, Iso3, Mat3, Real, Vec3};
use nalgebra::{Rotation3, Translation3, UnitQuaternion};

/// Linear pose initialisation from a homography and intrinsics.
///
/// This implements the classic decomposition of a plane-induced homography
/// `H` into a rotation and translation, assuming the target lies on the plane
/// `Z = 0` in its own coordinates.
#[derive(Debug, Clone, Copy)]
pub struct PlanarPoseSolver;

/// Estimate pose of a planar board (Z=0) relative to camera, given intrinsics K
/// and homography H (plane -> image).
///
/// Returns an Iso3 that maps board coordinates into camera coordinates.
pub fn estimate_planar_pose_from_h(kmtx: &Mat3, hmtx: &Mat3) -> CalibResult<Iso3> {
    PlanarPoseSolver::from_homography(kmtx, hmtx)
}

impl PlanarPoseSolver {
    /// Decompose a homography into a pose `T_C_B` given intrinsics `K`.
    ///
    /// The overall sign of `H` is free; it is chosen so the board lies in
    /// front of the camera.
    pub fn from_homography(kmtx: &Mat3, hmtx: &Mat3) -> CalibResult<Iso3> {
        let k_inv = kmtx
            .try_inverse()
            .ok_or_else(|| CalibError::divergence("camera matrix is not invertible"))?;

        let k_inv_h1 = k_inv * hmtx.column(0);
        let k_inv_h2 = k_inv * hmtx.column(1);
        let k_inv_h3 = k_inv * hmtx.column(2);

        // Scale factor λ: normalize first two columns (average for robustness)
        let mean_norm = (k_inv_h1.norm() + k_inv_h2.norm()) * 0.5;
        if mean_norm <= Real::EPSILON || !mean_norm.is_finite() {
            return Err(CalibError::divergence("homography has degenerate columns"));
        }
        let mut lambda = 1.0 / mean_norm;
        if k_inv_h3.z * lambda < 0.0 {
            lambda = -lambda;
        }

        let r1 = lambda * k_inv_h1;
        let r2 = lambda * k_inv_h2;
        let r3 = r1.cross(&r2);
        let r_mat = Mat3::from_columns(&[r1, r2, r3]);

        let r_orth = nearest_rotation(&r_mat)?;
        let t: Vec3 = lambda * k_inv_h3;

        let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r_orth));
        Ok(Iso3::from_parts(Translation3::from(t), rot))
    }
}

/// Project a 3×3 matrix onto SO(3) (polar decomposition via SVD).
pub fn nearest_rotation(m: &Mat3) -> CalibResult<Mat3> {
    let svd = m.svd(true, true);
    let u = svd
        .u
        .ok_or_else(|| CalibError::divergence("svd failed"))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| CalibError::divergence("svd failed"))?;
    let r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        Ok(u_flipped * v_t)
    } else {
        Ok(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courtcal_core::Intrinsics;
    use nalgebra::{Isometry3, Rotation3, Vector3};

    fn make_kmtx() -> Mat3 {
        Intrinsics {
            fx: 800.0,
            fy: 780.0,
            cx: 640.0,
            cy: 360.0,
            skew: 0.0,
        }
        .k_matrix()
    }

    fn homography_for(kmtx: &Mat3, iso: &Iso3) -> Mat3 {
        // For a plane Z=0, homography is H = K [r1 r2 t]
        let r_mat = iso.rotation.to_rotation_matrix().into_inner();
        let mut hmtx = Mat3::zeros();
        hmtx.set_column(0, &(kmtx * r_mat.column(0)));
        hmtx.set_column(1, &(kmtx * r_mat.column(1)));
        hmtx.set_column(2, &(kmtx * iso.translation.vector));
        hmtx
    }

    #[test]
    fn planar_pose_from_h_recovers_pose() {
        let kmtx = make_kmtx();
        let rot = Rotation3::from_euler_angles(0.1, -0.05, 0.2);
        let t = Vector3::new(0.1, -0.05, 1.0);
        let iso_gt = Isometry3::from_parts(Translation3::from(t), rot.into());

        // An arbitrary negative scale must not flip the board behind the camera.
        let hmtx = homography_for(&kmtx, &iso_gt) * -3.0;
        let iso_est = estimate_planar_pose_from_h(&kmtx, &hmtx).unwrap();

        assert!((iso_est.translation.vector - t).norm() < 1e-9);
        let angle = iso_est.rotation.angle_to(&iso_gt.rotation);
        assert!(angle < 1e-9, "rotation error too large: {}", angle);
    }
}
