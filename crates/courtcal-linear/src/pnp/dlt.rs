//! Direct Linear Transform (DLT) solver for camera pose estimation.
//!
//! Provides a linear least-squares solution to the PnP problem using
//! homogeneous equations. The rotation matrix is projected onto SO(3)
//! via SVD decomposition.

use crate::math::{mat34_from_vec, normalize_points_3d, null_vector};
use crate::planar_pose::nearest_rotation;
use courtcal_core::{CalibError, CalibResult, Iso3, Pt2, Pt3, Real};
use nalgebra::{DMatrix, Rotation3, Translation3, UnitQuaternion};

/// Direct linear PnP on all input points.
///
/// `world` are 3D points in world coordinates, `normalized` their ideal
/// normalised image coordinates. Returns `T_C_W`.
pub fn dlt(world: &[Pt3], normalized: &[Pt2]) -> CalibResult<Iso3> {
    let n = world.len();
    if normalized.len() != n {
        return Err(CalibError::InvalidInput(format!(
            "world / image point counts must match: {} vs {}",
            n,
            normalized.len()
        )));
    }
    if n < 6 {
        return Err(CalibError::insufficient("DLT PnP correspondences", 6, n));
    }

    let (world_n, t_world) = normalize_points_3d(world)
        .ok_or_else(|| CalibError::divergence("degenerate 3d point configuration for normalization"))?;

    // Build 2n x 12 DLT matrix for camera matrix P = [R | t] in normalized coords.
    let mut a = DMatrix::<Real>::zeros(2 * n, 12);
    for (i, (pw, pi)) in world_n.iter().zip(normalized.iter()).enumerate() {
        let (x, y, z) = (pw.x, pw.y, pw.z);
        let (u, v) = (pi.x, pi.y);
        let r0 = 2 * i;
        let r1 = 2 * i + 1;

        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = z;
        a[(r0, 3)] = 1.0;
        a[(r0, 8)] = -u * x;
        a[(r0, 9)] = -u * y;
        a[(r0, 10)] = -u * z;
        a[(r0, 11)] = -u;

        a[(r1, 4)] = x;
        a[(r1, 5)] = y;
        a[(r1, 6)] = z;
        a[(r1, 7)] = 1.0;
        a[(r1, 8)] = -v * x;
        a[(r1, 9)] = -v * y;
        a[(r1, 10)] = -v * z;
        a[(r1, 11)] = -v;
    }

    // De-normalize 3D points: P = P_norm * T_world.
    let p_mtx = mat34_from_vec(&null_vector(a)?) * t_world;

    let mut r_approx = p_mtx.fixed_view::<3, 3>(0, 0).into_owned();

    // Normalise scale using average row norm.
    let mut s = (r_approx.row(0).norm() + r_approx.row(1).norm() + r_approx.row(2).norm()) / 3.0;
    if r_approx.determinant() < 0.0 {
        s = -s;
    }
    if s.abs() <= Real::EPSILON || !s.is_finite() {
        return Err(CalibError::divergence("PnP DLT produced a degenerate camera matrix"));
    }
    r_approx /= s;

    let r_orth = nearest_rotation(&r_approx)?;
    let t = p_mtx.column(3) / s;

    let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r_orth));
    Ok(Iso3::from_parts(Translation3::from(t), rot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pnp::test_support::*;
    use nalgebra::{Rotation3, Translation3};

    #[test]
    fn dlt_recovers_pose_synthetic() {
        let rot = Rotation3::from_euler_angles(0.1, -0.05, 0.2);
        let iso_gt = Iso3::from_parts(Translation3::new(0.1, -0.05, 1.0), rot.into());

        let mut world = Vec::new();
        for z in 0..2 {
            for y in 0..3 {
                for x in 0..4 {
                    world.push(Pt3::new(x as Real * 0.1, y as Real * 0.1, 0.5 + z as Real * 0.1));
                }
            }
        }
        let image = project_normalized(&iso_gt, &world);

        let est = dlt(&world, &image).unwrap();
        let (dt, ang) = pose_errors(&est, &iso_gt);
        assert!(dt < 1e-3, "translation error too large: {}", dt);
        assert!(ang < 1e-3, "rotation error too large: {}", ang);
    }
}
