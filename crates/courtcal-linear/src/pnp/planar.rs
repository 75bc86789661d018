use courtcal_core::{CalibError, CalibResult, Iso3, Mat3, Pt2, Pt3};
use nalgebra::{Rotation3, Translation3, UnitQuaternion};

use crate::{math::PlaneFit, HomographySolver, PlanarPoseSolver};

/// Plane-induced PnP on normalised image points.
///
/// Fits a plane to the world points, estimates the homography from in-plane
/// coordinates to the normalised image and decomposes it with `K = I`. Exact
/// for coplanar points; a starting guess otherwise.
pub fn planar(world: &[Pt3], normalized: &[Pt2]) -> CalibResult<Iso3> {
    let n = world.len();
    if n < 4 || normalized.len() != n {
        return Err(CalibError::insufficient("PnP correspondences", 4, n.min(normalized.len())));
    }

    let fit = PlaneFit::fit(world).ok_or_else(|| CalibError::divergence("world points coincide"))?;
    let plane_points: Vec<Pt2> = world
        .iter()
        .map(|p| {
            let q = fit.to_plane(p);
            Pt2::new(q.x, q.y)
        })
        .collect();

    let h = HomographySolver::dlt(&plane_points, normalized)?;
    let cam_from_plane = PlanarPoseSolver::from_homography(&Mat3::identity(), &h)?;

    let r_pw = fit.rotation();
    let plane_from_world = Iso3::from_parts(
        Translation3::from(-(r_pw * fit.centroid.coords)),
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r_pw)),
    );
    Ok(cam_from_plane * plane_from_world)
}
