//! Perspective-n-Point (PnP) solvers for camera pose estimation.
//!
//! Includes:
//! - DLT (linear) pose estimation with normalization, for 6+ points in
//!   general position.
//! - Plane-induced initialisation for coplanar (or nearly coplanar) sets and
//!   for the 4-5 point case the DLT cannot handle.
//!
//! Image points are **ideal normalised coordinates** (distortion removed,
//! `K⁻¹` applied). All methods estimate a pose `T_C_W`: transform from world
//! coordinates into the camera frame.

use courtcal_core::{CalibError, CalibResult, Iso3, Pt2, Pt3, Real};
use log::debug;

use crate::math::PlaneFit;

mod dlt;
mod planar;

pub use dlt::dlt;
pub use planar::planar;

/// Below this in-plane spread ratio the world points count as collinear.
const MIN_SPREAD: Real = 1e-6;
/// Below this out-of-plane ratio the world points count as coplanar.
const MAX_FLATNESS: Real = 1e-3;

/// Linear PnP solver for camera pose estimation.
#[derive(Debug, Clone, Copy)]
pub struct PnpSolver;

impl PnpSolver {
    /// Direct linear PnP on all points (needs at least 6, not coplanar).
    pub fn dlt(world: &[Pt3], normalized: &[Pt2]) -> CalibResult<Iso3> {
        dlt::dlt(world, normalized)
    }

    /// Pose from the homography between the best-fit world plane and the
    /// normalised image.
    pub fn planar(world: &[Pt3], normalized: &[Pt2]) -> CalibResult<Iso3> {
        planar::planar(world, normalized)
    }

    /// Pick the initialiser suited to the point configuration.
    ///
    /// Fails with [`CalibError::InsufficientData`] below 4 points and with
    /// [`CalibError::NumericDivergence`] for collinear world points.
    pub fn initial_pose(world: &[Pt3], normalized: &[Pt2]) -> CalibResult<Iso3> {
        let n = world.len();
        if normalized.len() != n {
            return Err(CalibError::InvalidInput(format!(
                "world / image point counts must match: {} vs {}",
                n,
                normalized.len()
            )));
        }
        if n < 4 {
            return Err(CalibError::insufficient("PnP correspondences", 4, n));
        }
        let fit = PlaneFit::fit(world)
            .ok_or_else(|| CalibError::divergence("world points coincide"))?;
        if fit.spread < MIN_SPREAD {
            return Err(CalibError::divergence("world points are collinear"));
        }

        if fit.flatness < MAX_FLATNESS || n < 6 {
            debug!(
                "pnp init: plane-induced (n={n}, flatness={:.2e})",
                fit.flatness
            );
            return planar::planar(world, normalized);
        }

        match dlt::dlt(world, normalized) {
            Ok(pose) => Ok(pose),
            Err(err) => {
                debug!("pnp init: DLT failed ({err}), falling back to plane-induced");
                planar::planar(world, normalized)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use courtcal_core::{Iso3, Pt2, Pt3};

    /// Ideal normalised projections of `world` through `pose`.
    pub fn project_normalized(pose: &Iso3, world: &[Pt3]) -> Vec<Pt2> {
        world
            .iter()
            .map(|p| {
                let c = pose.transform_point(p);
                Pt2::new(c.x / c.z, c.y / c.z)
            })
            .collect()
    }

    pub fn pose_errors(est: &Iso3, gt: &Iso3) -> (f64, f64) {
        let dt = (est.translation.vector - gt.translation.vector).norm();
        (dt, est.rotation.angle_to(&gt.rotation))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use nalgebra::{Rotation3, Translation3};

    #[test]
    fn rejects_three_points() {
        let world = vec![
            Pt3::new(0.0, 0.0, 0.0),
            Pt3::new(1.0, 0.0, 0.0),
            Pt3::new(0.0, 1.0, 0.0),
        ];
        let image = vec![Pt2::new(0.0, 0.0); 3];
        assert!(matches!(
            PnpSolver::initial_pose(&world, &image),
            Err(CalibError::InsufficientData { needed: 4, got: 3, .. })
        ));
    }

    #[test]
    fn rejects_collinear_world_points() {
        let world: Vec<Pt3> = (0..5).map(|i| Pt3::new(i as f64, 0.0, 0.0)).collect();
        let image: Vec<Pt2> = (0..5).map(|i| Pt2::new(i as f64 * 0.1, 0.0)).collect();
        assert!(matches!(
            PnpSolver::initial_pose(&world, &image),
            Err(CalibError::NumericDivergence(_))
        ));
    }

    #[test]
    fn four_coplanar_points_recover_pose() {
        let gt = Iso3::from_parts(
            Translation3::new(-2.0, 1.0, 9.0),
            Rotation3::from_euler_angles(-2.2, 0.1, 0.3).into(),
        );
        let world = vec![
            Pt3::new(0.0, 0.0, 0.0),
            Pt3::new(4.0, 0.0, 0.0),
            Pt3::new(4.0, 3.0, 0.0),
            Pt3::new(0.0, 3.0, 0.0),
        ];
        let image = project_normalized(&gt, &world);
        let est = PnpSolver::initial_pose(&world, &image).unwrap();
        let (dt, dr) = pose_errors(&est, &gt);
        assert!(dt < 1e-6, "translation error {dt}");
        assert!(dr < 1e-6, "rotation error {dr}");
    }
}
