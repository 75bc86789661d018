//! Single-camera pose refinement against pixel reprojection error.
//!
//! Parameters are `[ωx, ωy, ωz, tx, ty, tz]` for `T_C_W` (world → camera);
//! the intrinsic model stays fixed.

use crate::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
use courtcal_core::{CalibError, CalibResult, IntrinsicModel, Iso3, Pt2, Pt3, Real};
use nalgebra::{DVector, Translation3, UnitQuaternion, Vector3};

/// Reprojection problem for one camera observing known world points.
#[derive(Debug, Clone)]
pub struct PoseRefineProblem<'a> {
    model: &'a IntrinsicModel,
    world: &'a [Pt3],
    pixels: &'a [Pt2],
}

impl<'a> PoseRefineProblem<'a> {
    pub fn new(model: &'a IntrinsicModel, world: &'a [Pt3], pixels: &'a [Pt2]) -> CalibResult<Self> {
        if world.len() != pixels.len() {
            return Err(CalibError::InvalidInput(format!(
                "{} world points but {} pixels",
                world.len(),
                pixels.len()
            )));
        }
        if world.len() < 3 {
            return Err(CalibError::insufficient("pose correspondences", 3, world.len()));
        }
        Ok(Self {
            model,
            world,
            pixels,
        })
    }
}

fn pack_pose(pose: &Iso3) -> DVector<Real> {
    let w = pose.rotation.scaled_axis();
    let t = pose.translation.vector;
    DVector::from_column_slice(&[w.x, w.y, w.z, t.x, t.y, t.z])
}

fn decode_pose(x: &DVector<Real>) -> Iso3 {
    Iso3::from_parts(
        Translation3::new(x[3], x[4], x[5]),
        UnitQuaternion::from_scaled_axis(Vector3::new(x[0], x[1], x[2])),
    )
}

impl NllsProblem for PoseRefineProblem<'_> {
    fn num_params(&self) -> usize {
        6
    }

    fn num_residuals(&self) -> usize {
        2 * self.world.len()
    }

    fn residuals_unweighted(&self, x: &DVector<Real>) -> DVector<Real> {
        let pose = decode_pose(x);
        let mut r = DVector::zeros(self.num_residuals());
        for (i, (pw, meas)) in self.world.iter().zip(self.pixels).enumerate() {
            match self.model.project(&pose.transform_point(pw)) {
                Some(proj) => {
                    r[2 * i] = meas.x - proj.x;
                    r[2 * i + 1] = meas.y - proj.y;
                }
                None => {
                    r[2 * i] = 1e6;
                    r[2 * i + 1] = 1e6;
                }
            }
        }
        r
    }
}

#[derive(Debug, Clone)]
pub struct PoseEstimate {
    /// World → camera.
    pub pose: Iso3,
    /// Root mean square reprojection error in pixels.
    pub rms: Real,
    pub report: SolveReport,
}

/// Refine `T_C_W` starting from `initial`.
pub fn refine_pose<B: NllsSolverBackend>(
    backend: &B,
    model: &IntrinsicModel,
    world: &[Pt3],
    pixels: &[Pt2],
    initial: &Iso3,
    opts: &SolveOptions,
) -> CalibResult<PoseEstimate> {
    let problem = PoseRefineProblem::new(model, world, pixels)?;
    let (x, report) = backend.solve(&problem, pack_pose(initial), opts);
    if x.iter().any(|v| !v.is_finite()) {
        return Err(CalibError::divergence("pose refinement produced non-finite parameters"));
    }
    if !report.converged {
        return Err(CalibError::divergence(format!(
            "pose refinement did not converge (cost {:.3e})",
            report.final_cost
        )));
    }
    let r = problem.residuals_unweighted(&x);
    let rms = (r.norm_squared() / world.len() as Real).sqrt();
    Ok(PoseEstimate {
        pose: decode_pose(&x),
        rms,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmBackend;
    use courtcal_core::synthetic::{court_camera, project_points};
    use courtcal_core::BrownConrady5;

    fn scene() -> (IntrinsicModel, Iso3, Vec<Pt3>) {
        let model = court_camera(BrownConrady5 {
            k1: -0.1,
            k2: 0.02,
            ..Default::default()
        });
        let pose = Iso3::from_parts(
            Translation3::new(-5.0, 2.0, 20.0),
            UnitQuaternion::from_euler_angles(-1.1, 0.05, 0.2),
        );
        let world = vec![
            Pt3::new(0.0, 0.0, 0.0),
            Pt3::new(10.0, 0.0, 0.0),
            Pt3::new(10.0, 6.0, 0.0),
            Pt3::new(0.0, 6.0, 0.0),
            Pt3::new(5.0, 3.0, 0.0),
            Pt3::new(5.0, 3.0, 2.4),
            Pt3::new(2.0, 5.0, 0.0),
        ];
        (model, pose, world)
    }

    #[test]
    fn perturbed_pose_converges_to_truth() {
        let (model, gt, world) = scene();
        let pixels = project_points(&model, &gt, &world).unwrap();

        let init = Iso3::from_parts(
            Translation3::new(-4.7, 2.3, 19.2),
            UnitQuaternion::from_euler_angles(-1.05, 0.02, 0.23),
        );
        let est = refine_pose(&LmBackend, &model, &world, &pixels, &init, &SolveOptions::default())
            .unwrap();

        assert!((est.pose.translation.vector - gt.translation.vector).norm() < 1e-6);
        assert!(est.pose.rotation.angle_to(&gt.rotation) < 1e-8);
        assert!(est.rms < 1e-6);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let (model, _, world) = scene();
        let pixels = vec![Pt2::origin(); 2];
        assert!(matches!(
            PoseRefineProblem::new(&model, &world, &pixels),
            Err(CalibError::InvalidInput(_))
        ));
    }
}
