//! Bundle refinement of camera intrinsics, distortion and per-view board poses.
//!
//! Parameter layout: `[fx, fy, cx, cy, k1, k2, p1, p2, k3]` followed by
//! `[ωx, ωy, ωz, tx, ty, tz]` (axis-angle + translation, board → camera) for
//! every view. Skew is fixed at zero.

use crate::{NllsProblem, NllsSolverBackend, SolveOptions, SolveReport};
use courtcal_core::{
    BrownConrady5, CalibError, CalibResult, IntrinsicModel, Intrinsics, Iso3, Observation, Real,
};
use nalgebra::{DVector, Translation3, UnitQuaternion, Vector3};

const INTRINSIC_DIM: usize = 9;
const POSE_DIM: usize = 6;

/// Non-linear refinement problem for planar intrinsics (and per-view poses).
#[derive(Debug, Clone)]
pub struct PlanarIntrinsicsProblem<'a> {
    views: &'a [Observation],
}

impl<'a> PlanarIntrinsicsProblem<'a> {
    pub fn new(views: &'a [Observation]) -> CalibResult<Self> {
        if views.is_empty() {
            return Err(CalibError::insufficient("calibration views", 1, 0));
        }
        for view in views {
            if view.len() < 4 {
                return Err(CalibError::insufficient("points per view", 4, view.len()));
            }
        }
        Ok(Self { views })
    }

    pub fn num_views(&self) -> usize {
        self.views.len()
    }
}

/// Pack initial intrinsics, distortion and poses into parameter vector.
pub fn pack_params(camera: &IntrinsicModel, poses_board_to_cam: &[Iso3]) -> DVector<Real> {
    let mut x = DVector::zeros(INTRINSIC_DIM + POSE_DIM * poses_board_to_cam.len());

    let k = &camera.k;
    let d = &camera.dist;
    for (i, v) in [k.fx, k.fy, k.cx, k.cy, d.k1, d.k2, d.p1, d.p2, d.k3]
        .into_iter()
        .enumerate()
    {
        x[i] = v;
    }

    for (i, pose) in poses_board_to_cam.iter().enumerate() {
        let idx = INTRINSIC_DIM + POSE_DIM * i;
        let axis_angle = pose.rotation.scaled_axis();
        let t = pose.translation.vector;
        x.fixed_rows_mut::<3>(idx).copy_from(&axis_angle);
        x.fixed_rows_mut::<3>(idx + 3).copy_from(&t);
    }

    x
}

fn decode_camera(x: &DVector<Real>) -> IntrinsicModel {
    IntrinsicModel::new(
        Intrinsics {
            fx: x[0],
            fy: x[1],
            cx: x[2],
            cy: x[3],
            skew: 0.0,
        },
        BrownConrady5 {
            k1: x[4],
            k2: x[5],
            p1: x[6],
            p2: x[7],
            k3: x[8],
        },
    )
}

fn decode_pose(x: &DVector<Real>, view: usize) -> Iso3 {
    let idx = INTRINSIC_DIM + POSE_DIM * view;
    let axis_angle = Vector3::new(x[idx], x[idx + 1], x[idx + 2]);
    let t = Vector3::new(x[idx + 3], x[idx + 4], x[idx + 5]);
    Iso3::from_parts(Translation3::from(t), UnitQuaternion::from_scaled_axis(axis_angle))
}

/// Helper: decode parameter vector into camera + per-view poses.
pub fn decode_params(x: &DVector<Real>, n_views: usize) -> (IntrinsicModel, Vec<Iso3>) {
    let camera = decode_camera(x);
    let poses = (0..n_views).map(|i| decode_pose(x, i)).collect();
    (camera, poses)
}

/// Residuals `observed - projected` for one view, or a large penalty for
/// points that end up behind the camera.
fn view_residuals(camera: &IntrinsicModel, pose: &Iso3, view: &Observation, out: &mut [Real]) {
    for (j, (pw, meas)) in view
        .object_points
        .iter()
        .zip(view.image_points.iter())
        .enumerate()
    {
        let p_cam = pose.transform_point(pw);
        let (dx, dy) = match camera.project(&p_cam) {
            Some(proj) => (meas.x - proj.x, meas.y - proj.y),
            None => (1e6, 1e6),
        };
        out[2 * j] = dx;
        out[2 * j + 1] = dy;
    }
}

impl NllsProblem for PlanarIntrinsicsProblem<'_> {
    fn num_params(&self) -> usize {
        INTRINSIC_DIM + POSE_DIM * self.num_views()
    }

    fn num_residuals(&self) -> usize {
        self.views.iter().map(|v| 2 * v.len()).sum()
    }

    fn residuals_unweighted(&self, x: &DVector<Real>) -> DVector<Real> {
        let camera = decode_camera(x);
        let mut r = DVector::zeros(self.num_residuals());
        let mut offset = 0;
        for (view_idx, view) in self.views.iter().enumerate() {
            let pose = decode_pose(x, view_idx);
            let len = 2 * view.len();
            view_residuals(&camera, &pose, view, &mut r.as_mut_slice()[offset..offset + len]);
            offset += len;
        }
        r
    }
}

/// Output of [`refine_planar_intrinsics`].
#[derive(Debug, Clone)]
pub struct PlanarIntrinsicsEstimate {
    pub camera: IntrinsicModel,
    pub poses: Vec<Iso3>,
    /// Root mean square reprojection error in pixels.
    pub rms: Real,
    pub report: SolveReport,
}

/// High-level API: refine camera intrinsics & per-view poses.
///
/// A solve that does not report convergence or yields non-finite parameters
/// is a [`CalibError::NumericDivergence`].
pub fn refine_planar_intrinsics<B: NllsSolverBackend>(
    backend: &B,
    views: &[Observation],
    initial_camera: &IntrinsicModel,
    initial_poses: &[Iso3],
    opts: &SolveOptions,
) -> CalibResult<PlanarIntrinsicsEstimate> {
    let problem = PlanarIntrinsicsProblem::new(views)?;
    if initial_poses.len() != problem.num_views() {
        return Err(CalibError::InvalidInput(format!(
            "expected {} initial poses, got {}",
            problem.num_views(),
            initial_poses.len()
        )));
    }

    let x0 = pack_params(initial_camera, initial_poses);
    let (x_opt, report) = backend.solve(&problem, x0, opts);
    if x_opt.iter().any(|v| !v.is_finite()) {
        return Err(CalibError::divergence("intrinsics refinement produced non-finite parameters"));
    }
    if !report.converged {
        return Err(CalibError::divergence(format!(
            "intrinsics refinement did not converge after {} evaluations (cost {:.3e})",
            report.iterations, report.final_cost
        )));
    }

    let (camera, poses) = decode_params(&x_opt, problem.num_views());
    if camera.k.fx <= 0.0 || camera.k.fy <= 0.0 {
        return Err(CalibError::divergence("refined focal length is not positive"));
    }

    let r = problem.residuals_unweighted(&x_opt);
    let rms = (r.norm_squared() / (r.len() / 2).max(1) as Real).sqrt();

    Ok(PlanarIntrinsicsEstimate {
        camera,
        poses,
        rms,
        report,
    })
}
