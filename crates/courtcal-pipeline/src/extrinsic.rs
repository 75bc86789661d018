//! Extrinsic stage: camera pose in the world frame from reference points.

use courtcal_core::{
    CalibError, CalibResult, ExtrinsicPose, IntrinsicModel, Iso3, LengthUnit, Pt2, Real,
    ReferenceCorrespondences, Vec3,
};
use courtcal_linear::PnpSolver;
use courtcal_optim::pose_refine::refine_pose;
use courtcal_optim::{LmBackend, SolveOptions};
use log::{info, warn};

const MIN_POINTS: usize = 4;

/// Solved pose of one camera.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtrinsicSolution {
    /// Camera in world, translation in metres.
    pub pose: ExtrinsicPose,
    /// World → camera rotation vector.
    pub rvec: Vec3,
    /// World → camera translation in the reference unit.
    pub tvec: Vec3,
    /// RMS reprojection error in pixels.
    pub rms: Real,
}

/// Solve the camera pose from surveyed `refs` (world side in `unit`).
///
/// Pixels are undistorted with `model` before the linear initialisation; the
/// refinement works on the raw pixels through the full camera model.
pub fn solve_extrinsic(
    model: &IntrinsicModel,
    refs: &ReferenceCorrespondences,
    unit: LengthUnit,
    opts: &SolveOptions,
) -> CalibResult<ExtrinsicSolution> {
    if refs.len() < MIN_POINTS {
        return Err(CalibError::insufficient("reference points", MIN_POINTS, refs.len()));
    }

    let normalized: Vec<Pt2> = refs
        .image_points
        .iter()
        .map(|p| Pt2::from(model.undistort_to_normalized(p)))
        .collect();
    let init = PnpSolver::initial_pose(&refs.world_points, &normalized)?;

    let (pose, rms) = match refine_pose(
        &LmBackend,
        model,
        &refs.world_points,
        &refs.image_points,
        &init,
        opts,
    ) {
        Ok(est) => (est.pose, est.rms),
        Err(CalibError::NumericDivergence(reason)) => {
            warn!("pose refinement failed ({reason}); keeping the linear estimate");
            (init, reprojection_rms(model, refs, &init))
        }
        Err(err) => return Err(err),
    };

    let rvec = pose.rotation.scaled_axis();
    let tvec = pose.translation.vector;
    let extrinsic = ExtrinsicPose::from_solved(&rvec, &tvec, unit)?;
    let c = extrinsic.camera_position();
    info!(
        "pose: camera at ({:.3}, {:.3}, {:.3}) m, rms {:.3} px",
        c.x, c.y, c.z, rms
    );

    Ok(ExtrinsicSolution {
        pose: extrinsic,
        rvec,
        tvec,
        rms,
    })
}

fn reprojection_rms(model: &IntrinsicModel, refs: &ReferenceCorrespondences, pose: &Iso3) -> Real {
    let sum: Real = refs
        .world_points
        .iter()
        .zip(&refs.image_points)
        .map(|(w, p)| match model.project(&pose.transform_point(w)) {
            Some(proj) => (proj - p).norm_squared(),
            None => Real::INFINITY,
        })
        .sum();
    (sum / refs.len().max(1) as Real).sqrt()
}
