//! Intrinsic stage: chessboard views → camera matrix and distortion.
//!
//! Linear initialisation (per-view DLT homographies, Zhang's closed form,
//! pose decomposition) followed by a bundle refinement of intrinsics,
//! distortion and every board pose.

use crate::PipelineConfig;
use courtcal_core::{CalibError, CalibResult, ImageSize, IntrinsicModel, Observation, Real};
use courtcal_detect::{collect_observations, ChessboardFinder, FrameSource, PatternSize};
use courtcal_linear::{
    estimate_intrinsics_from_homographies, estimate_planar_pose_from_h,
    optimal_new_camera_matrix, HomographySolver, RefinedCameraMatrix,
};
use courtcal_optim::planar_intrinsics::refine_planar_intrinsics;
use courtcal_optim::{LmBackend, SolveOptions};
use log::{debug, info, warn};

/// Fewer views than this leave Zhang's system underdetermined.
///
/// This is the numerical floor only. How many views a camera must collect
/// before it is calibrated at all (ten by default) is
/// [`CollectionPolicy::min_count`](courtcal_detect::CollectionPolicy::min_count),
/// enforced by [`calibrate_camera_from_frames`].
const MIN_VIEWS: usize = 3;

/// Result of the intrinsic stage for one camera.
#[derive(Debug, Clone)]
pub struct IntrinsicCalibration {
    pub model: IntrinsicModel,
    /// Advisory camera matrix for undistorted frames; not used downstream.
    pub refined: RefinedCameraMatrix,
    /// RMS reprojection error in pixels.
    pub rms: Real,
    pub view_count: usize,
    pub image_size: ImageSize,
}

/// Calibrate from already detected views of a planar pattern.
///
/// Accepts any set of at least three views; callers that scan frames should
/// go through [`calibrate_camera_from_frames`] so the collection minimum
/// applies.
pub fn calibrate_intrinsics(
    views: &[Observation],
    image_size: ImageSize,
    alpha: Real,
    opts: &SolveOptions,
) -> CalibResult<IntrinsicCalibration> {
    if views.len() < MIN_VIEWS {
        return Err(CalibError::insufficient("chessboard views", MIN_VIEWS, views.len()));
    }

    let homographies = views
        .iter()
        .map(|v| HomographySolver::dlt(&v.planar_points(), &v.image_points))
        .collect::<CalibResult<Vec<_>>>()?;

    let k_init = estimate_intrinsics_from_homographies(&homographies)?;
    debug!(
        "linear init: fx={:.1} fy={:.1} cx={:.1} cy={:.1}",
        k_init.fx, k_init.fy, k_init.cx, k_init.cy
    );
    let k_matrix = k_init.k_matrix();
    let poses = homographies
        .iter()
        .map(|h| estimate_planar_pose_from_h(&k_matrix, h))
        .collect::<CalibResult<Vec<_>>>()?;

    let init = IntrinsicModel::new(k_init, Default::default());
    let est = refine_planar_intrinsics(&LmBackend, views, &init, &poses, opts)?;
    info!(
        "intrinsics: fx={:.2} fy={:.2} cx={:.2} cy={:.2}, rms {:.4} px over {} views",
        est.camera.k.fx,
        est.camera.k.fy,
        est.camera.k.cx,
        est.camera.k.cy,
        est.rms,
        views.len()
    );

    // advisory output: never fails a camera whose fit succeeded
    let refined = optimal_new_camera_matrix(&est.camera, image_size, alpha, image_size)
        .unwrap_or_else(|err| {
            warn!("refined camera matrix skipped: {err}");
            RefinedCameraMatrix::unchanged(&est.camera, image_size)
        });

    Ok(IntrinsicCalibration {
        model: est.camera,
        refined,
        rms: est.rms,
        view_count: views.len(),
        image_size,
    })
}

/// Detect `pattern` in `frames` under the configured collection policy and
/// calibrate from the accepted views.
pub fn calibrate_camera_from_frames<S, F>(
    frames: &S,
    pattern: PatternSize,
    finder: &F,
    config: &PipelineConfig,
) -> CalibResult<IntrinsicCalibration>
where
    S: FrameSource + ?Sized,
    F: ChessboardFinder + ?Sized,
{
    let views = collect_observations(frames, pattern, finder, &config.collection, &config.subpix)?;
    let first = frames.frame(0)?;
    let size = ImageSize::new(first.width(), first.height());
    calibrate_intrinsics(&views, size, config.alpha, &config.intrinsic_solve)
}
