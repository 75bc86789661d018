//! Homography stage: image pixels → ground plane.

use courtcal_core::{
    CalibError, CalibResult, HomographyMatrix, LengthUnit, Real, ReferenceCorrespondences,
};
use courtcal_linear::HomographySolver;
use courtcal_optim::homography_refine::refine_homography;
use courtcal_optim::{LmBackend, RobustKernel, SolveOptions};
use log::{info, warn};

const MIN_POINTS: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct HomographySolution {
    pub homography: HomographyMatrix,
    /// RMS ground-plane transfer error in the reference unit.
    pub rms: Real,
}

/// Fit the image → ground homography of one camera.
///
/// Only the `(x, y)` part of the world points is used; points off the ground
/// plane are tolerated with a warning. The robust refinement falls back to
/// the linear estimate when it diverges.
pub fn solve_homography(
    refs: &ReferenceCorrespondences,
    unit: LengthUnit,
    kernel: RobustKernel,
    opts: &SolveOptions,
) -> CalibResult<HomographySolution> {
    if refs.len() < MIN_POINTS {
        return Err(CalibError::insufficient("reference points", MIN_POINTS, refs.len()));
    }
    let height = refs.max_height();
    if height > 0.0 {
        warn!(
            "reference points up to {:.3} m off the ground plane; using their ground projection",
            unit.to_meters(height)
        );
    }

    let ground = refs.ground_points();
    let linear = HomographySolver::dlt(&refs.image_points, &ground)?;
    let (h, rms) = match refine_homography(&LmBackend, &refs.image_points, &ground, &linear, kernel, opts) {
        Ok(est) => (est.h, est.rms),
        Err(CalibError::NumericDivergence(reason)) => {
            warn!("homography refinement failed ({reason}); keeping the DLT estimate");
            let errors = HomographySolver::transfer_errors(&linear, &refs.image_points, &ground);
            let rms = (errors.iter().map(|e| e * e).sum::<Real>() / errors.len().max(1) as Real).sqrt();
            (linear, rms)
        }
        Err(err) => return Err(err),
    };
    info!("homography: rms transfer error {:.3} {}", rms, unit.symbol());

    Ok(HomographySolution {
        homography: HomographyMatrix::new(h, unit)?,
        rms,
    })
}
