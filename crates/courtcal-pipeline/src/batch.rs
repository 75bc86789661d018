//! Per-camera batch drivers.
//!
//! A failure is fatal for its camera only; the driver logs it, records it in
//! the report and moves on.

use crate::extrinsic::{solve_extrinsic, ExtrinsicSolution};
use crate::homography::{solve_homography, HomographySolution};
use crate::intrinsic::{calibrate_camera_from_frames, IntrinsicCalibration};
use crate::sets::{CameraSet, IntrinsicSet, ReferenceSet};
use crate::PipelineConfig;
use courtcal_core::{CalibError, CalibResult, CameraId};
use courtcal_detect::FrameSource;
use log::{info, warn};
use std::collections::BTreeMap;

/// Outcome of running one stage over a camera list.
#[derive(Debug, Clone)]
pub struct BatchReport<T> {
    pub succeeded: CameraSet<T>,
    pub failed: BTreeMap<CameraId, CalibError>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            succeeded: CameraSet::new(),
            failed: BTreeMap::new(),
        }
    }
}

impl<T> BatchReport<T> {
    /// True when every requested camera succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> BatchReport<U> {
        BatchReport {
            succeeded: self.succeeded.map(f),
            failed: self.failed.clone(),
        }
    }
}

/// Run `solve` for each camera in order.
pub fn run_per_camera<T, F>(stage: &str, cameras: &[CameraId], mut solve: F) -> BatchReport<T>
where
    F: FnMut(&CameraId) -> CalibResult<T>,
{
    let mut report = BatchReport::default();
    for camera in cameras {
        info!("{stage}: camera {camera}");
        match solve(camera) {
            Ok(value) => {
                report.succeeded.insert(camera.clone(), value);
            }
            Err(err) => {
                warn!("{stage}: camera {camera} failed: {err}");
                report.failed.insert(camera.clone(), err);
            }
        }
    }
    info!(
        "{stage}: {} succeeded, {} failed",
        report.succeeded.len(),
        report.failed.len()
    );
    report
}

/// Intrinsic stage over every configured camera. `open` yields the frame
/// source of a camera.
pub fn run_intrinsic_stage<S, O>(config: &PipelineConfig, mut open: O) -> BatchReport<IntrinsicCalibration>
where
    S: FrameSource,
    O: FnMut(&CameraId) -> CalibResult<S>,
{
    run_per_camera("intrinsic", &config.cameras, |camera| {
        let frames = open(camera)?;
        calibrate_camera_from_frames(&frames, config.pattern_for(camera), &config.finder, config)
    })
}

pub fn run_extrinsic_stage(
    config: &PipelineConfig,
    intrinsics: &IntrinsicSet,
    references: &ReferenceSet,
) -> BatchReport<ExtrinsicSolution> {
    run_per_camera("extrinsic", &config.cameras, |camera| {
        let model = intrinsics.require(camera, "intrinsic.json")?;
        let refs = references.require(camera, "extrinsic_image_points.json")?;
        solve_extrinsic(model, refs, config.world_unit, &config.pose_solve)
    })
}

pub fn run_homography_stage(
    config: &PipelineConfig,
    references: &ReferenceSet,
) -> BatchReport<HomographySolution> {
    run_per_camera("homography", &config.cameras, |camera| {
        let refs = references.require(camera, "extrinsic_image_points.json")?;
        solve_homography(refs, config.world_unit, config.homography_kernel, &config.homography_solve)
    })
}
