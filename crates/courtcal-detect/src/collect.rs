//! Frame scanning with a skip-ahead policy.

use crate::{refine_corners_subpix, ChessboardFinder, PatternSize, SubPixParams};
use courtcal_core::{CalibError, CalibResult, Observation};
use image::GrayImage;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Ordered, random-access grayscale frames of one camera.
pub trait FrameSource {
    fn frame_count(&self) -> usize;
    fn frame(&self, index: usize) -> CalibResult<GrayImage>;
}

impl FrameSource for [GrayImage] {
    fn frame_count(&self) -> usize {
        self.len()
    }

    fn frame(&self, index: usize) -> CalibResult<GrayImage> {
        self.get(index).cloned().ok_or_else(|| CalibError::FrameUnavailable {
            index,
            reason: format!("only {} frames", self.len()),
        })
    }
}

impl FrameSource for Vec<GrayImage> {
    fn frame_count(&self) -> usize {
        self.as_slice().frame_count()
    }

    fn frame(&self, index: usize) -> CalibResult<GrayImage> {
        self.as_slice().frame(index)
    }
}

/// How far to jump after each frame and when to stop collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionPolicy {
    pub stride_on_success: usize,
    pub stride_on_failure: usize,
    /// Stop scanning once this many views are accepted.
    pub target_count: usize,
    /// Fewer accepted views than this is an error.
    pub min_count: usize,
}

impl CollectionPolicy {
    /// Take consecutive frames once the board is found.
    pub const fn quick() -> Self {
        Self {
            stride_on_success: 1,
            stride_on_failure: 5,
            target_count: 10,
            min_count: 10,
        }
    }

    /// Spread accepted views over the sequence.
    pub const fn spanning() -> Self {
        Self {
            stride_on_success: 5,
            ..Self::quick()
        }
    }
}

impl Default for CollectionPolicy {
    fn default() -> Self {
        Self::quick()
    }
}

/// Scan `frames` in order and return refined observations of `pattern`.
///
/// A frame that cannot be read ends the scan like the end of the sequence.
pub fn collect_observations<S, F>(
    frames: &S,
    pattern: PatternSize,
    finder: &F,
    policy: &CollectionPolicy,
    subpix: &SubPixParams,
) -> CalibResult<Vec<Observation>>
where
    S: FrameSource + ?Sized,
    F: ChessboardFinder + ?Sized,
{
    pattern.validate()?;
    let object_points = pattern.object_points();
    let total = frames.frame_count();
    let mut accepted = Vec::new();
    let mut index = 0;

    while index < total && accepted.len() < policy.target_count {
        let image = match frames.frame(index) {
            Ok(image) => image,
            Err(err) => {
                warn!("stopping frame scan: {err}");
                break;
            }
        };
        match finder.find(&image, pattern) {
            Some(corners) => {
                let refined = refine_corners_subpix(&image, &corners, subpix);
                accepted.push(Observation::new(object_points.clone(), refined)?);
                debug!("frame {index}: accepted ({} so far)", accepted.len());
                index += policy.stride_on_success.max(1);
            }
            None => {
                debug!("frame {index}: no {}x{} board", pattern.per_row, pattern.rows);
                index += policy.stride_on_failure.max(1);
            }
        }
    }

    info!("accepted {} of {} frames", accepted.len(), total);
    if accepted.len() < policy.min_count {
        return Err(CalibError::insufficient(
            "chessboard views",
            policy.min_count,
            accepted.len(),
        ));
    }
    Ok(accepted)
}
