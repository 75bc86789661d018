//! Correspondence containers shared by the solvers.
//!
//! [`Observation`] is one accepted chessboard frame (planar object grid paired
//! with refined image corners). [`ReferenceCorrespondences`] is the manually
//! curated pixel/world set a camera's pose and homography are fitted from.

use crate::{CalibError, CalibResult, Pt2, Pt3};
use serde::{Deserialize, Serialize};

/// A single accepted view of the calibration pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Pattern points in board coordinates (z = 0, unit spacing).
    pub object_points: Vec<Pt3>,
    /// Corresponding refined image corners in pixels.
    pub image_points: Vec<Pt2>,
}

impl Observation {
    pub fn new(object_points: Vec<Pt3>, image_points: Vec<Pt2>) -> CalibResult<Self> {
        if object_points.len() != image_points.len() {
            return Err(CalibError::InvalidInput(format!(
                "object / image point counts must match: {} vs {}",
                object_points.len(),
                image_points.len()
            )));
        }
        Ok(Self {
            object_points,
            image_points,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.object_points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.object_points.is_empty()
    }

    /// Board points projected onto the z = 0 plane.
    pub fn planar_points(&self) -> Vec<Pt2> {
        self.object_points
            .iter()
            .map(|p3| Pt2::new(p3.x, p3.y))
            .collect()
    }
}

/// Image/world point pairs for one camera.
///
/// World points carry the unit they were surveyed in; the solvers convert to
/// metres exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCorrespondences {
    pub image_points: Vec<Pt2>,
    pub world_points: Vec<Pt3>,
}

impl ReferenceCorrespondences {
    pub fn new(image_points: Vec<Pt2>, world_points: Vec<Pt3>) -> CalibResult<Self> {
        if image_points.len() != world_points.len() {
            return Err(CalibError::InvalidInput(format!(
                "image / world point counts must match: {} vs {}",
                image_points.len(),
                world_points.len()
            )));
        }
        Ok(Self {
            image_points,
            world_points,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.image_points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.image_points.is_empty()
    }

    /// Ground-plane `(x, y)` part of the world points.
    pub fn ground_points(&self) -> Vec<Pt2> {
        self.world_points.iter().map(|p| Pt2::new(p.x, p.y)).collect()
    }

    /// Largest `|z|` among the world points.
    pub fn max_height(&self) -> f64 {
        self.world_points
            .iter()
            .map(|p| p.z.abs())
            .fold(0.0, f64::max)
    }
}

/// Summary statistics for reprojection errors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReprojectionStats {
    /// Mean reprojection error in pixels.
    pub mean: f64,
    /// Root mean square error in pixels.
    pub rms: f64,
    /// Maximum reprojection error in pixels.
    pub max: f64,
    /// Number of points evaluated.
    pub count: usize,
}

impl ReprojectionStats {
    /// Compute statistics from a collection of errors.
    pub fn from_errors(errors: &[f64]) -> Self {
        if errors.is_empty() {
            return Self {
                mean: 0.0,
                rms: 0.0,
                max: 0.0,
                count: 0,
            };
        }

        let sum: f64 = errors.iter().sum();
        let sum_sq: f64 = errors.iter().map(|e| e * e).sum();
        let max = errors.iter().cloned().fold(0.0_f64, f64::max);
        let n = errors.len() as f64;

        Self {
            mean: sum / n,
            rms: (sum_sq / n).sqrt(),
            max,
            count: errors.len(),
        }
    }
}
