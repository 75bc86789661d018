//! Comparison of solved camera positions with surveyed ground truth.

use crate::sets::{ExtrinsicSet, GroundTruth};
use courtcal_core::{CalibError, CalibResult, CameraId, Pt3, Real, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary of absolute errors along one axis, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisStats {
    pub mean: Real,
    pub median: Real,
    /// Population standard deviation.
    pub std: Real,
}

impl AxisStats {
    fn from_values(values: &[Real]) -> Self {
        let n = values.len().max(1) as Real;
        let mean = values.iter().sum::<Real>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<Real>() / n;

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let median = match sorted.len() {
            0 => 0.0,
            len if len % 2 == 1 => sorted[len / 2],
            len => 0.5 * (sorted[len / 2 - 1] + sorted[len / 2]),
        };

        Self {
            mean,
            median,
            std: var.sqrt(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionErrors {
    /// Per-camera `|solved - surveyed|` along x, y and z.
    pub per_camera: BTreeMap<CameraId, Vec3>,
    pub x: AxisStats,
    pub y: AxisStats,
    pub z: AxisStats,
}

/// Camera positions in world metres.
pub fn camera_positions(extrinsics: &ExtrinsicSet) -> BTreeMap<CameraId, Pt3> {
    extrinsics
        .iter()
        .map(|(camera, pose)| (camera.clone(), pose.camera_position()))
        .collect()
}

/// Per-axis position errors over the cameras present in both sets.
pub fn evaluate_positions(
    extrinsics: &ExtrinsicSet,
    ground_truth: &GroundTruth,
) -> CalibResult<PositionErrors> {
    let per_camera: BTreeMap<CameraId, Vec3> = extrinsics
        .iter()
        .filter_map(|(camera, pose)| {
            let truth = ground_truth.get(camera)?;
            Some((camera.clone(), (pose.camera_position() - *truth).abs()))
        })
        .collect();
    if per_camera.is_empty() {
        return Err(CalibError::insufficient("cameras with ground truth", 1, 0));
    }

    let axis = |i: usize| {
        let values: Vec<Real> = per_camera.values().map(|e| e[i]).collect();
        AxisStats::from_values(&values)
    };
    Ok(PositionErrors {
        x: axis(0),
        y: axis(1),
        z: axis(2),
        per_camera,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use courtcal_core::{ExtrinsicPose, Mat4};

    fn at(x: Real, y: Real, z: Real) -> ExtrinsicPose {
        let mut m = Mat4::identity();
        m[(0, 3)] = x;
        m[(1, 3)] = y;
        m[(2, 3)] = z;
        ExtrinsicPose::from_matrix(m).unwrap()
    }

    #[test]
    fn statistics_over_common_cameras() {
        let extrinsics: ExtrinsicSet = [
            (CameraId::from("1"), at(1.0, 2.0, 3.0)),
            (CameraId::from("2"), at(0.0, 0.0, 0.0)),
            (CameraId::from("3"), at(5.0, 5.0, 5.0)),
            (CameraId::from("4"), at(9.0, 9.0, 9.0)),
        ]
        .into_iter()
        .collect();
        let truth: GroundTruth = [
            (CameraId::from("1"), Pt3::new(1.1, 2.0, 3.0)),
            (CameraId::from("2"), Pt3::new(-0.3, 0.0, 0.4)),
            (CameraId::from("3"), Pt3::new(5.2, 5.0, 5.0)),
        ]
        .into_iter()
        .collect();

        let e = evaluate_positions(&extrinsics, &truth).unwrap();
        assert_eq!(e.per_camera.len(), 3);
        assert_relative_eq!(e.x.mean, 0.2, epsilon = 1e-12);
        assert_relative_eq!(e.x.median, 0.2, epsilon = 1e-12);
        // population std of {0.1, 0.3, 0.2}
        assert_relative_eq!(e.x.std, (0.02 / 3.0 as Real).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(e.z.median, 0.0, epsilon = 1e-12);
        assert_eq!(camera_positions(&extrinsics)[&CameraId::from("4")], Pt3::new(9.0, 9.0, 9.0));
    }

    #[test]
    fn even_count_median_averages_the_middle() {
        let s = AxisStats::from_values(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(s.median, 2.5);
        assert_eq!(s.mean, 2.5);
    }

    #[test]
    fn no_overlap_is_insufficient() {
        let extrinsics: ExtrinsicSet = [(CameraId::from("1"), at(0.0, 0.0, 0.0))].into_iter().collect();
        assert!(matches!(
            evaluate_positions(&extrinsics, &GroundTruth::new()),
            Err(CalibError::InsufficientData { .. })
        ));
    }
}
