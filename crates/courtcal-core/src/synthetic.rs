//! Deterministic synthetic data generation helpers.
//!
//! Small building blocks for synthetic calibration problems used in tests:
//! planar grids, board poses, projection into an [`IntrinsicModel`] and
//! seeded pixel noise that is stable across platforms.

use crate::{Intrinsics, IntrinsicModel, Iso3, Observation, Pt2, Pt3, Real, Vec2};
use anyhow::Result;
use nalgebra::{Translation3, UnitQuaternion, Vector3};

/// Generate a planar grid of 3D points (Z=0) with `nx * ny` points.
///
/// Points are ordered deterministically in row-major order (Y major):
/// `(x = 0..nx-1, y = 0..ny-1)`.
pub fn grid_points(nx: usize, ny: usize, spacing: Real) -> Vec<Pt3> {
    let mut points = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            points.push(Pt3::new(i as Real * spacing, j as Real * spacing, 0.0));
        }
    }
    points
}

/// A 3840×2160 camera with a mild wide-angle focal length.
pub fn court_camera(dist: crate::BrownConrady5) -> IntrinsicModel {
    IntrinsicModel::new(
        Intrinsics {
            fx: 2000.0,
            fy: 2000.0,
            cx: 1920.0,
            cy: 1080.0,
            skew: 0.0,
        },
        dist,
    )
}

/// `n_views` board poses (board → camera) that tilt the board around both
/// in-plane axes while keeping it centred in front of the camera.
///
/// The board is assumed to span `board_w × board_h` units; it is centred on
/// the optical axis at `distance`.
pub fn board_poses(n_views: usize, board_w: Real, board_h: Real, distance: Real) -> Vec<Iso3> {
    (0..n_views)
        .map(|i| {
            let phase = i as Real * std::f64::consts::TAU / n_views.max(1) as Real;
            let tilt_x = 0.35 * phase.sin();
            let tilt_y = 0.35 * phase.cos();
            let roll = 0.1 * (i as Real - n_views as Real * 0.5) / n_views.max(1) as Real;
            let rotation = UnitQuaternion::from_euler_angles(tilt_x, tilt_y, roll);
            let centre = rotation * Vector3::new(board_w * 0.5, board_h * 0.5, 0.0);
            let shift = Vector3::new(
                0.15 * distance * phase.cos(),
                0.1 * distance * phase.sin(),
                distance * (1.0 + 0.1 * (i % 3) as Real),
            );
            Iso3::from_parts(Translation3::from(shift - centre), rotation)
        })
        .collect()
}

/// Project a planar target into the camera, requiring every point to be projectable.
///
/// `cam_from_board` must map board-frame points into the camera frame.
pub fn project_view(
    camera: &IntrinsicModel,
    cam_from_board: &Iso3,
    board: &[Pt3],
) -> Result<Observation> {
    let mut pixels = Vec::with_capacity(board.len());
    for (idx, pw) in board.iter().enumerate() {
        let pc = cam_from_board.transform_point(pw);
        let Some(uv) = camera.project(&pc) else {
            anyhow::bail!("point {idx} not projectable (z={:.6})", pc.z);
        };
        pixels.push(uv);
    }
    Ok(Observation::new(board.to_vec(), pixels)?)
}

/// Project `points` (world frame) through a camera at `cam_from_world`.
pub fn project_points(
    camera: &IntrinsicModel,
    cam_from_world: &Iso3,
    points: &[Pt3],
) -> Result<Vec<Pt2>> {
    Ok(project_view(camera, cam_from_world, points)?.image_points)
}

/// Seeded uniform pixel noise in `[-max_abs_px, max_abs_px]` per axis.
///
/// Each `(view, point)` pair draws from its own splitmix64 stream, so adding
/// views never shifts the noise of earlier ones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelNoise {
    pub seed: u64,
    pub max_abs_px: Real,
}

impl PixelNoise {
    pub fn sample(&self, view: usize, point: usize) -> Vec2 {
        let key = self.seed
            ^ (view as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
            ^ (point as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        let u = unit(splitmix64(key));
        let v = unit(splitmix64(key ^ 0x94D0_49BB_1331_11EB));
        Vec2::new(u - 0.5, v - 0.5) * (2.0 * self.max_abs_px.abs())
    }

    /// Copy of `views` with every image point perturbed.
    pub fn apply(&self, views: &[Observation]) -> Vec<Observation> {
        views
            .iter()
            .enumerate()
            .map(|(vi, view)| Observation {
                image_points: view
                    .image_points
                    .iter()
                    .enumerate()
                    .map(|(pi, p)| *p + self.sample(vi, pi))
                    .collect(),
                ..view.clone()
            })
            .collect()
    }
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Top 53 bits as a double in `[0, 1)`.
fn unit(x: u64) -> Real {
    (x >> 11) as Real / (1u64 << 53) as Real
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BrownConrady5;

    #[test]
    fn grid_points_order_is_stable() {
        let pts = grid_points(2, 3, 0.5);
        assert_eq!(pts.len(), 6);
        assert_eq!(pts[0], Pt3::new(0.0, 0.0, 0.0));
        assert_eq!(pts[1], Pt3::new(0.5, 0.0, 0.0));
        assert_eq!(pts[2], Pt3::new(0.0, 0.5, 0.0));
    }

    #[test]
    fn board_poses_stay_in_frame() {
        let cam = court_camera(BrownConrady5::default());
        let board = grid_points(7, 5, 1.0);
        for pose in board_poses(10, 6.0, 4.0, 12.0) {
            let view = project_view(&cam, &pose, &board).unwrap();
            for p in &view.image_points {
                assert!(p.x > 0.0 && p.x < 3840.0 && p.y > 0.0 && p.y < 2160.0, "{p}");
            }
        }
    }

    #[test]
    fn pixel_noise_is_seeded_and_bounded() {
        let noise = PixelNoise {
            seed: 7,
            max_abs_px: 0.3,
        };
        assert_eq!(noise.sample(2, 5), noise.sample(2, 5));
        assert_ne!(noise.sample(2, 5), noise.sample(2, 6));
        for k in 0..100 {
            let d = noise.sample(k, k * 3);
            assert!(d.x.abs() <= 0.3 && d.y.abs() <= 0.3, "{d}");
        }
    }
}
