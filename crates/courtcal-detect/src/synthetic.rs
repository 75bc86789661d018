//! Rendered chessboard frames for tests and demos.

use crate::PatternSize;
use courtcal_core::{ImageSize, IntrinsicModel, Intrinsics, Iso3, Pt2, Real, Vec3};
use image::{GrayImage, Luma};
use nalgebra::{Translation3, UnitQuaternion};

const DARK: Real = 30.0;
const LIGHT: Real = 225.0;
const BACKGROUND: Real = 190.0;
const SUPERSAMPLE: u32 = 3;

/// 640×480 camera used by the detector tests.
pub fn small_camera(dist: courtcal_core::BrownConrady5) -> IntrinsicModel {
    IntrinsicModel::new(
        Intrinsics {
            fx: 800.0,
            fy: 800.0,
            cx: 320.0,
            cy: 240.0,
            skew: 0.0,
        },
        dist,
    )
}

/// Board → camera pose with the board centre on the optical axis at
/// `distance`, tilted by `tilt_x` / `tilt_y` radians.
pub fn tilted_board_pose(pattern: PatternSize, tilt_x: Real, tilt_y: Real, distance: Real) -> Iso3 {
    let rotation = UnitQuaternion::from_euler_angles(tilt_x, tilt_y, 0.05);
    let centre = Vec3::new(
        (pattern.per_row as Real - 1.0) * 0.5,
        (pattern.rows as Real - 1.0) * 0.5,
        0.0,
    );
    let t = Vec3::new(0.0, 0.0, distance) - rotation * centre;
    Iso3::from_parts(Translation3::from(t), rotation)
}

/// Intensity of board coordinate `(x, y)`: alternating squares of unit size
/// with a one-square light border around the inner-corner grid.
fn board_intensity(pattern: PatternSize, x: Real, y: Real) -> Real {
    let (w, h) = (pattern.per_row as Real, pattern.rows as Real);
    if x < -1.0 || y < -1.0 || x >= w || y >= h {
        return if x < -2.0 || y < -2.0 || x >= w + 1.0 || y >= h + 1.0 {
            BACKGROUND
        } else {
            LIGHT
        };
    }
    let cell = x.floor() as i64 + y.floor() as i64;
    if cell.rem_euclid(2) == 0 {
        DARK
    } else {
        LIGHT
    }
}

/// Render `pattern` seen through `camera` at `cam_from_board`.
///
/// Each pixel is ray-cast through the (distorted) camera model onto the board
/// plane with 3×3 supersampling.
pub fn render_board_view(
    camera: &IntrinsicModel,
    size: ImageSize,
    cam_from_board: &Iso3,
    pattern: PatternSize,
) -> GrayImage {
    let board_from_cam = cam_from_board.inverse();
    let origin = board_from_cam.translation.vector;

    GrayImage::from_fn(size.width, size.height, |px, py| {
        let mut acc = 0.0;
        for sy in 0..SUPERSAMPLE {
            for sx in 0..SUPERSAMPLE {
                let u = px as Real + (sx as Real + 0.5) / SUPERSAMPLE as Real - 0.5;
                let v = py as Real + (sy as Real + 0.5) / SUPERSAMPLE as Real - 0.5;
                let n = camera.undistort_to_normalized(&Pt2::new(u, v));
                let dir = board_from_cam.rotation * Vec3::new(n.x, n.y, 1.0);
                acc += if dir.z.abs() > Real::EPSILON && -origin.z / dir.z > 0.0 {
                    let s = -origin.z / dir.z;
                    board_intensity(pattern, origin.x + s * dir.x, origin.y + s * dir.y)
                } else {
                    BACKGROUND
                };
            }
        }
        let mean = acc / (SUPERSAMPLE * SUPERSAMPLE) as Real;
        Luma([mean.round().clamp(0.0, 255.0) as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use courtcal_core::BrownConrady5;

    #[test]
    fn board_centre_faces_camera() {
        let pattern = PatternSize::default();
        let pose = tilted_board_pose(pattern, 0.0, 0.0, 10.0);
        let c = pose.transform_point(&courtcal_core::Pt3::new(3.0, 2.0, 0.0));
        assert!(c.x.abs() < 1e-9 && c.y.abs() < 1e-9 && (c.z - 10.0).abs() < 1e-9);
    }

    #[test]
    fn rendering_contains_both_square_colours() {
        let pattern = PatternSize::default();
        let camera = small_camera(BrownConrady5::default());
        let img = render_board_view(
            &camera,
            ImageSize::new(640, 480),
            &tilted_board_pose(pattern, 0.0, 0.0, 56.0),
            pattern,
        );
        let dark = img.pixels().filter(|p| p[0] < 60).count();
        let light = img.pixels().filter(|p| p[0] > 200).count();
        assert!(dark > 100 && light > 100, "dark {dark} light {light}");
    }
}
