//! Undistortion-optimised camera matrix.
//!
//! Samples a 9×9 grid over the source frame, removes the lens distortion and
//! fits the camera matrix so that either every source pixel (`alpha = 1`) or
//! only valid pixels (`alpha = 0`) fall inside the output frame.

use courtcal_core::{
    CalibError, CalibResult, ImageSize, IntrinsicModel, Intrinsics, Mat3, Pt2, Real, Vec2,
};
use log::warn;
use serde::{Deserialize, Serialize};

const GRID: usize = 9;

/// Pixel rectangle of the undistorted frame that holds only valid pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefinedCameraMatrix {
    pub matrix: Mat3,
    pub roi: Roi,
}

#[derive(Debug, Clone, Copy)]
struct Rect {
    x: Real,
    y: Real,
    width: Real,
    height: Real,
}

/// Inner (all-valid) and outer (all-covering) rectangles of the undistorted
/// frame border, mapped through `to_output`.
fn border_rectangles(
    model: &IntrinsicModel,
    size: ImageSize,
    to_output: impl Fn(Vec2) -> Vec2,
) -> (Rect, Rect) {
    let (mut ix0, mut iy0, mut ix1, mut iy1) = (Real::MIN, Real::MIN, Real::MAX, Real::MAX);
    let (mut ox0, mut oy0, mut ox1, mut oy1) = (Real::MAX, Real::MAX, Real::MIN, Real::MIN);

    let step_x = (size.width as Real - 1.0) / (GRID - 1) as Real;
    let step_y = (size.height as Real - 1.0) / (GRID - 1) as Real;
    for gy in 0..GRID {
        for gx in 0..GRID {
            let px = Pt2::new(gx as Real * step_x, gy as Real * step_y);
            let p = to_output(model.undistort_to_normalized(&px));
            if gx == 0 {
                ox0 = ox0.min(p.x);
                ix0 = ix0.max(p.x);
            }
            if gx == GRID - 1 {
                ox1 = ox1.max(p.x);
                ix1 = ix1.min(p.x);
            }
            if gy == 0 {
                oy0 = oy0.min(p.y);
                iy0 = iy0.max(p.y);
            }
            if gy == GRID - 1 {
                oy1 = oy1.max(p.y);
                iy1 = iy1.min(p.y);
            }
        }
    }

    (
        Rect {
            x: ix0,
            y: iy0,
            width: ix1 - ix0,
            height: iy1 - iy0,
        },
        Rect {
            x: ox0,
            y: oy0,
            width: ox1 - ox0,
            height: oy1 - oy0,
        },
    )
}

impl Rect {
    /// Pinhole parameters `(fx, fy, cx, cy)` that stretch this rectangle
    /// over a `w × h` output frame, if the rectangle is a real one.
    fn fit(&self, w: Real, h: Real) -> Option<[Real; 4]> {
        let ok = [self.x, self.y, self.width, self.height].iter().all(|v| v.is_finite())
            && self.width > 0.0
            && self.height > 0.0;
        ok.then(|| {
            let fx = w / self.width;
            let fy = h / self.height;
            [fx, fy, -fx * self.x, -fy * self.y]
        })
    }
}

impl RefinedCameraMatrix {
    /// The estimated camera matrix itself, with the whole frame as ROI.
    pub fn unchanged(model: &IntrinsicModel, size: ImageSize) -> Self {
        Self {
            matrix: model.camera_matrix(),
            roi: Roi {
                x: 0,
                y: 0,
                width: size.width,
                height: size.height,
            },
        }
    }
}

/// Compute the refined camera matrix for undistorting `image_size` frames
/// into `new_size` frames, with free scaling parameter `alpha` in `[0, 1]`.
///
/// A distortion estimate that folds the frame border has no all-valid
/// rectangle; the all-covering one is used instead, and if that is
/// degenerate too the camera matrix is returned unchanged. Only an `alpha`
/// outside `[0, 1]` is an error.
pub fn optimal_new_camera_matrix(
    model: &IntrinsicModel,
    image_size: ImageSize,
    alpha: Real,
    new_size: ImageSize,
) -> CalibResult<RefinedCameraMatrix> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(CalibError::InvalidInput(format!(
            "alpha must lie in [0, 1], got {alpha}"
        )));
    }

    let w = new_size.width as Real - 1.0;
    let h = new_size.height as Real - 1.0;
    let (inner, outer) = border_rectangles(model, image_size, |n| n);

    let Some(covering) = outer.fit(w, h) else {
        warn!("undistorted frame border is degenerate; keeping the camera matrix");
        return Ok(RefinedCameraMatrix::unchanged(model, new_size));
    };
    let valid = if alpha < 1.0 {
        inner.fit(w, h).unwrap_or_else(|| {
            warn!("distortion folds the frame border; using the all-covering rectangle");
            covering
        })
    } else {
        covering
    };

    let [fx, fy, cx, cy] = std::array::from_fn(|i| valid[i] * (1.0 - alpha) + covering[i] * alpha);
    let refined = Intrinsics {
        fx,
        fy,
        cx,
        cy,
        skew: 0.0,
    };

    let (valid_rect, _) = border_rectangles(model, image_size, |n| {
        refined.normalized_to_pixel(&n).coords
    });

    Ok(RefinedCameraMatrix {
        matrix: refined.k_matrix(),
        roi: clip_roi(valid_rect, new_size),
    })
}

fn clip_roi(r: Rect, size: ImageSize) -> Roi {
    if ![r.x, r.y, r.width, r.height].iter().all(|v| v.is_finite()) {
        return Roi {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        };
    }
    let x0 = r.x.round().max(0.0);
    let y0 = r.y.round().max(0.0);
    let x1 = (r.x.round() + r.width.round()).min(size.width as Real);
    let y1 = (r.y.round() + r.height.round()).min(size.height as Real);
    Roi {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0).max(0.0) as u32,
        height: (y1 - y0).max(0.0) as u32,
    }
}
