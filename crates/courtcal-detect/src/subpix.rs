//! Iterative sub-pixel corner refinement.
//!
//! For a true corner `q`, the image gradient at every nearby pixel `p` is
//! orthogonal to `p - q`. Each iteration solves the Gaussian-weighted normal
//! equations `Σ g gᵀ q = Σ g gᵀ p` over a square window.

use crate::plane::Plane;
use courtcal_core::{Pt2, Real};
use image::GrayImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubPixParams {
    /// Half side of the search window; 5 gives an 11×11 window.
    pub half_window: u32,
    pub max_iters: usize,
    /// Stop once a corner moves less than this many pixels.
    pub epsilon: Real,
}

impl Default for SubPixParams {
    fn default() -> Self {
        Self {
            half_window: 5,
            max_iters: 30,
            epsilon: 0.001,
        }
    }
}

fn gaussian_mask(half: i64) -> Vec<Real> {
    let coeff = 1.0 / (half * half) as Real;
    let line: Vec<Real> = (-half..=half)
        .map(|x| (-((x * x) as Real) * coeff).exp())
        .collect();
    let mut mask = Vec::with_capacity(line.len() * line.len());
    for wy in &line {
        for wx in &line {
            mask.push(wx * wy);
        }
    }
    mask
}

fn refine_one(plane: &Plane, start: &Pt2, params: &SubPixParams, mask: &[Real]) -> Pt2 {
    let half = params.half_window as i64;
    let eps_sq = params.epsilon * params.epsilon;
    let mut c = *start;

    for _ in 0..params.max_iters.max(1) {
        let (mut a, mut b, mut cc, mut bb1, mut bb2) = (0.0, 0.0, 0.0, 0.0, 0.0);
        let mut k = 0;
        for dy in -half..=half {
            for dx in -half..=half {
                let (px, py) = (dx as Real, dy as Real);
                let x = c.x + px;
                let y = c.y + py;
                let gx = 0.5 * (plane.sample(x + 1.0, y) - plane.sample(x - 1.0, y));
                let gy = 0.5 * (plane.sample(x, y + 1.0) - plane.sample(x, y - 1.0));
                let m = mask[k];
                k += 1;

                let gxx = gx * gx * m;
                let gxy = gx * gy * m;
                let gyy = gy * gy * m;
                a += gxx;
                b += gxy;
                cc += gyy;
                bb1 += gxx * px + gxy * py;
                bb2 += gxy * px + gyy * py;
            }
        }

        let det = a * cc - b * b;
        if det.abs() <= Real::EPSILON * (a * cc).abs().max(1.0) {
            break;
        }
        let scale = 1.0 / det;
        let next = Pt2::new(
            c.x + cc * scale * bb1 - b * scale * bb2,
            c.y - b * scale * bb1 + a * scale * bb2,
        );
        let moved = (next - c).norm_squared();
        c = next;
        if moved <= eps_sq {
            break;
        }
    }

    let drift = c - start;
    if !c.x.is_finite() || !c.y.is_finite() || drift.x.abs() > half as Real || drift.y.abs() > half as Real {
        *start
    } else {
        c
    }
}

/// Refine approximate corner locations on the raw (unsmoothed) frame.
///
/// A corner whose estimate escapes the search window keeps its input value.
pub fn refine_corners_subpix(image: &GrayImage, corners: &[Pt2], params: &SubPixParams) -> Vec<Pt2> {
    let plane = Plane::from_gray(image);
    let mask = gaussian_mask(params.half_window.max(1) as i64);
    let params = SubPixParams {
        half_window: params.half_window.max(1),
        ..*params
    };
    corners
        .iter()
        .map(|c| refine_one(&plane, c, &params, &mask))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Anti-aliased X-junction at (cx, cy) using 8×8 supersampling.
    fn x_junction(cx: Real, cy: Real) -> GrayImage {
        GrayImage::from_fn(48, 48, |x, y| {
            let mut acc: Real = 0.0;
            for sy in 0..8 {
                for sx in 0..8 {
                    let px = x as Real + (sx as Real + 0.5) / 8.0 - 0.5;
                    let py = y as Real + (sy as Real + 0.5) / 8.0 - 0.5;
                    let dark = (px < cx) == (py < cy);
                    acc += if dark { 30.0 } else { 220.0 };
                }
            }
            image::Luma([(acc / 64.0).round() as u8])
        })
    }

    #[test]
    fn converges_to_true_corner() {
        let img = x_junction(23.3, 24.6);
        let refined = refine_corners_subpix(&img, &[Pt2::new(22.0, 26.0)], &SubPixParams::default());
        let p = refined[0];
        assert!((p.x - 23.3).abs() < 0.1 && (p.y - 24.6).abs() < 0.1, "{p}");
    }

    #[test]
    fn flat_region_keeps_input() {
        let img = GrayImage::from_pixel(32, 32, image::Luma([90]));
        let start = Pt2::new(15.2, 16.7);
        let refined = refine_corners_subpix(&img, &[start], &SubPixParams::default());
        assert_eq!(refined[0], start);
    }
}
