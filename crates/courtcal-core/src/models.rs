use serde::{Deserialize, Serialize};

use crate::{CalibError, CalibResult, Mat3, Pt2, Pt3, Real, Vec2};

/// Pinhole intrinsics.
///
/// The corresponding calibration matrix `K` has the form:
///
/// ```text
/// [ fx  skew  cx ]
/// [  0   fy   cy ]
/// [  0    0    1 ]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: Real,
    pub fy: Real,
    pub cx: Real,
    pub cy: Real,
    pub skew: Real,
}

impl Intrinsics {
    /// Build the 3×3 calibration matrix `K`.
    pub fn k_matrix(&self) -> Mat3 {
        Mat3::new(
            self.fx, self.skew, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0,
        )
    }

    /// Attempt to construct intrinsics from a 3×3 calibration matrix `K`.
    ///
    /// The matrix is first normalised so that `K[2, 2] == 1`. If it does not
    /// have the upper-triangular camera-matrix structure, or a focal length
    /// is not positive, `None` is returned.
    pub fn try_from_k_matrix(k: &Mat3) -> Option<Self> {
        let eps = 1e-9;
        let k33 = k[(2, 2)];
        if k33.abs() < eps {
            return None;
        }
        let k_norm = k / k33;

        if k_norm[(1, 0)].abs() > eps || k_norm[(2, 0)].abs() > eps || k_norm[(2, 1)].abs() > eps {
            return None;
        }
        if k_norm[(0, 0)] <= 0.0 || k_norm[(1, 1)] <= 0.0 {
            return None;
        }

        Some(Self {
            fx: k_norm[(0, 0)],
            skew: k_norm[(0, 1)],
            cx: k_norm[(0, 2)],
            fy: k_norm[(1, 1)],
            cy: k_norm[(1, 2)],
        })
    }

    pub fn normalized_to_pixel(&self, n: &Vec2) -> Pt2 {
        Pt2::new(
            self.fx * n.x + self.skew * n.y + self.cx,
            self.fy * n.y + self.cy,
        )
    }

    pub fn pixel_to_normalized(&self, p: &Pt2) -> Vec2 {
        let y = (p.y - self.cy) / self.fy;
        let x = (p.x - self.cx - self.skew * y) / self.fx;
        Vec2::new(x, y)
    }
}

/// Classic Brown–Conrady 5-parameter model (OpenCV coefficient order
/// `k1, k2, p1, p2, k3`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BrownConrady5 {
    pub k1: Real,
    pub k2: Real,
    pub p1: Real,
    pub p2: Real,
    pub k3: Real,
}

impl BrownConrady5 {
    /// Build from an OpenCV-ordered coefficient vector of length ≥ 4.
    ///
    /// A missing `k3` is taken as zero; trailing coefficients beyond the
    /// fifth belong to models this crate does not support and must be zero.
    pub fn from_coeffs(coeffs: &[Real]) -> CalibResult<Self> {
        if coeffs.len() < 4 {
            return Err(CalibError::insufficient(
                "distortion coefficients",
                4,
                coeffs.len(),
            ));
        }
        if coeffs.iter().skip(5).any(|c| c.abs() > 0.0) {
            return Err(CalibError::InvalidInput(format!(
                "unsupported distortion model with {} non-zero coefficients",
                coeffs.len()
            )));
        }
        Ok(Self {
            k1: coeffs[0],
            k2: coeffs[1],
            p1: coeffs[2],
            p2: coeffs[3],
            k3: coeffs.get(4).copied().unwrap_or(0.0),
        })
    }

    pub fn coeffs(&self) -> [Real; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn distort(&self, n: &Vec2) -> Vec2 {
        let (x, y) = (n.x, n.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + self.k1 * r2 + self.k2 * r2 * r2 + self.k3 * r2 * r2 * r2;
        let x_t = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let y_t = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;
        Vec2::new(x * radial + x_t, y * radial + y_t)
    }

    /// Invert [`Self::distort`] by fixed-point iteration.
    pub fn undistort(&self, n_dist: &Vec2) -> Vec2 {
        let max_iters = 20;
        let tol = 1e-12;
        let mut x_u = n_dist.x;
        let mut y_u = n_dist.y;

        for _ in 0..max_iters {
            let r2 = x_u * x_u + y_u * y_u;
            let radial = 1.0 + self.k1 * r2 + self.k2 * r2 * r2 + self.k3 * r2 * r2 * r2;
            let x_t = 2.0 * self.p1 * x_u * y_u + self.p2 * (r2 + 2.0 * x_u * x_u);
            let y_t = self.p1 * (r2 + 2.0 * y_u * y_u) + 2.0 * self.p2 * x_u * y_u;

            let x_new = (n_dist.x - x_t) / radial;
            let y_new = (n_dist.y - y_t) / radial;
            let step = (x_new - x_u).abs().max((y_new - y_u).abs());
            x_u = x_new;
            y_u = y_new;
            if step < tol {
                break;
            }
        }

        Vec2::new(x_u, y_u)
    }
}

/// Per-camera projection model: camera matrix plus lens distortion.
///
/// Immutable once estimated; the extrinsic stage reloads it from storage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntrinsicModel {
    pub k: Intrinsics,
    pub dist: BrownConrady5,
}

impl IntrinsicModel {
    pub fn new(k: Intrinsics, dist: BrownConrady5) -> Self {
        Self { k, dist }
    }

    /// Rebuild from the persisted camera matrix and coefficient vector.
    pub fn from_parts(k_matrix: &Mat3, coeffs: &[Real]) -> CalibResult<Self> {
        let k = Intrinsics::try_from_k_matrix(k_matrix).ok_or_else(|| {
            CalibError::InvalidInput("camera matrix is not of the form [fx s cx; 0 fy cy; 0 0 1]".into())
        })?;
        Ok(Self {
            k,
            dist: BrownConrady5::from_coeffs(coeffs)?,
        })
    }

    pub fn camera_matrix(&self) -> Mat3 {
        self.k.k_matrix()
    }

    /// Project a point in camera coordinates to distorted pixel coordinates.
    ///
    /// Returns `None` for points on or behind the image plane.
    pub fn project(&self, p_c: &Pt3) -> Option<Pt2> {
        if p_c.z <= Real::EPSILON {
            return None;
        }
        let n = Vec2::new(p_c.x / p_c.z, p_c.y / p_c.z);
        Some(self.k.normalized_to_pixel(&self.dist.distort(&n)))
    }

    /// Map a measured (distorted) pixel to ideal normalised image coordinates.
    pub fn undistort_to_normalized(&self, pixel: &Pt2) -> Vec2 {
        self.dist.undistort(&self.k.pixel_to_normalized(pixel))
    }

    /// Map a measured pixel to the ideal pixel seen with zero distortion.
    pub fn undistort_pixel(&self, pixel: &Pt2) -> Pt2 {
        self.k
            .normalized_to_pixel(&self.undistort_to_normalized(pixel))
    }

    pub fn is_finite(&self) -> bool {
        let k = &self.k;
        [k.fx, k.fy, k.cx, k.cy, k.skew]
            .iter()
            .chain(self.dist.coeffs().iter())
            .all(|v| v.is_finite())
    }
}

/// Pixel dimensions of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Strict interior test `0 < x < width && 0 < y < height`.
    pub fn contains(&self, p: &Pt2) -> bool {
        p.x > 0.0 && p.y > 0.0 && p.x < self.width as Real && p.y < self.height as Real
    }
}
