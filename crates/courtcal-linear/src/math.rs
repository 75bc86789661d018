//! Mathematical utilities shared by the linear solvers.
//!
//! - **Hartley normalization** for 2D and 3D points (numerical conditioning)
//! - **Null-space extraction** for homogeneous `A x = 0` systems
//! - **Point-set degeneracy checks** (collinearity, planarity)

use courtcal_core::{CalibError, CalibResult, Mat3, Mat4, Pt2, Pt3, Real, Vec3};
use nalgebra::{DMatrix, DVector, Matrix3x4};

/// Hartley normalization for 2D points.
///
/// Centers points at the origin and scales so that the mean distance from
/// the origin is `√2`. Returns the normalized points and the 3×3 transform
/// `T` such that `p_norm = T * p_homogeneous`, or `None` if the input is
/// empty or all points coincide.
///
/// Hartley & Zisserman, "Multiple View Geometry in Computer Vision", 2nd ed.,
/// Algorithm 4.2 (Normalized DLT)
pub fn normalize_points_2d(points: &[Pt2]) -> Option<(Vec<Pt2>, Mat3)> {
    if points.is_empty() {
        return None;
    }

    let n = points.len() as Real;
    let centroid = points.iter().fold(Pt2::origin().coords, |acc, p| acc + p.coords) / n;

    let mean_dist = points
        .iter()
        .map(|p| (p.coords - centroid).norm())
        .sum::<Real>()
        / n;
    if mean_dist <= Real::EPSILON {
        return None;
    }

    let scale = (2.0_f64).sqrt() / mean_dist;
    let t = Mat3::new(
        scale,
        0.0,
        -scale * centroid.x,
        0.0,
        scale,
        -scale * centroid.y,
        0.0,
        0.0,
        1.0,
    );

    let norm = points
        .iter()
        .map(|p| Pt2::from((p.coords - centroid) * scale))
        .collect();

    Some((norm, t))
}

/// Hartley normalization for 3D points (mean distance `√3`).
pub fn normalize_points_3d(points: &[Pt3]) -> Option<(Vec<Pt3>, Mat4)> {
    if points.is_empty() {
        return None;
    }

    let n = points.len() as Real;
    let centroid = centroid_3d(points);
    let mean_dist = points
        .iter()
        .map(|p| (p.coords - centroid.coords).norm())
        .sum::<Real>()
        / n;
    if mean_dist <= Real::EPSILON {
        return None;
    }

    let scale = (3.0_f64).sqrt() / mean_dist;
    let mut t = Mat4::identity() * scale;
    t[(3, 3)] = 1.0;
    t.fixed_view_mut::<3, 1>(0, 3)
        .copy_from(&(-scale * centroid.coords));

    let norm = points
        .iter()
        .map(|p| Pt3::from((p.coords - centroid.coords) * scale))
        .collect();

    Some((norm, t))
}

pub fn centroid_3d(points: &[Pt3]) -> Pt3 {
    let n = points.len().max(1) as Real;
    Pt3::from(points.iter().fold(Vec3::zeros(), |acc, p| acc + p.coords) / n)
}

/// Right singular vector of `a` for its smallest singular value.
///
/// Under-determined systems are zero-padded to square so the SVD still
/// exposes the full right null space.
pub fn null_vector(a: DMatrix<Real>) -> CalibResult<DVector<Real>> {
    let cols = a.ncols();
    let a = if a.nrows() < cols {
        let mut padded = DMatrix::<Real>::zeros(cols, cols);
        padded.view_mut((0, 0), (a.nrows(), cols)).copy_from(&a);
        padded
    } else {
        a
    };

    let svd = a.svd(false, true);
    let v_t = svd
        .v_t
        .ok_or_else(|| CalibError::divergence("svd failed"))?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .fold((0, Real::INFINITY), |best, (i, &s)| {
            if s < best.1 {
                (i, s)
            } else {
                best
            }
        });
    Ok(v_t.row(min_idx).transpose())
}

/// Reshape a 9-vector (row-major) into a 3×3 matrix.
pub fn mat3_from_vec(h: &DVector<Real>) -> Mat3 {
    Mat3::from_fn(|r, c| h[3 * r + c])
}

/// Reshape a 12-vector (row-major) into a 3×4 matrix.
pub fn mat34_from_vec(p: &DVector<Real>) -> Matrix3x4<Real> {
    Matrix3x4::from_fn(|r, c| p[4 * r + c])
}

/// Ratio of the smallest to the largest spread of a 2D point set.
///
/// Zero for collinear (or coincident) points, one for an isotropic cloud.
pub fn spread_ratio_2d(points: &[Pt2]) -> Real {
    if points.len() < 2 {
        return 0.0;
    }
    let n = points.len() as Real;
    let c = points.iter().fold(Pt2::origin().coords, |acc, p| acc + p.coords) / n;
    let mut cov = nalgebra::Matrix2::<Real>::zeros();
    for p in points {
        let d = p.coords - c;
        cov += d * d.transpose();
    }
    let eig = cov.symmetric_eigenvalues();
    let (lo, hi) = (eig.min(), eig.max());
    if hi <= Real::EPSILON {
        0.0
    } else {
        (lo.max(0.0) / hi).sqrt()
    }
}

/// Least-squares plane through a 3D point set.
#[derive(Debug, Clone, Copy)]
pub struct PlaneFit {
    pub centroid: Pt3,
    /// Unit normal (direction of least spread).
    pub normal: Vec3,
    /// In-plane unit axis of largest spread.
    pub u: Vec3,
    /// `normal × u`, completing a right-handed basis.
    pub v: Vec3,
    /// Ratio of out-of-plane to largest in-plane spread.
    pub flatness: Real,
    /// Ratio of second to largest in-plane spread (zero for collinear points).
    pub spread: Real,
}

impl PlaneFit {
    pub fn fit(points: &[Pt3]) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }
        let centroid = centroid_3d(points);
        let mut cov = Mat3::zeros();
        for p in points {
            let d = p.coords - centroid.coords;
            cov += d * d.transpose();
        }

        let eig = cov.symmetric_eigen();
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| eig.eigenvalues[a].total_cmp(&eig.eigenvalues[b]));
        let [lo, mid, hi] = order;
        let largest = eig.eigenvalues[hi];
        if largest <= Real::EPSILON {
            return None;
        }

        let normal = eig.eigenvectors.column(lo).normalize();
        let u = eig.eigenvectors.column(hi).normalize();
        let v = normal.cross(&u);

        Some(Self {
            centroid,
            normal,
            u,
            v,
            flatness: (eig.eigenvalues[lo].max(0.0) / largest).sqrt(),
            spread: (eig.eigenvalues[mid].max(0.0) / largest).sqrt(),
        })
    }

    /// Coordinates `(u, v, n)` of a point in the plane frame.
    pub fn to_plane(&self, p: &Pt3) -> Pt3 {
        let d = p.coords - self.centroid.coords;
        Pt3::new(d.dot(&self.u), d.dot(&self.v), d.dot(&self.normal))
    }

    /// Rotation whose rows are the plane axes (world → plane).
    pub fn rotation(&self) -> Mat3 {
        Mat3::from_rows(&[
            self.u.transpose(),
            self.v.transpose(),
            self.normal.transpose(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normalized_points_have_sqrt2_mean_distance() {
        let points = vec![
            Pt2::new(100.0, 200.0),
            Pt2::new(150.0, 250.0),
            Pt2::new(120.0, 220.0),
            Pt2::new(90.0, 260.0),
        ];
        let (norm, t) = normalize_points_2d(&points).unwrap();
        let mean: Real = norm.iter().map(|p| p.coords.norm()).sum::<Real>() / 4.0;
        assert_relative_eq!(mean, 2.0_f64.sqrt(), epsilon = 1e-12);
        let mapped = t * Vec3::new(150.0, 250.0, 1.0);
        assert_relative_eq!(mapped.x, norm[1].x, epsilon = 1e-12);
    }

    #[test]
    fn collinear_points_have_zero_spread() {
        let line: Vec<Pt2> = (0..5).map(|i| Pt2::new(i as Real, 2.0 * i as Real)).collect();
        assert!(spread_ratio_2d(&line) < 1e-9);
        let square = vec![
            Pt2::new(0.0, 0.0),
            Pt2::new(1.0, 0.0),
            Pt2::new(1.0, 1.0),
            Pt2::new(0.0, 1.0),
        ];
        assert_relative_eq!(spread_ratio_2d(&square), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn plane_fit_finds_ground_plane() {
        let pts = vec![
            Pt3::new(0.0, 0.0, 0.0),
            Pt3::new(4.0, 0.0, 0.0),
            Pt3::new(4.0, 2.0, 0.0),
            Pt3::new(0.0, 2.0, 0.0),
            Pt3::new(2.0, 1.0, 0.0),
        ];
        let fit = PlaneFit::fit(&pts).unwrap();
        assert_relative_eq!(fit.normal.z.abs(), 1.0, epsilon = 1e-12);
        assert!(fit.flatness < 1e-12);
        assert!(fit.spread > 0.1);
        let r = fit.rotation();
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn null_vector_of_underdetermined_system() {
        let a = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        let x = null_vector(a).unwrap();
        assert_relative_eq!(x[2].abs(), 1.0, epsilon = 1e-12);
    }
}
