//! Mathematical utilities and type definitions.

use nalgebra::{Isometry3, Matrix3, Matrix4, Point2, Point3, Rotation3, Vector2, Vector3};

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 2D vector with [`Real`] components.
pub type Vec2 = Vector2<Real>;
/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 2D point with [`Real`] coordinates.
pub type Pt2 = Point2<Real>;
/// 3D point with [`Real`] coordinates.
pub type Pt3 = Point3<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;
/// 4×4 matrix with [`Real`] entries.
pub type Mat4 = Matrix4<Real>;
/// 3D rigid transform (SE(3)) using [`Real`].
pub type Iso3 = Isometry3<Real>;

/// Convert a 2D point in Euclidean coordinates into homogeneous coordinates.
pub fn to_homogeneous(p: &Pt2) -> Vec3 {
    Vec3::new(p.x, p.y, 1.0)
}

/// Convert a 3D homogeneous vector back to a 2D point.
///
/// Returns `None` when the last coordinate is (numerically) zero, i.e. the
/// point lies at infinity.
pub fn from_homogeneous(v: &Vec3) -> Option<Pt2> {
    if v.z.abs() <= Real::EPSILON || !v.z.is_finite() {
        return None;
    }
    Some(Pt2::new(v.x / v.z, v.y / v.z))
}

/// Rotation matrix from a rotation vector (axis * angle) via the exponential map.
pub fn rotation_from_vector(rvec: &Vec3) -> Mat3 {
    Rotation3::new(*rvec).into_inner()
}

/// Rotation vector (axis * angle) of a proper rotation matrix.
pub fn rotation_to_vector(r: &Mat3) -> Vec3 {
    Rotation3::from_matrix_unchecked(*r).scaled_axis()
}

/// Largest absolute entry of `RᵀR - I`.
pub fn orthonormality_error(r: &Mat3) -> Real {
    (r.transpose() * r - Mat3::identity()).abs().max()
}

/// Row-major nested array form of a 3×3 matrix, as stored in the JSON artifacts.
pub fn mat3_to_rows(m: &Mat3) -> [[Real; 3]; 3] {
    let mut rows = [[0.0; 3]; 3];
    for (r, row) in rows.iter_mut().enumerate() {
        for (c, v) in row.iter_mut().enumerate() {
            *v = m[(r, c)];
        }
    }
    rows
}

pub fn mat3_from_rows(rows: &[[Real; 3]; 3]) -> Mat3 {
    Mat3::from_fn(|r, c| rows[r][c])
}

/// Row-major nested array form of a 4×4 matrix.
pub fn mat4_to_rows(m: &Mat4) -> [[Real; 4]; 4] {
    let mut rows = [[0.0; 4]; 4];
    for (r, row) in rows.iter_mut().enumerate() {
        for (c, v) in row.iter_mut().enumerate() {
            *v = m[(r, c)];
        }
    }
    rows
}

pub fn mat4_from_rows(rows: &[[Real; 4]; 4]) -> Mat4 {
    Mat4::from_fn(|r, c| rows[r][c])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rotation_vector_roundtrip() {
        let rvec = Vec3::new(0.1, -0.4, 0.25);
        let r = rotation_from_vector(&rvec);
        assert!(orthonormality_error(&r) < 1e-12);
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(rotation_to_vector(&r), rvec, epsilon = 1e-12);
    }

    #[test]
    fn quarter_turn_about_z() {
        let r = rotation_from_vector(&Vec3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2));
        let p = r * Vec3::new(1.0, 0.0, 0.0);
        assert_relative_eq!(p, Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn rows_are_row_major() {
        let m = Mat3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0);
        let rows = mat3_to_rows(&m);
        assert_eq!(rows[0], [1.0, 2.0, 3.0]);
        assert_eq!(rows[2], [7.0, 8.0, 9.0]);
        assert_eq!(mat3_from_rows(&rows), m);
    }

    #[test]
    fn point_at_infinity_has_no_euclidean_form() {
        assert!(from_homogeneous(&Vec3::new(1.0, 2.0, 0.0)).is_none());
        assert_eq!(
            from_homogeneous(&Vec3::new(2.0, 4.0, 2.0)),
            Some(Pt2::new(1.0, 2.0))
        );
    }
}
