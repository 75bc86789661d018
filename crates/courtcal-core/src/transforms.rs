use crate::{
    from_homogeneous, orthonormality_error, rotation_from_vector, to_homogeneous, CalibError,
    CalibResult, LengthUnit, Mat3, Mat4, Pt2, Pt3, Real, Vec3,
};

/// Tolerance on `RᵀR - I` for a transform to count as rigid.
pub const ORTHONORMAL_TOL: Real = 1e-6;

/// Camera pose expressed in the world frame.
///
/// The upper-left 3×3 block is a proper rotation and the translation column is
/// the camera's location in world metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtrinsicPose {
    camera_in_world: Mat4,
}

impl ExtrinsicPose {
    /// Homogeneous "world expressed in camera frame" transform for a solved
    /// rotation vector and translation.
    ///
    /// `tvec` is in `unit`; the translation column of the result is in metres.
    pub fn world_in_camera(rvec: &Vec3, tvec: &Vec3, unit: LengthUnit) -> Mat4 {
        let mut m = Mat4::identity();
        m.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&rotation_from_vector(rvec));
        m.fixed_view_mut::<3, 1>(0, 3)
            .copy_from(&(tvec / unit.units_per_meter()));
        m
    }

    /// Invert a rigid "world in camera" transform into the persisted pose.
    pub fn from_world_in_camera(world_in_camera: &Mat4) -> CalibResult<Self> {
        check_rigid(world_in_camera, "world-in-camera transform")?;
        let camera_in_world = world_in_camera
            .try_inverse()
            .ok_or_else(|| CalibError::divergence("world-in-camera transform is singular"))?;
        check_rigid(&camera_in_world, "camera-in-world transform")?;
        Ok(Self { camera_in_world })
    }

    /// Build the pose from a PnP solution (rotation vector + translation).
    pub fn from_solved(rvec: &Vec3, tvec: &Vec3, unit: LengthUnit) -> CalibResult<Self> {
        Self::from_world_in_camera(&Self::world_in_camera(rvec, tvec, unit))
    }

    /// Wrap an already inverted (camera-in-world) matrix, e.g. one read back
    /// from storage.
    pub fn from_matrix(camera_in_world: Mat4) -> CalibResult<Self> {
        check_rigid(&camera_in_world, "camera-in-world transform")?;
        Ok(Self { camera_in_world })
    }

    pub fn matrix(&self) -> &Mat4 {
        &self.camera_in_world
    }

    pub fn rotation(&self) -> Mat3 {
        self.camera_in_world.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// Camera location in world metres.
    pub fn camera_position(&self) -> Pt3 {
        let t = self.camera_in_world.fixed_view::<3, 1>(0, 3);
        Pt3::new(t[0], t[1], t[2])
    }
}

fn check_rigid(m: &Mat4, what: &str) -> CalibResult<()> {
    if m.iter().any(|v| !v.is_finite()) {
        return Err(CalibError::divergence(format!("{what} has non-finite entries")));
    }
    let last_row = m.row(3);
    if last_row[0].abs() > ORTHONORMAL_TOL
        || last_row[1].abs() > ORTHONORMAL_TOL
        || last_row[2].abs() > ORTHONORMAL_TOL
        || (last_row[3] - 1.0).abs() > ORTHONORMAL_TOL
    {
        return Err(CalibError::divergence(format!(
            "{what} is not homogeneous (last row {last_row})"
        )));
    }
    let r = m.fixed_view::<3, 3>(0, 0).into_owned();
    let err = orthonormality_error(&r);
    if err > ORTHONORMAL_TOL {
        return Err(CalibError::divergence(format!(
            "{what} rotation block is not orthonormal (error {err:.3e})"
        )));
    }
    if r.determinant() <= 0.0 {
        return Err(CalibError::divergence(format!(
            "{what} rotation block is a reflection"
        )));
    }
    Ok(())
}

/// Planar projective transform from image pixels to the ground plane.
///
/// The world side is expressed in `world_unit` (the unit the reference points
/// were surveyed in). [`Self::image_to_world`] and [`Self::world_to_image`]
/// speak metres and convert exactly once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomographyMatrix {
    h: Mat3,
    h_inv: Mat3,
    world_unit: LengthUnit,
}

impl HomographyMatrix {
    /// Wrap `h`, scaled so that `h[2,2] == 1` when possible.
    ///
    /// Fails with [`CalibError::NumericDivergence`] for non-finite or
    /// singular matrices.
    pub fn new(h: Mat3, world_unit: LengthUnit) -> CalibResult<Self> {
        if h.iter().any(|v| !v.is_finite()) {
            return Err(CalibError::divergence("homography has non-finite entries"));
        }
        let mut h = h;
        let scale = h[(2, 2)];
        if scale.abs() > Real::EPSILON {
            h /= scale;
        }

        let norm = h.norm();
        if norm <= Real::EPSILON || (h.determinant() / norm.powi(3)).abs() < 1e-14 {
            return Err(CalibError::divergence("homography is singular"));
        }
        let h_inv = h
            .try_inverse()
            .ok_or_else(|| CalibError::divergence("homography is singular"))?;

        Ok(Self {
            h,
            h_inv,
            world_unit,
        })
    }

    pub fn matrix(&self) -> &Mat3 {
        &self.h
    }

    pub fn inverse(&self) -> &Mat3 {
        &self.h_inv
    }

    pub fn world_unit(&self) -> LengthUnit {
        self.world_unit
    }

    /// Image pixel to ground-plane point in the stored world unit.
    pub fn image_to_plane(&self, pixel: &Pt2) -> Option<Pt2> {
        from_homogeneous(&(self.h * to_homogeneous(pixel)))
    }

    /// Ground-plane point in the stored world unit to image pixel.
    pub fn plane_to_image(&self, plane: &Pt2) -> Option<Pt2> {
        from_homogeneous(&(self.h_inv * to_homogeneous(plane)))
    }

    /// Image pixel to ground-plane point in metres.
    pub fn image_to_world(&self, pixel: &Pt2) -> Option<Pt2> {
        self.image_to_plane(pixel).map(|p| {
            Pt2::new(
                self.world_unit.to_meters(p.x),
                self.world_unit.to_meters(p.y),
            )
        })
    }

    /// Ground-plane point in metres to image pixel.
    pub fn world_to_image(&self, world_m: &Pt2) -> Option<Pt2> {
        let plane = Pt2::new(
            self.world_unit.from_meters(world_m.x),
            self.world_unit.from_meters(world_m.y),
        );
        self.plane_to_image(&plane)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn translation_is_scaled_once_before_inversion() {
        let m = ExtrinsicPose::world_in_camera(
            &Vec3::zeros(),
            &Vec3::new(1000.0, 2000.0, 3000.0),
            LengthUnit::Millimeters,
        );
        assert_relative_eq!(m[(0, 3)], 1.0);
        assert_relative_eq!(m[(1, 3)], 2.0);
        assert_relative_eq!(m[(2, 3)], 3.0);
    }

    #[test]
    fn camera_position_is_inverse_translation() {
        let rvec = Vec3::new(0.2, -0.1, 0.7);
        let tvec = Vec3::new(500.0, -250.0, 8000.0);
        let pose = ExtrinsicPose::from_solved(&rvec, &tvec, LengthUnit::Millimeters).unwrap();

        let r = rotation_from_vector(&rvec);
        let expected = -(r.transpose() * (tvec / 1000.0));
        assert_relative_eq!(pose.camera_position().coords, expected, epsilon = 1e-9);

        let rot = pose.rotation();
        assert!(orthonormality_error(&rot) < 1e-9);
        assert_relative_eq!(rot.determinant(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn non_rigid_matrix_is_rejected() {
        let mut m = Mat4::identity();
        m[(0, 0)] = 2.0;
        assert!(matches!(
            ExtrinsicPose::from_matrix(m),
            Err(CalibError::NumericDivergence(_))
        ));
    }

    #[test]
    fn homography_roundtrip_in_meters() {
        let h = Mat3::new(2.0, 0.1, 30.0, -0.05, 1.8, 12.0, 1e-4, 2e-5, 1.0);
        let hm = HomographyMatrix::new(h, LengthUnit::Millimeters).unwrap();
        let px = Pt2::new(640.0, 360.0);
        let world = hm.image_to_world(&px).unwrap();
        let plane = hm.image_to_plane(&px).unwrap();
        assert_relative_eq!(world.x * 1000.0, plane.x, epsilon = 1e-9);
        let back = hm.world_to_image(&world).unwrap();
        assert_relative_eq!(back, px, epsilon = 1e-6);
        assert_relative_eq!(hm.matrix() * hm.inverse(), Mat3::identity(), epsilon = 1e-9);
    }

    #[test]
    fn singular_homography_is_rejected() {
        let h = Mat3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0);
        assert!(HomographyMatrix::new(h, LengthUnit::Meters).is_err());
    }
}
