//! Cross-camera point transfer through ground-plane homographies.

use crate::layout::GridLayout;
use crate::sets::HomographySet;
use courtcal_core::{CalibError, CalibResult, CameraId, ImageSize, Pt2, Real};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed ratio between native frames and the display they are shown on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayScale {
    pub native: ImageSize,
    pub display: ImageSize,
}

impl DisplayScale {
    pub const fn new(native: ImageSize, display: ImageSize) -> Self {
        Self { native, display }
    }

    /// Native pixels per display pixel.
    pub fn ratio(&self) -> Real {
        self.native.width as Real / self.display.width.max(1) as Real
    }

    /// Display click → native pixel.
    pub fn to_native(&self, display_point: &Pt2) -> Pt2 {
        Pt2::from(display_point.coords * self.ratio())
    }

    pub fn to_display(&self, native_point: &Pt2) -> Pt2 {
        Pt2::from(native_point.coords / self.ratio())
    }
}

/// A point seen in one camera, mapped to the ground plane and to every
/// camera that sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub source: CameraId,
    pub pixel: Pt2,
    /// Ground-plane position in metres.
    pub world: Pt2,
    /// Native-resolution pixel in each camera whose frame contains the point
    /// (the source camera included).
    pub image_points: BTreeMap<CameraId, Pt2>,
}

/// Marker positions in the composite display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayMarkers {
    pub markers: BTreeMap<CameraId, Pt2>,
}

/// Map `pixel` of camera `source` onto the ground plane and back into every
/// camera of `homographies`.
///
/// Cameras whose reprojection falls outside `native` are omitted.
pub fn transfer_point(
    homographies: &HomographySet,
    source: &CameraId,
    pixel: &Pt2,
    native: ImageSize,
) -> CalibResult<Transfer> {
    let h = homographies.require(source, "homography.json")?;
    let world = h.image_to_world(pixel).ok_or_else(|| {
        CalibError::divergence(format!("pixel {pixel} of camera {source} maps to infinity"))
    })?;

    let mut image_points = BTreeMap::new();
    for (camera, hc) in homographies.iter() {
        match hc.world_to_image(&world) {
            Some(p) if native.contains(&p) => {
                image_points.insert(camera.clone(), p);
            }
            _ => debug!("camera {camera}: world point ({:.3}, {:.3}) not visible", world.x, world.y),
        }
    }

    Ok(Transfer {
        source: source.clone(),
        pixel: *pixel,
        world,
        image_points,
    })
}

/// Place each camera's image point in its tile of the composite.
pub fn display_markers(
    transfer: &Transfer,
    layout: &GridLayout,
    scale: &DisplayScale,
) -> CalibResult<DisplayMarkers> {
    let (tile_w, tile_h) = layout.tile_size(scale.display);
    let per_tile_x = scale.ratio() * layout.columns.max(1) as Real;
    let per_tile_y = scale.ratio() * layout.rows.max(1) as Real;

    let mut markers = BTreeMap::new();
    for (camera, p) in &transfer.image_points {
        let cell = layout.cell(camera)?;
        markers.insert(
            camera.clone(),
            Pt2::new(
                p.x / per_tile_x + cell.column as Real * tile_w,
                p.y / per_tile_y + cell.row as Real * tile_h,
            ),
        );
    }
    Ok(DisplayMarkers { markers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use courtcal_core::{HomographyMatrix, LengthUnit, Mat3};

    const NATIVE: ImageSize = ImageSize::new(3840, 2160);

    /// Image → ground plane (mm) for a camera looking down at an offset.
    fn homography(offset_mm: Real, scale: Real) -> HomographyMatrix {
        HomographyMatrix::new(
            Mat3::new(scale, 0.0, offset_mm, 0.0, scale, 0.0, 0.0, 0.0, 1.0),
            LengthUnit::Millimeters,
        )
        .unwrap()
    }

    fn two_cameras() -> HomographySet {
        [
            (CameraId::from(1u32), homography(0.0, 5.0)),
            (CameraId::from(2u32), homography(-9000.0, 5.0)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn world_point_is_in_meters() {
        let t = transfer_point(&two_cameras(), &"1".into(), &Pt2::new(1000.0, 400.0), NATIVE).unwrap();
        assert_relative_eq!(t.world, Pt2::new(5.0, 2.0), epsilon = 1e-9);
        assert_relative_eq!(t.image_points[&CameraId::from(1u32)], Pt2::new(1000.0, 400.0), epsilon = 1e-6);
        // camera 2 sees x = 5 m at (5000 + 9000) / 5 = 2800 px
        assert_relative_eq!(t.image_points[&CameraId::from(2u32)], Pt2::new(2800.0, 400.0), epsilon = 1e-6);
    }

    #[test]
    fn points_outside_the_frame_are_omitted() {
        let near = transfer_point(&two_cameras(), &"1".into(), &Pt2::new(100.0, 100.0), NATIVE).unwrap();
        assert_relative_eq!(near.image_points[&CameraId::from(2u32)], Pt2::new(1900.0, 100.0), epsilon = 1e-6);

        // (19000 + 9000) / 5 = 5600 px lies beyond the right edge of camera 2
        let far = transfer_point(&two_cameras(), &"1".into(), &Pt2::new(3800.0, 100.0), NATIVE).unwrap();
        assert!(far.image_points.contains_key(&CameraId::from(1u32)));
        assert!(!far.image_points.contains_key(&CameraId::from(2u32)));
    }

    #[test]
    fn unknown_source_is_missing_input() {
        let err = transfer_point(&two_cameras(), &"7".into(), &Pt2::new(1.0, 1.0), NATIVE).unwrap_err();
        assert!(matches!(err, CalibError::MissingInput { .. }));
    }

    #[test]
    fn markers_land_in_tiles() {
        let scale = DisplayScale::new(NATIVE, ImageSize::new(1920, 1080));
        let t = Transfer {
            source: "1".into(),
            pixel: Pt2::new(800.0, 400.0),
            world: Pt2::new(0.0, 0.0),
            image_points: [
                (CameraId::from(1u32), Pt2::new(800.0, 400.0)),
                (CameraId::from(13u32), Pt2::new(800.0, 400.0)),
            ]
            .into_iter()
            .collect(),
        };
        let m = display_markers(&t, &GridLayout::default(), &scale).unwrap();
        assert_relative_eq!(m.markers[&CameraId::from(1u32)], Pt2::new(100.0, 50.0));
        assert_relative_eq!(m.markers[&CameraId::from(13u32)], Pt2::new(580.0, 860.0));
    }

    #[test]
    fn unknown_layout_camera_is_reported() {
        let scale = DisplayScale::new(NATIVE, ImageSize::new(1920, 1080));
        let t = Transfer {
            source: "9".into(),
            pixel: Pt2::origin(),
            world: Pt2::origin(),
            image_points: [(CameraId::from(9u32), Pt2::new(1.0, 1.0))].into_iter().collect(),
        };
        assert_eq!(
            display_markers(&t, &GridLayout::default(), &scale),
            Err(CalibError::UnknownCamera("9".into()))
        );
    }

    #[test]
    fn display_clicks_scale_to_native() {
        let scale = DisplayScale::new(NATIVE, ImageSize::new(1920, 1080));
        assert_eq!(scale.to_native(&Pt2::new(960.0, 540.0)), Pt2::new(1920.0, 1080.0));
        assert_eq!(scale.to_display(&Pt2::new(1920.0, 1080.0)), Pt2::new(960.0, 540.0));
    }
}
