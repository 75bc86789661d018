//! Click-driven front end of the point mapper.
//!
//! The session is a small state machine: pick a camera tile in the composite
//! view, pick a point in that camera's full-size view, show where the point
//! lands in every camera. Drawing and input belong to an
//! [`InteractionSurface`].

use crate::layout::GridLayout;
use crate::mapper::{display_markers, transfer_point, DisplayMarkers, DisplayScale, Transfer};
use crate::sets::HomographySet;
use anyhow::Result;
use courtcal_core::{CameraId, Pt2};
use log::{debug, warn};

/// What the session is waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// A click in the composite grid.
    SelectCamera,
    /// A click in the display-sized view of one camera.
    SelectPoint(CameraId),
}

/// What the surface should show.
#[derive(Debug, Clone, Copy)]
pub enum Frame<'a> {
    Grid,
    Camera(&'a CameraId),
    Result {
        transfer: &'a Transfer,
        markers: &'a DisplayMarkers,
    },
}

/// Input and output of an interactive session.
///
/// Errors are failures of the surface itself (a closed terminal, a lost
/// window) and end the session.
pub trait InteractionSurface {
    /// Next click in display coordinates; `None` cancels the session.
    fn await_click(&mut self, stage: &Stage) -> Result<Option<Pt2>>;
    fn render(&mut self, frame: &Frame<'_>) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionResult {
    pub transfer: Transfer,
    pub markers: DisplayMarkers,
}

#[derive(Debug, Clone)]
pub struct InteractiveSession {
    homographies: HomographySet,
    layout: GridLayout,
    scale: DisplayScale,
}

impl InteractiveSession {
    pub fn new(homographies: HomographySet, layout: GridLayout, scale: DisplayScale) -> Self {
        Self {
            homographies,
            layout,
            scale,
        }
    }

    /// Drive one select-camera / select-point / show-result round.
    ///
    /// Returns `Ok(None)` when the surface cancels. Nothing is persisted.
    pub fn run<S: InteractionSurface + ?Sized>(
        &self,
        surface: &mut S,
    ) -> Result<Option<SessionResult>> {
        surface.render(&Frame::Grid)?;
        let camera = loop {
            let Some(click) = surface.await_click(&Stage::SelectCamera)? else {
                return Ok(None);
            };
            match self.layout.camera_at(self.scale.display, &click) {
                Some(camera) if self.homographies.contains(&camera) => break camera,
                Some(camera) => warn!("camera {camera} has no homography; pick another tile"),
                None => debug!("click ({:.0}, {:.0}) is not on a camera tile", click.x, click.y),
            }
        };

        surface.render(&Frame::Camera(&camera))?;
        let Some(click) = surface.await_click(&Stage::SelectPoint(camera.clone()))? else {
            return Ok(None);
        };
        let pixel = self.scale.to_native(&click);
        let transfer = transfer_point(&self.homographies, &camera, &pixel, self.scale.native)?;
        let markers = display_markers(&transfer, &self.layout, &self.scale)?;

        surface.render(&Frame::Result {
            transfer: &transfer,
            markers: &markers,
        })?;
        Ok(Some(SessionResult { transfer, markers }))
    }
}
