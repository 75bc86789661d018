use courtcal_core::{CalibError, CalibResult, CameraId, ImageSize, Pt2, Real};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Position of a tile in the composite view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileCell {
    pub row: u32,
    pub column: u32,
    /// Number of rows and columns the tile covers.
    #[serde(default = "unit_span")]
    pub span: u32,
}

fn unit_span() -> u32 {
    1
}

impl TileCell {
    pub const fn new(row: u32, column: u32) -> Self {
        Self {
            row,
            column,
            span: 1,
        }
    }

    fn covers(&self, row: u32, column: u32) -> bool {
        (self.row..self.row + self.span).contains(&row)
            && (self.column..self.column + self.span).contains(&column)
    }
}

/// Camera → tile table of the composite display.
///
/// The default is a 4×4 grid: cameras 1-4 on the top row, 5/6, 7/8 and 12/13
/// in the first two columns below, the court plot at row 1 column 2 spanning
/// two tiles, and two blank tiles at the bottom right.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLayout {
    pub rows: u32,
    pub columns: u32,
    pub cameras: BTreeMap<CameraId, TileCell>,
    pub court: Option<TileCell>,
}

impl Default for GridLayout {
    fn default() -> Self {
        let table = [
            (1, 0, 0),
            (2, 0, 1),
            (3, 0, 2),
            (4, 0, 3),
            (5, 1, 0),
            (6, 1, 1),
            (7, 2, 0),
            (8, 2, 1),
            (12, 3, 0),
            (13, 3, 1),
        ];
        Self {
            rows: 4,
            columns: 4,
            cameras: table
                .into_iter()
                .map(|(id, row, column)| (CameraId::from(id), TileCell::new(row, column)))
                .collect(),
            court: Some(TileCell {
                row: 1,
                column: 2,
                span: 2,
            }),
        }
    }
}

impl GridLayout {
    pub fn cell(&self, camera: &CameraId) -> CalibResult<TileCell> {
        self.cameras
            .get(camera)
            .copied()
            .ok_or_else(|| CalibError::UnknownCamera(camera.clone()))
    }

    /// Width and height of one tile in a `display`-sized composite.
    pub fn tile_size(&self, display: ImageSize) -> (Real, Real) {
        (
            display.width as Real / self.columns.max(1) as Real,
            display.height as Real / self.rows.max(1) as Real,
        )
    }

    /// Camera whose tile contains `point`; `None` for the court, blank tiles
    /// and points outside the composite.
    pub fn camera_at(&self, display: ImageSize, point: &Pt2) -> Option<CameraId> {
        let (tw, th) = self.tile_size(display);
        if point.x < 0.0 || point.y < 0.0 {
            return None;
        }
        let column = (point.x / tw).floor() as u32;
        let row = (point.y / th).floor() as u32;
        if column >= self.columns || row >= self.rows {
            return None;
        }
        self.cameras
            .iter()
            .find(|(_, cell)| cell.covers(row, column))
            .map(|(id, _)| id.clone())
    }
}
