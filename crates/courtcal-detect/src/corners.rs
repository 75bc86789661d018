//! X-junction candidates from the ChESS detector.

use chess_corners::{find_chess_corners_image, ChessConfig, CornerDescriptor};
use courtcal_core::{Pt2, Real};
use image::GrayImage;
use log::debug;
use serde::{Deserialize, Serialize};

/// Subset of the ChESS settings exposed through the pipeline config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CornerParams {
    /// Minimum response relative to the strongest one in the frame.
    pub threshold_rel: f32,
    /// Half-size of the non-maximum suppression window.
    pub nms_radius: u32,
    /// Use the radius-10 ring instead of radius 5; suits large squares.
    pub use_radius10: bool,
}

impl Default for CornerParams {
    fn default() -> Self {
        Self {
            threshold_rel: 0.2,
            nms_radius: 2,
            use_radius10: false,
        }
    }
}

impl CornerParams {
    pub fn chess_config(&self) -> ChessConfig {
        let mut cfg = ChessConfig::single_scale();
        cfg.params.threshold_rel = self.threshold_rel;
        cfg.params.nms_radius = self.nms_radius;
        cfg.params.use_radius10 = self.use_radius10;
        cfg
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerCandidate {
    pub position: Pt2,
    pub response: Real,
}

impl From<&CornerDescriptor> for CornerCandidate {
    fn from(c: &CornerDescriptor) -> Self {
        Self {
            position: Pt2::new(c.x as Real, c.y as Real),
            response: c.response as Real,
        }
    }
}

/// Detect X-junction candidates, strongest first.
pub fn detect_corners(image: &GrayImage, params: &CornerParams) -> Vec<CornerCandidate> {
    let raw = find_chess_corners_image(image, &params.chess_config());
    let mut out: Vec<CornerCandidate> = raw
        .iter()
        .map(CornerCandidate::from)
        .filter(|c| c.position.x.is_finite() && c.position.y.is_finite())
        .collect();
    out.sort_by(|a, b| b.response.total_cmp(&a.response));
    debug!("chess candidates: {}", out.len());
    out
}
