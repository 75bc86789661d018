use crate::layout::GridLayout;
use crate::mapper::DisplayScale;
use anyhow::{Context, Result};
use courtcal_core::{default_camera_set, CameraId, ImageSize, LengthUnit, Real};
use courtcal_detect::{ChessGridFinder, CollectionPolicy, PatternSize, SubPixParams};
use courtcal_optim::{RobustKernel, SolveOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Settings shared by every stage. Every field has a default, so a config
/// file only needs the values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub cameras: Vec<CameraId>,
    /// Per-camera chessboard sizes; cameras not listed use `default_pattern`.
    pub patterns: BTreeMap<CameraId, PatternSize>,
    pub default_pattern: PatternSize,
    pub collection: CollectionPolicy,
    pub finder: ChessGridFinder,
    pub subpix: SubPixParams,
    /// Unit of the surveyed world reference points.
    pub world_unit: LengthUnit,
    /// Free scaling parameter of the refined camera matrix.
    pub alpha: Real,
    pub intrinsic_solve: SolveOptions,
    pub pose_solve: SolveOptions,
    pub homography_solve: SolveOptions,
    pub homography_kernel: RobustKernel,
    pub native_resolution: ImageSize,
    pub display_resolution: ImageSize,
    pub layout: GridLayout,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cameras: default_camera_set(),
            patterns: [5u32, 6, 8]
                .into_iter()
                .map(|id| (CameraId::from(id), PatternSize::new(9, 6)))
                .collect(),
            default_pattern: PatternSize::new(7, 5),
            collection: CollectionPolicy::default(),
            finder: ChessGridFinder::default(),
            subpix: SubPixParams::default(),
            world_unit: LengthUnit::Millimeters,
            alpha: 1.0,
            intrinsic_solve: SolveOptions::default(),
            pose_solve: SolveOptions::default(),
            homography_solve: SolveOptions::default(),
            homography_kernel: RobustKernel::Huber { delta: 50.0 },
            native_resolution: ImageSize::new(3840, 2160),
            display_resolution: ImageSize::new(1920, 1080),
            layout: GridLayout::default(),
        }
    }
}

impl PipelineConfig {
    pub fn pattern_for(&self, camera: &CameraId) -> PatternSize {
        self.patterns
            .get(camera)
            .copied()
            .unwrap_or(self.default_pattern)
    }

    pub fn display_scale(&self) -> DisplayScale {
        DisplayScale::new(self.native_resolution, self.display_resolution)
    }

    /// Read a JSON config; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("parsing config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_specific_patterns() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.pattern_for(&"5".into()), PatternSize::new(9, 6));
        assert_eq!(cfg.pattern_for(&"8".into()), PatternSize::new(9, 6));
        assert_eq!(cfg.pattern_for(&"7".into()), PatternSize::new(7, 5));
        assert_eq!(cfg.cameras.len(), 10);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: PipelineConfig = serde_json::from_str(
            r#"{"world_unit": "meters", "collection": {"stride_on_success": 5}}"#,
        )
        .unwrap();
        assert_eq!(cfg.world_unit, LengthUnit::Meters);
        assert_eq!(cfg.collection, CollectionPolicy::spanning());
        assert_eq!(cfg.homography_kernel, RobustKernel::Huber { delta: 50.0 });
        assert_eq!(cfg.alpha, 1.0);
    }

    #[test]
    fn json_roundtrip() {
        let cfg = PipelineConfig::default();
        let json = serde_json::to_string_pretty(&cfg).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.cameras, cfg.cameras);
        assert_eq!(back.patterns, cfg.patterns);
        assert_eq!(back.layout, cfg.layout);
        assert_eq!(back.native_resolution, cfg.native_resolution);
    }
}
