use crate::corners::{detect_corners, CornerParams};
use crate::grid::{assemble_grid, GridParams};
use crate::PatternSize;
use courtcal_core::Pt2;
use image::GrayImage;
use log::debug;
use serde::{Deserialize, Serialize};

/// Locates the inner corners of a chessboard in a grayscale frame.
///
/// On success the corners are returned in object-point order (row-major,
/// x fastest) at roughly pixel accuracy; sub-pixel refinement is a separate
/// step.
pub trait ChessboardFinder {
    fn find(&self, image: &GrayImage, pattern: PatternSize) -> Option<Vec<Pt2>>;
}

/// ChESS corner candidates followed by grid growth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChessGridFinder {
    pub corners: CornerParams,
    pub grid: GridParams,
}

impl ChessboardFinder for ChessGridFinder {
    fn find(&self, image: &GrayImage, pattern: PatternSize) -> Option<Vec<Pt2>> {
        if pattern.validate().is_err() {
            return None;
        }
        let candidates = detect_corners(image, &self.corners);
        if candidates.len() < pattern.count() {
            debug!(
                "only {} corner candidates for a {}x{} pattern",
                candidates.len(),
                pattern.per_row,
                pattern.rows
            );
            return None;
        }
        let points: Vec<Pt2> = candidates.iter().map(|c| c.position).collect();
        assemble_grid(&points, pattern, &self.grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{render_board_view, small_camera, tilted_board_pose};
    use crate::{refine_corners_subpix, SubPixParams};
    use courtcal_core::synthetic::project_points;
    use courtcal_core::{BrownConrady5, ImageSize};

    #[test]
    fn finds_rendered_board_in_object_order() {
        let pattern = PatternSize::new(7, 5);
        let camera = small_camera(BrownConrady5::default());
        let pose = tilted_board_pose(pattern, 0.2, -0.15, 14.0);
        let img = render_board_view(&camera, ImageSize::new(640, 480), &pose, pattern);
        let truth = project_points(&camera, &pose, &pattern.object_points()).unwrap();

        let found = ChessGridFinder::default().find(&img, pattern).unwrap();
        assert_eq!(found.len(), pattern.count());
        for (f, t) in found.iter().zip(&truth) {
            assert!((f - t).norm() < 1.5, "coarse {f} vs {t}");
        }

        let refined = refine_corners_subpix(&img, &found, &SubPixParams::default());
        for (r, t) in refined.iter().zip(&truth) {
            assert!((r - t).norm() < 0.2, "refined {r} vs {t}");
        }
    }

    #[test]
    fn wrong_pattern_size_is_not_found() {
        let camera = small_camera(BrownConrady5::default());
        let pose = tilted_board_pose(PatternSize::new(7, 5), 0.1, 0.1, 14.0);
        let img = render_board_view(&camera, ImageSize::new(640, 480), &pose, PatternSize::new(7, 5));
        assert!(ChessGridFinder::default()
            .find(&img, PatternSize::new(9, 6))
            .is_none());
    }

    #[test]
    fn blank_frame_is_not_found() {
        let img = GrayImage::from_pixel(320, 240, image::Luma([200]));
        assert!(ChessGridFinder::default()
            .find(&img, PatternSize::default())
            .is_none());
    }
}
