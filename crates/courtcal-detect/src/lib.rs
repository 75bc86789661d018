//! Chessboard corner detection for intrinsic calibration.
//!
//! Pipeline per frame:
//! 1. ChESS X-junction candidates from `chess-corners`.
//! 2. Grid growth from a seed corner along locally estimated axes, keeping
//!    the component whose extent matches the requested [`PatternSize`].
//! 3. Canonical orientation so corners follow object-point order.
//! 4. Iterative sub-pixel refinement ([`refine_corners_subpix`]).
//!
//! [`collect_observations`] scans a [`FrameSource`] with a
//! [`CollectionPolicy`] and returns the accepted views.

mod collect;
mod corners;
mod finder;
mod grid;
mod pattern;
mod plane;
mod subpix;
pub mod synthetic;

pub use collect::{collect_observations, CollectionPolicy, FrameSource};
pub use corners::{detect_corners, CornerCandidate, CornerParams};
pub use finder::{ChessGridFinder, ChessboardFinder};
pub use grid::GridParams;
pub use image::GrayImage;
pub use pattern::PatternSize;
pub use subpix::{refine_corners_subpix, SubPixParams};
