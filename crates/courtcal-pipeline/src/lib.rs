//! Calibration stages and the cross-camera point mapper.
//!
//! Stages take immutable inputs and return new values:
//! - [`calibrate_intrinsics`]: chessboard views → [`IntrinsicModel`](courtcal_core::IntrinsicModel)
//!   plus an advisory refined camera matrix,
//! - [`solve_extrinsic`]: intrinsics + reference points → camera-in-world pose,
//! - [`solve_homography`]: reference points → image/ground-plane homography.
//!
//! Batch drivers run a stage over every configured camera and collect
//! per-camera failures in a [`BatchReport`]; [`ArtifactStore`] persists a
//! complete report atomically. [`transfer_point`] and [`display_markers`]
//! implement the point mapper on top of stored homographies.

mod batch;
mod config;
mod evaluate;
mod extrinsic;
mod homography;
mod interactive;
mod intrinsic;
mod layout;
mod mapper;
mod sets;
mod store;

pub use batch::{
    run_extrinsic_stage, run_homography_stage, run_intrinsic_stage, run_per_camera, BatchReport,
};
pub use config::PipelineConfig;
pub use evaluate::{camera_positions, evaluate_positions, AxisStats, PositionErrors};
pub use extrinsic::{solve_extrinsic, ExtrinsicSolution};
pub use homography::{solve_homography, HomographySolution};
pub use interactive::{Frame, InteractionSurface, InteractiveSession, SessionResult, Stage};
pub use intrinsic::{calibrate_camera_from_frames, calibrate_intrinsics, IntrinsicCalibration};
pub use layout::{GridLayout, TileCell};
pub use mapper::{display_markers, transfer_point, DisplayMarkers, DisplayScale, Transfer};
pub use sets::{
    CameraSet, ExtrinsicSet, GroundTruth, HomographySet, IntrinsicSet, ReferenceSet, RefinedSet,
};
pub use store::{ArtifactStore, IncompleteBatch};
