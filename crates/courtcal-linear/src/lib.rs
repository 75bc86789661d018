//! Closed-form calibration solvers.
//!
//! Everything here is linear (SVD-based) and deterministic: homographies,
//! Zhang intrinsics, homography → pose decomposition, PnP initialisation and
//! the undistortion-optimised camera matrix. Non-linear refinement lives in
//! `courtcal-optim`.

pub mod math;

mod homography;
mod optimal_camera_matrix;
mod planar_pose;
mod pnp;
mod zhang_intrinsics;

pub use homography::*;
pub use optimal_camera_matrix::*;
pub use planar_pose::*;
pub use pnp::*;
pub use zhang_intrinsics::*;
