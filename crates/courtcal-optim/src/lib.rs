//! Non-linear least-squares refinement built on `levenberg-marquardt`.
//!
//! Problems implement [`NllsProblem`]; [`LmBackend`] solves them. The three
//! calibration problems are the planar intrinsics bundle, single-camera pose
//! refinement (PnP) and robust homography refinement.

pub mod backend_lm;
pub mod homography_refine;
pub mod planar_intrinsics;
pub mod pose_refine;
pub mod robust;
mod traits;

pub use backend_lm::LmBackend;
pub use robust::RobustKernel;
pub use traits::*;
