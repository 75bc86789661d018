//! Core math and geometry primitives for `courtcal`.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Pt2`, `Mat3`, ...) and row-major
//!   matrix conversions used by the JSON artifacts,
//! - the pinhole + Brown-Conrady camera model ([`IntrinsicModel`]),
//! - camera identifiers, length units and the world-frame transforms
//!   ([`ExtrinsicPose`], [`HomographyMatrix`]),
//! - the shared error taxonomy ([`CalibError`]).
//!
//! Camera pipeline:
//! `pixel = K ∘ distortion ∘ projection(p_camera)`

/// Camera identifiers and the default camera array.
pub mod camera_id;
/// Error taxonomy shared by every stage.
pub mod error;
/// Linear algebra type aliases and helpers.
pub mod math;
/// Pinhole camera with Brown-Conrady distortion.
pub mod models;
/// Correspondence containers.
pub mod observation;
/// Deterministic synthetic scenes for tests.
pub mod synthetic;
/// World-frame transforms produced by the solvers.
pub mod transforms;
/// Length units of stored world coordinates.
pub mod units;

pub use camera_id::*;
pub use error::*;
pub use math::*;
pub use models::*;
pub use observation::*;
pub use transforms::*;
pub use units::*;
