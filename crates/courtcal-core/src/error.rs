use crate::CameraId;
use thiserror::Error;

/// Failure modes of the calibration stages.
///
/// Each variant is fatal for the camera (or mapping call) it was raised for;
/// batch drivers record it and continue with the remaining cameras. Points
/// falling outside a camera's frame are not errors and never appear here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibError {
    #[error("insufficient data for {what}: need at least {needed}, got {got}")]
    InsufficientData {
        what: &'static str,
        needed: usize,
        got: usize,
    },
    #[error("numeric divergence: {0}")]
    NumericDivergence(String),
    #[error("camera {0} is not part of the grid layout")]
    UnknownCamera(CameraId),
    #[error("camera {camera} is missing from {artifact}")]
    MissingInput {
        camera: CameraId,
        artifact: &'static str,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("frame {index} unavailable: {reason}")]
    FrameUnavailable { index: usize, reason: String },
}

impl CalibError {
    pub fn divergence(msg: impl Into<String>) -> Self {
        CalibError::NumericDivergence(msg.into())
    }

    pub fn insufficient(what: &'static str, needed: usize, got: usize) -> Self {
        CalibError::InsufficientData { what, needed, got }
    }
}

/// Result alias used by the solver crates.
pub type CalibResult<T> = Result<T, CalibError>;
