use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Opaque camera identifier (`"1"`, `"12"`, ...).
///
/// Identifiers are keys, never ordinal indices: the array is non-contiguous.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CameraId(String);

impl CameraId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CameraId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<u32> for CameraId {
    fn from(n: u32) -> Self {
        Self(n.to_string())
    }
}

impl FromStr for CameraId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().to_owned()))
    }
}

/// The ten cameras around the court.
pub fn default_camera_set() -> Vec<CameraId> {
    [1u32, 2, 3, 4, 5, 6, 7, 8, 12, 13]
        .into_iter()
        .map(CameraId::from)
        .collect()
}
