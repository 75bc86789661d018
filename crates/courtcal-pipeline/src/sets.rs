use courtcal_core::{
    CalibError, CalibResult, CameraId, ExtrinsicPose, HomographyMatrix, IntrinsicModel, Mat3, Pt3,
    ReferenceCorrespondences,
};
use std::collections::BTreeMap;

/// Immutable per-camera values produced or consumed by one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSet<T> {
    entries: BTreeMap<CameraId, T>,
}

pub type IntrinsicSet = CameraSet<IntrinsicModel>;
pub type RefinedSet = CameraSet<Mat3>;
pub type ExtrinsicSet = CameraSet<ExtrinsicPose>;
pub type HomographySet = CameraSet<HomographyMatrix>;
pub type ReferenceSet = CameraSet<ReferenceCorrespondences>;
/// Surveyed camera positions in metres.
pub type GroundTruth = CameraSet<Pt3>;

impl<T> Default for CameraSet<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> CameraSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, camera: CameraId, value: T) -> Option<T> {
        self.entries.insert(camera, value)
    }

    pub fn get(&self, camera: &CameraId) -> Option<&T> {
        self.entries.get(camera)
    }

    /// Like [`Self::get`], reporting an absent camera as missing from
    /// `artifact`.
    pub fn require(&self, camera: &CameraId, artifact: &'static str) -> CalibResult<&T> {
        self.entries.get(camera).ok_or_else(|| CalibError::MissingInput {
            camera: camera.clone(),
            artifact,
        })
    }

    pub fn contains(&self, camera: &CameraId) -> bool {
        self.entries.contains_key(camera)
    }

    pub fn cameras(&self) -> impl Iterator<Item = &CameraId> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CameraId, &T)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> CameraSet<U> {
        self.entries
            .iter()
            .map(|(id, v)| (id.clone(), f(v)))
            .collect()
    }
}

impl<T> FromIterator<(CameraId, T)> for CameraSet<T> {
    fn from_iter<I: IntoIterator<Item = (CameraId, T)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<T> IntoIterator for CameraSet<T> {
    type Item = (CameraId, T);
    type IntoIter = std::collections::btree_map::IntoIter<CameraId, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
