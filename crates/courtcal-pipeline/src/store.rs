//! JSON artifacts keyed by camera id.
//!
//! Loaders accept every shape the artifacts have been written in. Commits
//! refuse incomplete batches and write all files of a stage through
//! temporary files in the target directory, renaming them into place only
//! once every file has been written. If one of those renames fails, the
//! files already replaced are restored from backups taken beforehand. The
//! renames themselves are atomic one by one, not as a group, so a crash
//! between two of them can still leave a mixed stage.

use crate::batch::BatchReport;
use crate::extrinsic::ExtrinsicSolution;
use crate::homography::HomographySolution;
use crate::intrinsic::IntrinsicCalibration;
use crate::sets::{
    ExtrinsicSet, GroundTruth, HomographySet, IntrinsicSet, ReferenceSet, RefinedSet,
};
use anyhow::{Context, Result};
use courtcal_core::{
    mat3_from_rows, mat3_to_rows, mat4_from_rows, mat4_to_rows, CameraId, ExtrinsicPose,
    HomographyMatrix, IntrinsicModel, LengthUnit, Pt2, Pt3, Real, ReferenceCorrespondences,
};
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

type Rows3 = [[Real; 3]; 3];
type Rows4 = [[Real; 4]; 4];

/// A stage result with failed cameras cannot be committed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{stage} stage failed for cameras {failed:?}; nothing written")]
pub struct IncompleteBatch {
    pub stage: &'static str,
    pub failed: Vec<CameraId>,
}

/// OpenCV writes distortion vectors as a 1×N matrix; older files are flat.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DistortionEntry {
    Flat(Vec<Real>),
    Nested(Vec<Vec<Real>>),
}

impl DistortionEntry {
    fn into_coeffs(self) -> Vec<Real> {
        match self {
            DistortionEntry::Flat(v) => v,
            DistortionEntry::Nested(rows) => rows.into_iter().flatten().collect(),
        }
    }
}

/// Directory holding the calibration artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub const INTRINSIC: &'static str = "intrinsic.json";
    pub const INTRINSIC_REFINED: &'static str = "intrinsic_refined.json";
    pub const DISTORTIONS: &'static str = "distortions.json";
    pub const IMAGE_POINTS: &'static str = "extrinsic_image_points.json";
    pub const WORLD_POINTS: &'static str = "extrinsic_world_points.json";
    pub const EXTRINSIC: &'static str = "extrinsic.json";
    pub const HOMOGRAPHY: &'static str = "homography.json";
    pub const GROUND_TRUTH: &'static str = "ground_truth_cameras.json";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, artifact: &str) -> PathBuf {
        self.root.join(artifact)
    }

    fn read<T: DeserializeOwned>(&self, artifact: &str) -> Result<BTreeMap<CameraId, T>> {
        let path = self.path(artifact);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
    }

    /// Camera matrices merged with their distortion vectors.
    pub fn load_intrinsics(&self) -> Result<IntrinsicSet> {
        let matrices: BTreeMap<CameraId, Rows3> = self.read(Self::INTRINSIC)?;
        let mut distortions: BTreeMap<CameraId, DistortionEntry> = self.read(Self::DISTORTIONS)?;

        let mut set = IntrinsicSet::new();
        for (camera, rows) in matrices {
            let Some(dist) = distortions.remove(&camera) else {
                warn!("camera {camera} has a camera matrix but no distortion vector; skipped");
                continue;
            };
            let model = IntrinsicModel::from_parts(&mat3_from_rows(&rows), &dist.into_coeffs())
                .with_context(|| format!("intrinsics of camera {camera}"))?;
            set.insert(camera, model);
        }
        Ok(set)
    }

    pub fn load_refined(&self) -> Result<RefinedSet> {
        let rows: BTreeMap<CameraId, Rows3> = self.read(Self::INTRINSIC_REFINED)?;
        Ok(rows
            .into_iter()
            .map(|(camera, r)| (camera, mat3_from_rows(&r)))
            .collect())
    }

    /// Image/world reference pairs; world entries are `[x, y]` or `[x, y, z]`.
    pub fn load_references(&self) -> Result<ReferenceSet> {
        let image: BTreeMap<CameraId, Vec<[Real; 2]>> = self.read(Self::IMAGE_POINTS)?;
        let mut world: BTreeMap<CameraId, Vec<Vec<Real>>> = self.read(Self::WORLD_POINTS)?;

        let mut set = ReferenceSet::new();
        for (camera, pixels) in image {
            let Some(points) = world.remove(&camera) else {
                warn!("camera {camera} has image points but no world points; skipped");
                continue;
            };
            let world_points = points
                .iter()
                .map(|p| match p.as_slice() {
                    [x, y] => Ok(Pt3::new(*x, *y, 0.0)),
                    [x, y, z] => Ok(Pt3::new(*x, *y, *z)),
                    other => Err(anyhow::anyhow!(
                        "world point of camera {camera} has {} coordinates",
                        other.len()
                    )),
                })
                .collect::<Result<Vec<_>>>()?;
            let image_points = pixels.iter().map(|&[u, v]| Pt2::new(u, v)).collect();
            let refs = ReferenceCorrespondences::new(image_points, world_points)
                .with_context(|| format!("reference points of camera {camera}"))?;
            set.insert(camera, refs);
        }
        Ok(set)
    }

    pub fn load_extrinsics(&self) -> Result<ExtrinsicSet> {
        let rows: BTreeMap<CameraId, Rows4> = self.read(Self::EXTRINSIC)?;
        let mut set = ExtrinsicSet::new();
        for (camera, r) in rows {
            let pose = ExtrinsicPose::from_matrix(mat4_from_rows(&r))
                .with_context(|| format!("extrinsic of camera {camera}"))?;
            set.insert(camera, pose);
        }
        Ok(set)
    }

    /// Homographies whose world side is in `unit`.
    pub fn load_homographies(&self, unit: LengthUnit) -> Result<HomographySet> {
        let rows: BTreeMap<CameraId, Rows3> = self.read(Self::HOMOGRAPHY)?;
        let mut set = HomographySet::new();
        for (camera, r) in rows {
            let h = HomographyMatrix::new(mat3_from_rows(&r), unit)
                .with_context(|| format!("homography of camera {camera}"))?;
            set.insert(camera, h);
        }
        Ok(set)
    }

    pub fn load_ground_truth(&self) -> Result<GroundTruth> {
        let rows: BTreeMap<CameraId, [Real; 3]> = self.read(Self::GROUND_TRUTH)?;
        Ok(rows
            .into_iter()
            .map(|(camera, [x, y, z])| (camera, Pt3::new(x, y, z)))
            .collect())
    }

    /// Write `intrinsic.json`, `distortions.json` and `intrinsic_refined.json`.
    pub fn commit_intrinsics(&self, report: &BatchReport<IntrinsicCalibration>) -> Result<()> {
        ensure_complete("intrinsic", report)?;
        let ok = &report.succeeded;
        self.write_all(vec![
            (Self::INTRINSIC, to_json(&collect(ok, |c| mat3_to_rows(&c.model.camera_matrix())))?),
            (Self::DISTORTIONS, to_json(&collect(ok, |c| [c.model.dist.coeffs()]))?),
            (Self::INTRINSIC_REFINED, to_json(&collect(ok, |c| mat3_to_rows(&c.refined.matrix)))?),
        ])
    }

    pub fn commit_extrinsics(&self, report: &BatchReport<ExtrinsicSolution>) -> Result<()> {
        ensure_complete("extrinsic", report)?;
        let rows = collect(&report.succeeded, |s| mat4_to_rows(s.pose.matrix()));
        self.write_all(vec![(Self::EXTRINSIC, to_json(&rows)?)])
    }

    pub fn commit_homographies(&self, report: &BatchReport<HomographySolution>) -> Result<()> {
        ensure_complete("homography", report)?;
        let rows = collect(&report.succeeded, |s| mat3_to_rows(s.homography.matrix()));
        self.write_all(vec![(Self::HOMOGRAPHY, to_json(&rows)?)])
    }

    fn write_all(&self, files: Vec<(&'static str, String)>) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("creating {}", self.root.display()))?;

        let mut staged = Vec::with_capacity(files.len());
        for (name, contents) in files {
            let mut tmp = NamedTempFile::new_in(&self.root)
                .with_context(|| format!("staging {name} in {}", self.root.display()))?;
            tmp.write_all(contents.as_bytes())
                .with_context(|| format!("writing {name}"))?;
            tmp.as_file()
                .sync_all()
                .with_context(|| format!("flushing {name}"))?;
            staged.push((name, tmp));
        }

        // previous contents, so a rename failing halfway can be undone
        let mut backups = Vec::with_capacity(staged.len());
        for (name, _) in &staged {
            let target = self.path(name);
            let backup = if target.is_file() {
                let copy = NamedTempFile::new_in(&self.root)
                    .with_context(|| format!("backing up {name}"))?;
                fs::copy(&target, copy.path()).with_context(|| format!("backing up {name}"))?;
                Some(copy)
            } else {
                None
            };
            backups.push(backup);
        }

        let mut replaced = Vec::with_capacity(staged.len());
        for ((name, tmp), backup) in staged.into_iter().zip(backups) {
            let target = self.path(name);
            if let Err(err) = tmp.persist(&target) {
                roll_back(replaced);
                return Err(err.error).with_context(|| format!("replacing {}", target.display()));
            }
            info!("wrote {}", target.display());
            replaced.push((target, backup));
        }
        Ok(())
    }
}

/// Put back what a partially applied commit overwrote.
fn roll_back(replaced: Vec<(PathBuf, Option<NamedTempFile>)>) {
    for (target, backup) in replaced.into_iter().rev() {
        let restored = match backup {
            Some(previous) => previous.persist(&target).map(drop).map_err(|e| e.error),
            None => fs::remove_file(&target),
        };
        match restored {
            Ok(()) => warn!("rolled back {}", target.display()),
            Err(err) => warn!("could not roll back {}: {err}", target.display()),
        }
    }
}

fn ensure_complete<T>(stage: &'static str, report: &BatchReport<T>) -> Result<()> {
    if report.is_complete() {
        return Ok(());
    }
    Err(IncompleteBatch {
        stage,
        failed: report.failed.keys().cloned().collect(),
    }
    .into())
}

fn collect<T, U>(set: &crate::sets::CameraSet<T>, f: impl Fn(&T) -> U) -> BTreeMap<CameraId, U> {
    set.iter().map(|(camera, v)| (camera.clone(), f(v))).collect()
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("serialising artifact")
}
