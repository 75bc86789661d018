use anyhow::{Context, Result};
use courtcal_core::{CalibError, CalibResult};
use courtcal_detect::{FrameSource, GrayImage};
use std::fs;
use std::path::{Path, PathBuf};

const EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Frames of one camera stored as image files, ordered by file name.
#[derive(Debug, Clone)]
pub struct DirectoryFrameSource {
    files: Vec<PathBuf>,
}

impl DirectoryFrameSource {
    pub fn open(dir: &Path) -> Result<Self> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
            if is_image {
                files.push(path);
            }
        }
        files.sort();
        log::debug!("{}: {} frames", dir.display(), files.len());
        Ok(Self { files })
    }
}

impl FrameSource for DirectoryFrameSource {
    fn frame_count(&self) -> usize {
        self.files.len()
    }

    fn frame(&self, index: usize) -> CalibResult<GrayImage> {
        let path = self.files.get(index).ok_or_else(|| CalibError::FrameUnavailable {
            index,
            reason: format!("only {} frames", self.files.len()),
        })?;
        let img = image::open(path).map_err(|e| CalibError::FrameUnavailable {
            index,
            reason: format!("{}: {e}", path.display()),
        })?;
        Ok(img.to_luma8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn frames_are_sorted_and_grayscale() {
        let dir = tempfile::tempdir().unwrap();
        for (name, value) in [("b.png", 200u8), ("a.png", 10)] {
            GrayImage::from_pixel(8, 6, Luma([value]))
                .save(dir.path().join(name))
                .unwrap();
        }
        fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let source = DirectoryFrameSource::open(dir.path()).unwrap();
        assert_eq!(source.frame_count(), 2);
        let first = source.frame(0).unwrap();
        assert_eq!(first.dimensions(), (8, 6));
        assert_eq!(first.get_pixel(0, 0).0, [10]);
        assert!(matches!(
            source.frame(2),
            Err(CalibError::FrameUnavailable { index: 2, .. })
        ));
    }

    #[test]
    fn unreadable_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.png"), b"not a png").unwrap();
        let source = DirectoryFrameSource::open(dir.path()).unwrap();
        assert!(matches!(
            source.frame(0),
            Err(CalibError::FrameUnavailable { index: 0, .. })
        ));
    }
}
