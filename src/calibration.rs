// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Disk-backed cache of subject-from-source calibration transforms.
//!
//! Some tracked subjects (cameras, drones) carry a fixed rigid transform
//! relating an attached image source to the subject's own frame. These are
//! calibrated offline and stored one file per subject; the cache loads them
//! lazily and keeps them for the process lifetime (append-only, so safe under
//! the crate's single-threaded frame loop).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use nalgebra::Matrix4;

use crate::error::{MocapError, Result};
use crate::warn;

/// Filename prefix for calibration files: `subject_from_source-<name>.txt`.
const CALIBRATION_FILE_PREFIX: &str = "subject_from_source-";

/// Load a 4x4 pose matrix from a text file (four rows of four values).
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not contain exactly
/// sixteen numbers.
pub fn load_pose(path: impl AsRef<Path>) -> Result<Matrix4<f64>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;

    let values: Vec<f64> = text
        .split_whitespace()
        .map(|token| {
            token.parse::<f64>().map_err(|_| {
                MocapError::Parse(format!(
                    "invalid pose value {token:?} in {}",
                    path.display()
                ))
            })
        })
        .collect::<Result<_>>()?;

    if values.len() != 16 {
        return Err(MocapError::Parse(format!(
            "expected 16 pose values in {}, found {}",
            path.display(),
            values.len()
        )));
    }

    Ok(Matrix4::from_row_slice(&values))
}

/// Save a 4x4 pose matrix to a text file (four rows of four values).
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_pose(path: impl AsRef<Path>, pose: &Matrix4<f64>) -> Result<()> {
    let mut text = String::new();
    for row in 0..4 {
        for col in 0..4 {
            if col > 0 {
                text.push(' ');
            }
            text.push_str(&format!("{:?}", pose[(row, col)]));
        }
        text.push('\n');
    }
    std::fs::write(path, text)?;
    Ok(())
}

/// A lazy cache of the transforms from image sources to their mocap subjects.
pub struct SubjectFromSourceCache {
    directory: PathBuf,
    subjects_from_sources: HashMap<String, Matrix4<f64>>,
}

impl SubjectFromSourceCache {
    /// Construct a cache over the directory containing the calibration files.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            subjects_from_sources: HashMap::new(),
        }
    }

    /// Try to get the subject-from-source transform for a subject.
    ///
    /// Loads the subject's calibration file on first access and caches it. A
    /// missing file means "no calibration available" and yields `None`; a
    /// malformed file is logged and likewise yields `None`.
    pub fn get(&mut self, subject_name: &str) -> Option<Matrix4<f64>> {
        if let Some(subject_from_source) = self.subjects_from_sources.get(subject_name) {
            return Some(*subject_from_source);
        }

        let filename = self
            .directory
            .join(format!("{CALIBRATION_FILE_PREFIX}{subject_name}.txt"));
        if !filename.exists() {
            return None;
        }

        match load_pose(&filename) {
            Ok(subject_from_source) => {
                self.subjects_from_sources
                    .insert(subject_name.to_string(), subject_from_source);
                Some(subject_from_source)
            }
            Err(e) => {
                warn!("Ignoring unreadable calibration for {subject_name:?}: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_pose() -> Matrix4<f64> {
        let mut pose = Matrix4::identity();
        pose[(0, 3)] = 0.25;
        pose[(1, 3)] = -1.5;
        pose[(2, 3)] = 3.0;
        pose
    }

    #[test]
    fn test_pose_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pose.txt");
        save_pose(&path, &sample_pose()).unwrap();
        let loaded = load_pose(&path).unwrap();
        assert_relative_eq!(loaded, sample_pose(), epsilon = 1e-12);
    }

    #[test]
    fn test_load_pose_rejects_wrong_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pose.txt");
        std::fs::write(&path, "1 2 3\n").unwrap();
        assert!(matches!(load_pose(&path), Err(MocapError::Parse(_))));
    }

    #[test]
    fn test_cache_returns_freshly_loaded_transform() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir
            .path()
            .join(format!("{CALIBRATION_FILE_PREFIX}Tello.txt"));
        save_pose(&path, &sample_pose()).unwrap();

        let mut cache = SubjectFromSourceCache::new(dir.path());
        // First access loads from disk; it must be returned, not just cached.
        let first = cache.get("Tello").unwrap();
        assert_relative_eq!(first, sample_pose(), epsilon = 1e-12);

        // Second access is served from memory even if the file disappears.
        std::fs::remove_file(&path).unwrap();
        assert!(cache.get("Tello").is_some());
    }

    #[test]
    fn test_missing_calibration_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = SubjectFromSourceCache::new(dir.path());
        assert!(cache.get("Nobody").is_none());
    }
}
