// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Playback of recorded mocap sessions from a folder on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use nalgebra::{Matrix3, Matrix4, Point3};

use crate::error::{MocapError, Result};
use crate::format::{parse_frame, FrameData};
use crate::provider::FrameProvider;
use crate::{error, verbose};

/// A [`FrameProvider`] that replays frames previously saved to disk.
///
/// The folder is scanned once at construction for `<frame_number>.txt` files,
/// which are replayed in order of their embedded frame number (not lexical
/// filename order, so frame 9 precedes frame 10). Each call to
/// [`advance_frame`](FrameProvider::advance_frame) loads one file; when the
/// recording is exhausted it returns `false`, which is the normal end-of-data
/// signal rather than an error.
pub struct OfflineProvider {
    frame_files: Vec<(u64, PathBuf)>,
    next_frame_idx: usize,
    frame_number: Option<u64>,
    subjects: FrameData,
    last_error: Option<MocapError>,
}

impl OfflineProvider {
    /// Open a recording folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be read or is not a directory.
    /// Files whose names are not `<integer>.txt` are ignored.
    pub fn new(folder: impl AsRef<Path>) -> Result<Self> {
        let folder = folder.as_ref();
        if !folder.is_dir() {
            return Err(MocapError::Config(format!(
                "not a recording folder: {}",
                folder.display()
            )));
        }

        let mut frame_files: Vec<(u64, PathBuf)> = std::fs::read_dir(folder)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter_map(|path| Some((frame_number_of(&path)?, path)))
            .collect();
        frame_files.sort_by_key(|(frame_number, _)| *frame_number);

        verbose!(
            "Opened recording with {} frame(s): {}",
            frame_files.len(),
            folder.display()
        );

        Ok(Self {
            frame_files,
            next_frame_idx: 0,
            frame_number: None,
            subjects: FrameData::new(),
            last_error: None,
        })
    }

    /// The number of frame files found in the recording.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frame_files.len()
    }

    /// The parse error that caused the most recent `advance_frame` to fail,
    /// if any. Exhausting the recording does not set this.
    #[must_use]
    pub fn last_error(&self) -> Option<&MocapError> {
        self.last_error.as_ref()
    }

    fn load_frame(path: &Path) -> Result<FrameData> {
        let text = std::fs::read_to_string(path)?;
        parse_frame(&text).map_err(|e| match e {
            MocapError::Parse(msg) => {
                MocapError::Parse(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }
}

impl FrameProvider for OfflineProvider {
    fn advance_frame(&mut self) -> bool {
        self.last_error = None;

        let Some((frame_number, path)) = self.frame_files.get(self.next_frame_idx) else {
            // Recording exhausted.
            self.frame_number = None;
            self.subjects = FrameData::new();
            return false;
        };

        match Self::load_frame(path) {
            Ok(subjects) => {
                self.frame_number = Some(*frame_number);
                self.subjects = subjects;
                self.next_frame_idx += 1;
                true
            }
            Err(e) => {
                error!("Failed to load recorded frame: {e}");
                self.frame_number = None;
                self.subjects = FrameData::new();
                self.last_error = Some(e);
                false
            }
        }
    }

    fn frame_number(&self) -> Option<u64> {
        self.frame_number
    }

    fn subject_names(&self) -> Vec<String> {
        self.subjects.keys().cloned().collect()
    }

    fn marker_positions(&self, subject_name: &str) -> HashMap<String, Point3<f64>> {
        self.subjects.get(subject_name).map_or_else(HashMap::new, |subject| {
            subject
                .marker_positions
                .iter()
                .map(|(name, position)| (name.clone(), *position))
                .collect()
        })
    }

    fn segment_names(&self, subject_name: &str) -> Vec<String> {
        self.subjects.get(subject_name).map_or_else(Vec::new, |subject| {
            subject.segment_poses.keys().cloned().collect()
        })
    }

    fn segment_global_pose(&self, subject_name: &str, segment_name: &str) -> Option<Matrix4<f64>> {
        self.subjects
            .get(subject_name)
            .and_then(|subject| subject.segment_poses.get(segment_name))
            .copied()
            .flatten()
    }

    fn segment_local_rotation(
        &self,
        subject_name: &str,
        segment_name: &str,
    ) -> Option<Matrix3<f64>> {
        self.subjects
            .get(subject_name)
            .and_then(|subject| subject.segment_local_rotations.get(segment_name))
            .copied()
            .flatten()
    }

    fn terminate(&mut self) {
        // No backing resource beyond the scanned file list.
        self.frame_files.clear();
        self.next_frame_idx = 0;
        self.frame_number = None;
        self.subjects = FrameData::new();
    }
}

/// Extract the embedded frame number from a `<frame_number>.txt` path.
fn frame_number_of(path: &Path) -> Option<u64> {
    if path.extension()?.to_str()? != "txt" {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::fs;

    const FRAME: &str = "Subject: Aylin\n\
        Marker Positions: {'LASI': array([0.1, 0.2, 0.3])}\n\
        Segment Poses: {'Root': array([1., 0., 0., 0., 0., 1., 0., 0., 0., 0., 1., 0., 0., 0., 0., 1.]), 'L_Femur': None}\n\
        Segment Local Rotations: {'Root': None, 'L_Femur': None}\n\
        \n";

    #[test]
    fn test_frames_ordered_by_number_not_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("10.txt"), FRAME).unwrap();
        fs::write(dir.path().join("9.txt"), FRAME).unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let mut provider = OfflineProvider::new(dir.path()).unwrap();
        assert_eq!(provider.frame_count(), 2);

        assert!(provider.advance_frame());
        assert_eq!(provider.frame_number(), Some(9));
        assert!(provider.advance_frame());
        assert_eq!(provider.frame_number(), Some(10));

        // Exhaustion is a normal boolean result.
        assert!(!provider.advance_frame());
        assert_eq!(provider.frame_number(), None);
        assert!(provider.last_error().is_none());
    }

    #[test]
    fn test_queries_reflect_loaded_frame() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("1.txt"), FRAME).unwrap();

        let mut provider = OfflineProvider::new(dir.path()).unwrap();
        assert!(provider.advance_frame());

        assert_eq!(provider.subject_names(), vec!["Aylin".to_string()]);
        let markers = provider.marker_positions("Aylin");
        assert_relative_eq!(markers["LASI"], Point3::new(0.1, 0.2, 0.3));

        let mut segments = provider.segment_names("Aylin");
        segments.sort();
        assert_eq!(segments, vec!["L_Femur".to_string(), "Root".to_string()]);

        assert!(provider.segment_global_pose("Aylin", "Root").is_some());
        assert!(provider.segment_global_pose("Aylin", "L_Femur").is_none());
        assert!(provider.segment_local_rotation("Aylin", "Root").is_none());

        // Unknown subjects degrade to empty results, never errors.
        assert!(provider.marker_positions("Nobody").is_empty());
        assert!(provider.segment_names("Nobody").is_empty());
        assert!(provider.segment_global_pose("Nobody", "Root").is_none());
    }

    #[test]
    fn test_malformed_frame_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("1.txt"), "Subject: A\ngarbage\n").unwrap();

        let mut provider = OfflineProvider::new(dir.path()).unwrap();
        assert!(!provider.advance_frame());
        assert!(matches!(provider.last_error(), Some(MocapError::Parse(_))));
    }

    #[test]
    fn test_missing_folder_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-folder");
        assert!(matches!(
            OfflineProvider::new(missing),
            Err(MocapError::Config(_))
        ));
    }
}
