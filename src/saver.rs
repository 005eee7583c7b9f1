// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Saving provider frames to disk for later offline playback.

use std::path::{Path, PathBuf};

use crate::error::{MocapError, Result};
use crate::format::{write_frame, FrameData, SubjectRecord};
use crate::provider::FrameProvider;

/// Writes frames of mocap data to a folder in the recorded-frame format.
///
/// Each saved frame becomes one `<frame_number>.txt` file that
/// [`OfflineProvider`](crate::OfflineProvider) can replay. The folder is
/// created on construction if it does not exist.
pub struct FrameSaver {
    folder: PathBuf,
}

impl FrameSaver {
    /// Create a frame saver targeting `folder`.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be created.
    pub fn new(folder: impl Into<PathBuf>) -> Result<Self> {
        let folder = folder.into();
        std::fs::create_dir_all(&folder)?;
        Ok(Self { folder })
    }

    /// The folder frames are written to.
    #[must_use]
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Save the provider's current frame to disk.
    ///
    /// Snapshots every subject: its visible markers, and for every segment its
    /// global pose and local rotation with occlusions recorded as `None`, so
    /// the presence/absence pattern survives a round trip through disk.
    ///
    /// # Errors
    ///
    /// Returns an error if no frame is currently loaded or the file cannot be
    /// written.
    pub fn save_frame(&self, provider: &dyn FrameProvider) -> Result<()> {
        let frame_number = provider.frame_number().ok_or_else(|| {
            MocapError::Config("cannot save: provider has no frame loaded".to_string())
        })?;

        let mut frame = FrameData::new();
        for subject_name in provider.subject_names() {
            let mut record = SubjectRecord {
                marker_positions: provider
                    .marker_positions(&subject_name)
                    .into_iter()
                    .collect(),
                ..SubjectRecord::default()
            };

            for segment_name in provider.segment_names(&subject_name) {
                record.segment_poses.insert(
                    segment_name.clone(),
                    provider.segment_global_pose(&subject_name, &segment_name),
                );
                record.segment_local_rotations.insert(
                    segment_name.clone(),
                    provider.segment_local_rotation(&subject_name, &segment_name),
                );
            }

            frame.insert(subject_name, record);
        }

        let path = self.folder.join(format!("{frame_number}.txt"));
        std::fs::write(path, write_frame(&frame))?;
        Ok(())
    }
}
