// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Frame-provider abstraction over live and recorded mocap sources.
//!
//! Both variants expose the same per-frame query surface: a subject list,
//! marker positions, segment global poses (segment-from-world convention),
//! segment local rotations, and the current frame number. Every query is
//! fallible per call and degrades to "no data" rather than erroring; callers
//! must treat absence as skip/omit.

use std::collections::HashMap;

use nalgebra::{Matrix3, Matrix4, Point3};

use crate::error::Result;
use crate::geometry::make_pose;
use crate::warn;

/// The per-frame query surface shared by live and recorded mocap sources.
///
/// [`advance_frame`](FrameProvider::advance_frame) must be called before any
/// other query is meaningful, and every query reflects only the most recently
/// advanced frame. Implementations release their backing resources in
/// [`terminate`](FrameProvider::terminate), which is idempotent and also runs
/// on drop.
pub trait FrameProvider {
    /// Try to load the next frame of data. Returns whether one was available.
    fn advance_frame(&mut self) -> bool;

    /// The frame number of the currently loaded frame, if any.
    fn frame_number(&self) -> Option<u64>;

    /// The names of all subjects present in the current frame.
    fn subject_names(&self) -> Vec<String>;

    /// The visible marker positions for a subject, in metres, indexed by
    /// marker name. Empty if the subject is unknown or fully occluded.
    fn marker_positions(&self, subject_name: &str) -> HashMap<String, Point3<f64>>;

    /// The names of all segments for a subject. Empty if unknown.
    fn segment_names(&self, subject_name: &str) -> Vec<String>;

    /// The current segment-from-world transform of a segment, or `None` if the
    /// segment is occluded or unknown. Callers wanting the world placement of
    /// the segment's frame must invert this.
    fn segment_global_pose(&self, subject_name: &str, segment_name: &str) -> Option<Matrix4<f64>>;

    /// The rotation of a segment relative to its parent segment, or `None` if
    /// occluded, unknown, or unsupported by the source (older recordings).
    fn segment_local_rotation(
        &self,
        subject_name: &str,
        segment_name: &str,
    ) -> Option<Matrix3<f64>>;

    /// Release the backing resource. Idempotent; also called on drop.
    fn terminate(&mut self);
}

/// The narrow capability a live mocap driver must supply.
///
/// This mirrors the vendor datastream surface: positions arrive in
/// millimetres, and every query carries an occlusion flag (`None`) and may
/// fail transiently. The concrete client (device SDK binding, network shim,
/// test stub) lives outside this crate.
pub trait DataStreamClient {
    /// Poll the device for the next frame.
    fn get_frame(&mut self) -> Result<bool>;

    /// The frame number assigned by the device.
    fn get_frame_number(&self) -> Result<u64>;

    /// All subject names in the data stream.
    fn get_subject_names(&self) -> Result<Vec<String>>;

    /// All marker names for a subject.
    fn get_marker_names(&self, subject_name: &str) -> Result<Vec<String>>;

    /// A marker's global translation in millimetres, `None` if occluded.
    fn get_marker_global_translation(
        &self,
        subject_name: &str,
        marker_name: &str,
    ) -> Result<Option<[f64; 3]>>;

    /// All segment names for a subject.
    fn get_segment_names(&self, subject_name: &str) -> Result<Vec<String>>;

    /// A segment's global translation in millimetres, `None` if occluded.
    fn get_segment_global_translation(
        &self,
        subject_name: &str,
        segment_name: &str,
    ) -> Result<Option<[f64; 3]>>;

    /// A segment's global rotation (row-major 3x3), `None` if occluded.
    fn get_segment_global_rotation(
        &self,
        subject_name: &str,
        segment_name: &str,
    ) -> Result<Option<[[f64; 3]; 3]>>;

    /// A segment's rotation relative to its parent (row-major 3x3), `None` if
    /// occluded.
    fn get_segment_local_rotation(
        &self,
        subject_name: &str,
        segment_name: &str,
    ) -> Result<Option<[[f64; 3]; 3]>>;

    /// Disconnect from the device.
    fn disconnect(&mut self) -> Result<()>;
}

/// A [`FrameProvider`] backed by a live mocap device connection.
///
/// Transient client failures are caught here, logged, and converted into "no
/// data this call" - they never propagate to the reconstruction pipeline.
pub struct LiveProvider<C: DataStreamClient> {
    client: C,
    alive: bool,
}

impl<C: DataStreamClient> LiveProvider<C> {
    /// Wrap a connected data-stream client.
    pub fn new(client: C) -> Self {
        Self {
            client,
            alive: true,
        }
    }

    /// Convert a device-space position (millimetres) to metres.
    fn from_device_position(pos: [f64; 3]) -> Point3<f64> {
        Point3::new(pos[0], pos[1], pos[2]) / 1000.0
    }

    fn rotation_from_rows(rows: [[f64; 3]; 3]) -> Matrix3<f64> {
        Matrix3::new(
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        )
    }
}

impl<C: DataStreamClient> FrameProvider for LiveProvider<C> {
    fn advance_frame(&mut self) -> bool {
        match self.client.get_frame() {
            Ok(got_frame) => got_frame,
            Err(e) => {
                warn!("Mocap client error while advancing frame: {e}");
                false
            }
        }
    }

    fn frame_number(&self) -> Option<u64> {
        match self.client.get_frame_number() {
            Ok(frame_number) => Some(frame_number),
            Err(e) => {
                warn!("Mocap client error while reading frame number: {e}");
                None
            }
        }
    }

    fn subject_names(&self) -> Vec<String> {
        self.client.get_subject_names().unwrap_or_else(|e| {
            warn!("Mocap client error while listing subjects: {e}");
            Vec::new()
        })
    }

    fn marker_positions(&self, subject_name: &str) -> HashMap<String, Point3<f64>> {
        let marker_names = match self.client.get_marker_names(subject_name) {
            Ok(names) => names,
            Err(e) => {
                warn!("Mocap client error while listing markers for {subject_name:?}: {e}");
                return HashMap::new();
            }
        };

        let mut result = HashMap::new();
        for marker_name in marker_names {
            match self
                .client
                .get_marker_global_translation(subject_name, &marker_name)
            {
                Ok(Some(pos)) => {
                    result.insert(marker_name, Self::from_device_position(pos));
                }
                Ok(None) => {} // Occluded this frame.
                Err(e) => {
                    warn!("Mocap client error while reading marker {marker_name:?}: {e}");
                    return HashMap::new();
                }
            }
        }

        result
    }

    fn segment_names(&self, subject_name: &str) -> Vec<String> {
        self.client
            .get_segment_names(subject_name)
            .unwrap_or_else(|e| {
                warn!("Mocap client error while listing segments for {subject_name:?}: {e}");
                Vec::new()
            })
    }

    fn segment_global_pose(&self, subject_name: &str, segment_name: &str) -> Option<Matrix4<f64>> {
        let result = (|| -> Result<Option<Matrix4<f64>>> {
            let Some(translation) = self
                .client
                .get_segment_global_translation(subject_name, segment_name)?
            else {
                return Ok(None);
            };
            let Some(rotation) = self
                .client
                .get_segment_global_rotation(subject_name, segment_name)?
            else {
                return Ok(None);
            };

            // The device reports the world placement of the segment's frame;
            // the provider contract is segment-from-world, so invert.
            let world_from_segment = make_pose(
                &Self::rotation_from_rows(rotation),
                &Self::from_device_position(translation).coords,
            );
            Ok(world_from_segment.try_inverse())
        })();

        match result {
            Ok(pose) => pose,
            Err(e) => {
                warn!("Mocap client error while reading pose of {segment_name:?}: {e}");
                None
            }
        }
    }

    fn segment_local_rotation(
        &self,
        subject_name: &str,
        segment_name: &str,
    ) -> Option<Matrix3<f64>> {
        match self
            .client
            .get_segment_local_rotation(subject_name, segment_name)
        {
            Ok(rotation) => rotation.map(Self::rotation_from_rows),
            Err(e) => {
                warn!("Mocap client error while reading local rotation of {segment_name:?}: {e}");
                None
            }
        }
    }

    fn terminate(&mut self) {
        if self.alive {
            if let Err(e) = self.client.disconnect() {
                warn!("Mocap client error while disconnecting: {e}");
            }
            self.alive = false;
        }
    }
}

impl<C: DataStreamClient> Drop for LiveProvider<C> {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MocapError;
    use approx::assert_relative_eq;
    use std::cell::Cell;

    /// A client whose every query either succeeds with canned data or fails.
    struct ScriptedClient {
        fail: bool,
        disconnects: Cell<u32>,
    }

    impl ScriptedClient {
        fn healthy() -> Self {
            Self {
                fail: false,
                disconnects: Cell::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                disconnects: Cell::new(0),
            }
        }

        fn check(&self) -> Result<()> {
            if self.fail {
                Err(MocapError::Provider("link down".to_string()))
            } else {
                Ok(())
            }
        }
    }

    impl DataStreamClient for ScriptedClient {
        fn get_frame(&mut self) -> Result<bool> {
            self.check()?;
            Ok(true)
        }

        fn get_frame_number(&self) -> Result<u64> {
            self.check()?;
            Ok(42)
        }

        fn get_subject_names(&self) -> Result<Vec<String>> {
            self.check()?;
            Ok(vec!["Aylin".to_string()])
        }

        fn get_marker_names(&self, _subject_name: &str) -> Result<Vec<String>> {
            self.check()?;
            Ok(vec!["LASI".to_string(), "RASI".to_string()])
        }

        fn get_marker_global_translation(
            &self,
            _subject_name: &str,
            marker_name: &str,
        ) -> Result<Option<[f64; 3]>> {
            self.check()?;
            // RASI is occluded in the canned frame.
            if marker_name == "RASI" {
                Ok(None)
            } else {
                Ok(Some([1000.0, 2000.0, 3000.0]))
            }
        }

        fn get_segment_names(&self, _subject_name: &str) -> Result<Vec<String>> {
            self.check()?;
            Ok(vec!["Root".to_string()])
        }

        fn get_segment_global_translation(
            &self,
            _subject_name: &str,
            _segment_name: &str,
        ) -> Result<Option<[f64; 3]>> {
            self.check()?;
            Ok(Some([1000.0, 0.0, 0.0]))
        }

        fn get_segment_global_rotation(
            &self,
            _subject_name: &str,
            _segment_name: &str,
        ) -> Result<Option<[[f64; 3]; 3]>> {
            self.check()?;
            Ok(Some([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]))
        }

        fn get_segment_local_rotation(
            &self,
            _subject_name: &str,
            _segment_name: &str,
        ) -> Result<Option<[[f64; 3]; 3]>> {
            self.check()?;
            Ok(Some([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]))
        }

        fn disconnect(&mut self) -> Result<()> {
            self.disconnects.set(self.disconnects.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn test_positions_converted_to_metres_and_occlusions_skipped() {
        let provider = LiveProvider::new(ScriptedClient::healthy());
        let markers = provider.marker_positions("Aylin");
        assert_eq!(markers.len(), 1);
        assert_relative_eq!(markers["LASI"], Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_segment_pose_is_inverted_world_placement() {
        let provider = LiveProvider::new(ScriptedClient::healthy());
        let pose = provider.segment_global_pose("Aylin", "Root").unwrap();
        // World placement is identity rotation at (1, 0, 0) metres, so the
        // segment-from-world transform translates by (-1, 0, 0).
        assert_relative_eq!(
            pose.fixed_view::<3, 1>(0, 3).into_owned(),
            nalgebra::Vector3::new(-1.0, 0.0, 0.0)
        );
    }

    #[test]
    fn test_client_failures_become_empty_results() {
        let mut provider = LiveProvider::new(ScriptedClient::failing());
        assert!(!provider.advance_frame());
        assert_eq!(provider.frame_number(), None);
        assert!(provider.subject_names().is_empty());
        assert!(provider.marker_positions("Aylin").is_empty());
        assert!(provider.segment_names("Aylin").is_empty());
        assert!(provider.segment_global_pose("Aylin", "Root").is_none());
        assert!(provider.segment_local_rotation("Aylin", "Root").is_none());
    }

    #[test]
    fn test_terminate_is_idempotent() {
        let mut provider = LiveProvider::new(ScriptedClient::healthy());
        provider.terminate();
        provider.terminate();
        assert_eq!(provider.client.disconnects.get(), 1);
        // Drop must not disconnect again after an explicit terminate.
        drop(provider);
    }
}
