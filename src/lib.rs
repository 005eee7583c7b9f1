// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]

//! # Mocap Skeletons Library
//!
//! Skeleton reconstruction from optical motion-capture data, written in Rust.
//! The library turns per-frame marker positions and segment poses from a
//! mocap system into articulated skeletons: named keypoints, bones, global
//! keypoint poses, and per-joint local rotations.
//!
//! ## Features
//!
//! - **Frame Providers** - A common [`FrameProvider`] interface over live
//!   data streams and recorded sessions played back from disk
//! - **Skeleton Detection** - [`SkeletonDetector`] builds skeletons from
//!   marker positions, with configurable pose reconstruction
//! - **Marker Hallucination** - Completes a missing pelvis marker from the
//!   other three via planar trapezium completion
//! - **Subject Designation** - Ranks designatable subjects by distance to
//!   each skeleton's right-arm pointing ray
//! - **Frame Recording** - [`FrameSaver`] writes frames in a text format the
//!   offline provider reads back, including a legacy layout
//! - **Source Calibration** - Lazy disk-backed cache of subject-from-source
//!   rigid transforms
//!
//! ## Quick Start (Library)
//!
//! ```no_run
//! use mocap_skeletons::{FrameProvider, OfflineProvider, SkeletonDetector};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut provider = OfflineProvider::new("recordings/session-01")?;
//!     let detector = SkeletonDetector::default();
//!
//!     while provider.advance_frame() {
//!         let skeletons = detector.detect_skeletons(&provider);
//!         for (subject_name, skeleton) in &skeletons {
//!             println!("{subject_name}: {} keypoints", skeleton.keypoints().len());
//!         }
//!     }
//!
//!     provider.terminate();
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Replay a recorded session
//! mocap-skeletons play recordings/session-01
//!
//! # Replay with subject designations
//! mocap-skeletons play recordings/session-01 --designations
//!
//! # Convert a legacy recording to the current layout
//! mocap-skeletons play recordings/legacy --resave recordings/converted
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`provider`] | [`FrameProvider`] and [`DataStreamClient`] traits, [`LiveProvider`] |
//! | [`offline`] | [`OfflineProvider`] playback of recorded sessions |
//! | [`format`] | On-disk frame format parser and writer |
//! | [`saver`] | [`FrameSaver`] for recording frames to disk |
//! | [`detector`] | [`SkeletonDetector`] and its keypoint tables |
//! | [`skeleton`] | [`Skeleton`], [`Keypoint`], and orientation helpers |
//! | [`designation`] | Pointing-based subject designation |
//! | [`calibration`] | Subject-from-source calibration transforms |
//! | [`geometry`] | Rigid-transform and trapezium-completion primitives |
//! | [`error`] | Error types ([`MocapError`], [`Result`]) |

// Modules
pub mod calibration;
pub mod cli;
pub mod designation;
pub mod detector;
pub mod error;
pub mod format;
pub mod geometry;
pub mod offline;
pub mod provider;
pub mod saver;
pub mod skeleton;

// Re-export main types for convenience
pub use calibration::SubjectFromSourceCache;
pub use designation::{SubjectDesignations, compute_subject_designations, is_designatable};
pub use detector::{DetectorOptions, SkeletonDetector, is_person};
pub use error::{MocapError, Result};
pub use format::{FrameData, SubjectRecord, parse_frame, write_frame};
pub use offline::OfflineProvider;
pub use provider::{DataStreamClient, FrameProvider, LiveProvider};
pub use saver::FrameSaver;
pub use skeleton::{Keypoint, KeypointOrienter, Skeleton};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "mocap-skeletons");
    }
}
