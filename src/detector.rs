// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Skeleton detection: markers in, labeled skeletons out.
//!
//! The detector owns the fixed anatomical tables (marker names, bone pairs,
//! parent chains, rest corrections) and runs the per-frame pipeline: pelvis
//! marker hallucination, keypoint construction, pose reconstruction, and
//! skeleton assembly. All tables are immutable configuration; the detector
//! itself holds no per-frame state.

use std::collections::{BTreeMap, HashMap};

use nalgebra::{Matrix3, Point3, Vector3};

use crate::geometry::complete_trapezium;
use crate::provider::FrameProvider;
use crate::skeleton::{
    compute_local_keypoint_rotations, Keypoint, KeypointOrienter, Skeleton,
};

/// The static table of keypoint pairs joined to form bones.
pub const BONE_PAIRS: &[(&str, &str)] = &[
    ("Head", "Neck"),
    ("LAnkle", "LKnee"),
    ("LElbow", "LShoulder"),
    ("LElbow", "LWrist"),
    ("LHip", "MidHip"),
    ("LKnee", "LHip"),
    ("LShoulder", "Neck"),
    ("MidHip", "Neck"),
    ("MidHip", "RHip"),
    ("Neck", "RShoulder"),
    ("RAnkle", "RKnee"),
    ("RElbow", "RShoulder"),
    ("RElbow", "RWrist"),
    ("RHip", "RKnee"),
];

/// Markers that map 1:1 onto keypoints.
const MARKER_TO_KEYPOINT: &[(&str, &str)] = &[
    ("LANK", "LAnkle"),
    ("LELB", "LElbow"),
    ("LKNE", "LKnee"),
    ("LSHO", "LShoulder"),
    ("LTHI", "LThigh"),
    ("LTIB", "LTibula"),
    ("LTOE", "LToe"),
    ("RANK", "RAnkle"),
    ("RELB", "RElbow"),
    ("RKNE", "RKnee"),
    ("RSHO", "RShoulder"),
    ("RTHI", "RThigh"),
    ("RTIB", "RTibula"),
    ("RTOE", "RToe"),
];

/// Keypoints computed by averaging marker clusters. Each keypoint lists its
/// candidate marker sets in preference order; the first fully-visible set
/// wins, and a keypoint with no fully-visible set is omitted for the frame.
const AVERAGED_KEYPOINTS: &[(&str, &[&[&str]])] = &[
    ("Head", &[&["LBHD", "LFHD", "RBHD", "RFHD"]]),
    ("LHip", &[&["LASI", "LPSI"]]),
    ("LWrist", &[&["LWRA", "LWRB"], &["LWRA"], &["LWRB"], &["LFIN"]]),
    (
        "MidHip",
        &[
            &["LASI", "LPSI", "RASI", "RPSI"],
            &["LASI", "RPSI"],
            &["RASI", "LPSI"],
        ],
    ),
    ("Neck", &[&["LSHO", "RSHO"]]),
    ("RHip", &[&["RASI", "RPSI"]]),
    ("RWrist", &[&["RWRA", "RWRB"], &["RWRA"], &["RWRB"], &["RFIN"]]),
];

/// Tracked segments whose (inverted) global poses orient keypoints directly.
const SEGMENT_TO_KEYPOINT: &[(&str, &str)] = &[
    ("L_Elbow", "LElbow"),
    ("R_Elbow", "RElbow"),
    ("L_Femur", "LHip"),
    ("R_Femur", "RHip"),
    ("L_Humerus", "LShoulder"),
    ("R_Humerus", "RShoulder"),
    ("L_Tibia", "LKnee"),
    ("R_Tibia", "RKnee"),
];

/// Child-to-parent keypoint relationships, rooted at MidHip.
const PARENT_KEYPOINTS: &[(&str, &str)] = &[
    ("LElbow", "LShoulder"),
    ("LHip", "MidHip"),
    ("LKnee", "LHip"),
    ("LShoulder", "Neck"),
    ("Neck", "MidHip"),
    ("RElbow", "RShoulder"),
    ("RHip", "MidHip"),
    ("RKnee", "RHip"),
    ("RShoulder", "Neck"),
];

/// The four co-planar pelvis markers form a trapezium; any one of them can be
/// reconstructed from the other three. Row layout: (target, origin, base,
/// diagonal), with the origin diagonally opposite the target.
const PELVIS_TRAPEZIA: &[(&str, &str, &str, &str)] = &[
    ("LASI", "RPSI", "LPSI", "RASI"),
    ("LPSI", "RASI", "LASI", "RPSI"),
    ("RASI", "LPSI", "RPSI", "LASI"),
    ("RPSI", "LASI", "RASI", "LPSI"),
];

/// Determines whether a subject is a person whose markers should be
/// reconstructed into a skeleton.
pub type PersonPredicate = Box<dyn Fn(&dyn FrameProvider, &str) -> bool>;

/// Default person predicate: a subject is a person if its tracked hierarchy
/// contains the canonical "Root" segment.
#[must_use]
pub fn is_person(provider: &dyn FrameProvider, subject_name: &str) -> bool {
    provider
        .segment_names(subject_name)
        .iter()
        .any(|segment| segment == "Root")
}

/// Configuration for the detection pipeline.
#[derive(Debug, Clone, Copy)]
pub struct DetectorOptions {
    /// Reconstruct global keypoint poses and local rotations. When false the
    /// detector runs in keypoint-only mode: positions and bones, nothing else.
    pub compute_poses: bool,
    /// Recover occluded pelvis markers via trapezium completion before
    /// constructing keypoints.
    pub hallucinate_markers: bool,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            compute_poses: true,
            hallucinate_markers: true,
        }
    }
}

/// A 3D skeleton detector driven by a mocap frame provider.
pub struct SkeletonDetector {
    options: DetectorOptions,
    is_person: PersonPredicate,
    midhip_from_rests: HashMap<&'static str, Matrix3<f64>>,
}

impl Default for SkeletonDetector {
    fn default() -> Self {
        Self::new(DetectorOptions::default())
    }
}

impl SkeletonDetector {
    /// Construct a detector with the default person predicate.
    #[must_use]
    pub fn new(options: DetectorOptions) -> Self {
        // Rest-pose corrections re-expressing each keypoint's authored rest
        // orientation relative to the MidHip root. The left/right mirror pair
        // covers the arm chain.
        // FIXME: These constants are provisional and should be validated
        // against real capture data.
        let lm = Matrix3::new(0.0, 1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        let rm = Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        let neck = Matrix3::new(-1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, 1.0);

        let mut midhip_from_rests = HashMap::new();
        midhip_from_rests.insert("LElbow", lm);
        midhip_from_rests.insert("LHip", Matrix3::identity());
        midhip_from_rests.insert("LKnee", Matrix3::identity());
        midhip_from_rests.insert("LShoulder", lm);
        midhip_from_rests.insert("MidHip", Matrix3::identity());
        midhip_from_rests.insert("Neck", neck);
        midhip_from_rests.insert("RElbow", rm);
        midhip_from_rests.insert("RHip", Matrix3::identity());
        midhip_from_rests.insert("RKnee", Matrix3::identity());
        midhip_from_rests.insert("RShoulder", rm);

        Self {
            options,
            is_person: Box::new(is_person),
            midhip_from_rests,
        }
    }

    /// Replace the person predicate.
    #[must_use]
    pub fn with_is_person(mut self, predicate: PersonPredicate) -> Self {
        self.is_person = predicate;
        self
    }

    /// Detect the 3D skeletons present in the provider's current frame,
    /// indexed by subject name.
    ///
    /// Subjects failing the person predicate are skipped entirely. Missing
    /// markers degrade to partial skeletons (fewer keypoints, fewer poses);
    /// they are never an error.
    #[must_use]
    pub fn detect_skeletons(&self, provider: &dyn FrameProvider) -> BTreeMap<String, Skeleton> {
        let mut skeletons = BTreeMap::new();

        for subject_name in provider.subject_names() {
            if !(self.is_person)(provider, &subject_name) {
                continue;
            }

            let mut marker_positions = provider.marker_positions(&subject_name);
            if self.options.hallucinate_markers {
                hallucinate_pelvis_markers(&mut marker_positions);
            }

            let keypoints = construct_keypoints(&marker_positions);

            let mut global_keypoint_poses = HashMap::new();
            let mut local_keypoint_rotations = HashMap::new();

            if self.options.compute_poses {
                // Keypoints backed by a tracked segment take their pose from
                // it; the provider reports segment-from-world, so invert to
                // place the keypoint's frame in the world.
                for (segment_name, keypoint_name) in SEGMENT_TO_KEYPOINT {
                    let Some(keypoint_from_world) =
                        provider.segment_global_pose(&subject_name, segment_name)
                    else {
                        continue;
                    };
                    if let Some(world_from_keypoint) = keypoint_from_world.try_inverse() {
                        global_keypoint_poses
                            .insert((*keypoint_name).to_string(), world_from_keypoint);
                    }
                }

                // The root and the neck have no segment of their own; their
                // frames are synthesized from keypoint triples.
                if let Some(orienter) = KeypointOrienter::try_make(
                    &keypoints,
                    "MidHip",
                    "Neck",
                    ("RHip", "LHip", "Neck"),
                ) {
                    global_keypoint_poses.insert("MidHip".to_string(), orienter.global_pose);
                }
                if let Some(orienter) = KeypointOrienter::try_make(
                    &keypoints,
                    "Neck",
                    "MidHip",
                    ("LShoulder", "RShoulder", "MidHip"),
                ) {
                    global_keypoint_poses.insert("Neck".to_string(), orienter.global_pose);
                }

                local_keypoint_rotations = compute_local_keypoint_rotations(
                    &global_keypoint_poses,
                    &self.midhip_from_rests,
                    PARENT_KEYPOINTS,
                );
            }

            skeletons.insert(
                subject_name.clone(),
                Skeleton::new(
                    keypoints,
                    BONE_PAIRS,
                    global_keypoint_poses,
                    local_keypoint_rotations,
                ),
            );
        }

        skeletons
    }
}

/// Recover occluded pelvis markers by trapezium completion.
///
/// Each attempt requires all three partner markers and only fills a marker
/// that is currently absent - an existing position is never overwritten, and
/// with two or more pelvis markers missing nothing is filled (every trio then
/// contains another missing marker). Re-running on its own output is a no-op.
pub fn hallucinate_pelvis_markers(marker_positions: &mut HashMap<String, Point3<f64>>) {
    for (target, origin, base, diagonal) in PELVIS_TRAPEZIA {
        if marker_positions.contains_key(*target) {
            continue;
        }
        let (Some(&o), Some(&b), Some(&d)) = (
            marker_positions.get(*origin),
            marker_positions.get(*base),
            marker_positions.get(*diagonal),
        ) else {
            continue;
        };
        marker_positions.insert((*target).to_string(), complete_trapezium(&o, &b, &d));
    }
}

/// Build the keypoint set for one subject from its visible markers.
fn construct_keypoints(marker_positions: &HashMap<String, Point3<f64>>) -> HashMap<String, Keypoint> {
    let mut keypoints = HashMap::new();

    for (marker_name, keypoint_name) in MARKER_TO_KEYPOINT {
        if let Some(position) = marker_positions.get(*marker_name) {
            keypoints.insert(
                (*keypoint_name).to_string(),
                Keypoint::new(*keypoint_name, *position),
            );
        }
    }

    for (keypoint_name, candidate_sets) in AVERAGED_KEYPOINTS {
        try_add_averaged_keypoint(keypoint_name, candidate_sets, &mut keypoints, marker_positions);
    }

    keypoints
}

/// Add an averaged keypoint from the first fully-visible candidate marker set.
fn try_add_averaged_keypoint(
    keypoint_name: &str,
    candidate_sets: &[&[&str]],
    keypoints: &mut HashMap<String, Keypoint>,
    marker_positions: &HashMap<String, Point3<f64>>,
) {
    for candidate_set in candidate_sets {
        let positions: Option<Vec<&Point3<f64>>> = candidate_set
            .iter()
            .map(|marker| marker_positions.get(*marker))
            .collect();

        if let Some(positions) = positions {
            let sum: Vector3<f64> = positions.iter().map(|p| p.coords).sum();
            let mean = Point3::from(sum / positions.len() as f64);
            keypoints.insert(
                keypoint_name.to_string(),
                Keypoint::new(keypoint_name, mean),
            );
            return;
        }
    }
}
