// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Skeleton data structures and per-keypoint orientation math.
//!
//! A [`Skeleton`] is an immutable per-subject, per-frame aggregate of named
//! keypoints, the static bone table joining them, and (when available) global
//! keypoint poses and local keypoint rotations. Skeletons carry no cross-frame
//! identity: each frame is reconstructed from scratch.

use std::collections::HashMap;

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

use crate::geometry::{make_pose, pose_rotation, DEGENERACY_EPSILON};

/// A named anatomical keypoint with a 3D position in world space (metres).
#[derive(Debug, Clone, PartialEq)]
pub struct Keypoint {
    /// The anatomical name (e.g. "LElbow", "MidHip").
    pub name: String,
    /// The position of the keypoint in the capture volume.
    pub position: Point3<f64>,
}

impl Keypoint {
    /// Construct a keypoint.
    #[must_use]
    pub fn new(name: impl Into<String>, position: Point3<f64>) -> Self {
        Self {
            name: name.into(),
            position,
        }
    }
}

/// A reconstructed 3D skeleton for a single subject in a single frame.
///
/// The keypoint set is data-dependent and sparse: downstream consumers must
/// treat every lookup as optional. The bone-pair table is always the full
/// static table regardless of which keypoints were actually detected.
#[derive(Debug, Clone)]
pub struct Skeleton {
    keypoints: HashMap<String, Keypoint>,
    bone_pairs: &'static [(&'static str, &'static str)],
    global_keypoint_poses: HashMap<String, Matrix4<f64>>,
    local_keypoint_rotations: HashMap<String, Matrix3<f64>>,
}

impl Skeleton {
    /// Construct a skeleton from its per-frame components.
    #[must_use]
    pub fn new(
        keypoints: HashMap<String, Keypoint>,
        bone_pairs: &'static [(&'static str, &'static str)],
        global_keypoint_poses: HashMap<String, Matrix4<f64>>,
        local_keypoint_rotations: HashMap<String, Matrix3<f64>>,
    ) -> Self {
        Self {
            keypoints,
            bone_pairs,
            global_keypoint_poses,
            local_keypoint_rotations,
        }
    }

    /// The keypoints that were detected this frame, indexed by name.
    #[must_use]
    pub fn keypoints(&self) -> &HashMap<String, Keypoint> {
        &self.keypoints
    }

    /// Look up a keypoint by name.
    #[must_use]
    pub fn keypoint(&self, name: &str) -> Option<&Keypoint> {
        self.keypoints.get(name)
    }

    /// The static table of keypoint pairs that form bones.
    #[must_use]
    pub fn bone_pairs(&self) -> &'static [(&'static str, &'static str)] {
        self.bone_pairs
    }

    /// Iterate over the bones whose endpoint keypoints both exist this frame.
    pub fn bones(&self) -> impl Iterator<Item = (&Keypoint, &Keypoint)> {
        self.bone_pairs.iter().filter_map(|(a, b)| {
            match (self.keypoints.get(*a), self.keypoints.get(*b)) {
                (Some(ka), Some(kb)) => Some((ka, kb)),
                _ => None,
            }
        })
    }

    /// The global (world-from-keypoint) poses known this frame.
    ///
    /// Always a subset of the keypoint set: only keypoints backed by a tracked
    /// segment or a successful orienter synthesis have a pose.
    #[must_use]
    pub fn global_keypoint_poses(&self) -> &HashMap<String, Matrix4<f64>> {
        &self.global_keypoint_poses
    }

    /// The local (parent-relative, rest-corrected) rotations known this frame.
    #[must_use]
    pub fn local_keypoint_rotations(&self) -> &HashMap<String, Matrix3<f64>> {
        &self.local_keypoint_rotations
    }
}

/// Synthesizes a global 6D pose for a keypoint from keypoint positions alone.
///
/// Used for keypoints that need an orientation but have no tracked segment of
/// their own (the MidHip root and the Neck). The frame is built from an origin
/// keypoint, an "up" keypoint fixing the primary axis, and a triangle of
/// keypoints fixing the reference plane.
#[derive(Debug)]
pub struct KeypointOrienter {
    /// The synthesized world-from-keypoint pose.
    pub global_pose: Matrix4<f64>,
}

impl KeypointOrienter {
    /// Try to synthesize a pose for `keypoint_name`.
    ///
    /// Returns `None` if any required keypoint is missing this frame, or if the
    /// keypoints are in a degenerate configuration (coincident or collinear)
    /// from which no orthonormal frame can be built.
    ///
    /// The convention: the primary axis `y` points from the origin keypoint
    /// towards the "up" keypoint; `x` is perpendicular to `y` within the plane
    /// implied by the triangle's normal; `z = x × y` completes a right-handed
    /// orthonormal basis. The translation is the origin keypoint's position.
    #[must_use]
    pub fn try_make(
        keypoints: &HashMap<String, Keypoint>,
        keypoint_name: &str,
        up_keypoint_name: &str,
        triangle: (&str, &str, &str),
    ) -> Option<Self> {
        let origin = keypoints.get(keypoint_name)?.position;
        let up = keypoints.get(up_keypoint_name)?.position;
        let t0 = keypoints.get(triangle.0)?.position;
        let t1 = keypoints.get(triangle.1)?.position;
        let t2 = keypoints.get(triangle.2)?.position;

        let y_axis = normalized(&(up - origin))?;
        let normal = normalized(&(t1 - t0).cross(&(t2 - t0)))?;
        let x_axis = normalized(&y_axis.cross(&normal))?;
        let z_axis = x_axis.cross(&y_axis);

        let rotation = Matrix3::from_columns(&[x_axis, y_axis, z_axis]);
        Some(Self {
            global_pose: make_pose(&rotation, &origin.coords),
        })
    }
}

fn normalized(v: &Vector3<f64>) -> Option<Vector3<f64>> {
    let norm = v.norm();
    if norm < DEGENERACY_EPSILON {
        None
    } else {
        Some(v / norm)
    }
}

/// Derive local keypoint rotations from a set of global keypoint poses.
///
/// For each child in the parent table whose own pose and parent's pose are both
/// known, the child's rotation relative to its parent's frame is
/// `R_parent^T * R_child`, re-expressed in the keypoint's rest-corrected basis
/// by conjugation with its midhip-from-rest matrix (identity if unmapped).
///
/// Keypoints absent from the parent table, or whose parent pose is unknown,
/// yield no entry - never a stale or default rotation.
#[must_use]
pub fn compute_local_keypoint_rotations(
    global_keypoint_poses: &HashMap<String, Matrix4<f64>>,
    midhip_from_rests: &HashMap<&str, Matrix3<f64>>,
    parent_keypoints: &[(&str, &str)],
) -> HashMap<String, Matrix3<f64>> {
    let mut local_rotations = HashMap::new();

    for (child, parent) in parent_keypoints {
        let (Some(child_pose), Some(parent_pose)) = (
            global_keypoint_poses.get(*child),
            global_keypoint_poses.get(*parent),
        ) else {
            continue;
        };

        let relative = pose_rotation(parent_pose).transpose() * pose_rotation(child_pose);
        let correction = midhip_from_rests
            .get(*child)
            .copied()
            .unwrap_or_else(Matrix3::identity);

        local_rotations.insert(
            (*child).to_string(),
            correction.transpose() * relative * correction,
        );
    }

    local_rotations
}
