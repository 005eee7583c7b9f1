// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Geometric helpers for skeleton reconstruction.
//!
//! Small, pure functions over nalgebra types: rigid-transform packing and
//! unpacking, half-ray projection for designation, and the planar-trapezium
//! completion used to recover occluded pelvis markers.

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

/// Norms below this are treated as degenerate when building orthonormal frames.
pub const DEGENERACY_EPSILON: f64 = 1e-12;

/// Pack a rotation and a translation into a 4x4 rigid transform.
#[must_use]
pub fn make_pose(rotation: &Matrix3<f64>, translation: &Vector3<f64>) -> Matrix4<f64> {
    let mut pose = Matrix4::identity();
    pose.fixed_view_mut::<3, 3>(0, 0).copy_from(rotation);
    pose.fixed_view_mut::<3, 1>(0, 3).copy_from(translation);
    pose
}

/// Extract the 3x3 rotation block of a rigid transform.
#[must_use]
pub fn pose_rotation(pose: &Matrix4<f64>) -> Matrix3<f64> {
    pose.fixed_view::<3, 3>(0, 0).into_owned()
}

/// Extract the translation column of a rigid transform.
#[must_use]
pub fn pose_translation(pose: &Matrix4<f64>) -> Vector3<f64> {
    pose.fixed_view::<3, 1>(0, 3).into_owned()
}

/// Compute the world-space position of a frame given its world-to-frame transform.
///
/// Providers report subject poses in the "camera" convention (subject-from-world,
/// i.e. `[R|t]` mapping world points into the subject's frame). The subject's own
/// position in world space is then `-R^T * t`.
#[must_use]
pub fn position_from_world_transform(subject_from_world: &Matrix4<f64>) -> Point3<f64> {
    let r = pose_rotation(subject_from_world);
    let t = pose_translation(subject_from_world);
    Point3::from(-(r.transpose() * t))
}

/// Find the closest point to `point` on the half-ray from `start` along `direction`.
///
/// The half-ray is clamped at `start`: points behind the ray origin project onto
/// the origin itself. A degenerate (near-zero) direction also yields `start`.
#[must_use]
pub fn closest_point_on_half_ray(
    point: &Point3<f64>,
    start: &Point3<f64>,
    direction: &Vector3<f64>,
) -> Point3<f64> {
    let norm = direction.norm();
    if norm < DEGENERACY_EPSILON {
        return *start;
    }
    let dir = direction / norm;
    let t = (point - start).dot(&dir).max(0.0);
    start + dir * t
}

/// Reconstruct the fourth corner of a planar trapezium from the other three.
///
/// The three known corners are the origin `O`, the base `B` (sharing a parallel
/// side with `O`), and the diagonal partner `D` (sharing a leg with `O`). Writing
/// `b = B - O` and `a = D - O`, the missing corner exploits the trapezium's
/// reflective symmetry:
///
/// `T = O + b + a_perp - a_par`
///
/// where `a_par` is the projection of `a` onto `b` and `a_perp = a - a_par`.
///
/// # Arguments
///
/// * `origin` - Corner diagonally opposite the missing one.
/// * `base` - Corner on the origin's parallel side.
/// * `diagonal` - Corner on the missing one's parallel side.
///
/// # Returns
///
/// The reconstructed fourth corner.
#[must_use]
pub fn complete_trapezium(
    origin: &Point3<f64>,
    base: &Point3<f64>,
    diagonal: &Point3<f64>,
) -> Point3<f64> {
    let b = base - origin;
    let a = diagonal - origin;

    let b_norm_sq = b.norm_squared();
    if b_norm_sq < DEGENERACY_EPSILON {
        // Origin and base coincide; the best we can do is mirror the diagonal.
        return origin + a;
    }

    let a_par = b * (a.dot(&b) / b_norm_sq);
    let a_perp = a - a_par;

    origin + b + a_perp - a_par
}
