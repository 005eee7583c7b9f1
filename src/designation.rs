// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Subject designation: which skeleton is pointing at which tracked object.
//!
//! For every designatable subject whose position is known, each skeleton with
//! both right-shoulder and right-elbow keypoints casts a half-ray from the
//! shoulder through the elbow; the distance from the subject to the closest
//! point on that ray quantifies pointing intent (smaller = more likely).

use std::collections::BTreeMap;

use crate::geometry::{closest_point_on_half_ray, position_from_world_transform};
use crate::provider::FrameProvider;
use crate::skeleton::Skeleton;

/// Per-subject lists of (skeleton name, designation distance) pairs, sorted
/// in non-decreasing order of distance.
pub type SubjectDesignations = BTreeMap<String, Vec<(String, f64)>>;

/// Default designatability predicate: tracked objects follow an "Object" name
/// prefix convention.
#[must_use]
pub fn is_designatable(subject_name: &str) -> bool {
    subject_name.starts_with("Object")
}

/// Compute the subject designations for the provider's current frame.
///
/// A subject only appears in the result if its position is resolvable (it has
/// a segment named after itself with a known pose) and at least one skeleton
/// contributes a distance. Subjects with no candidates, unresolvable
/// positions, and skeletons missing either arm keypoint are silently
/// excluded - never an error.
///
/// The `designatable` predicate decides which subjects are candidates at all;
/// [`is_designatable`] is the conventional choice.
#[must_use]
pub fn compute_subject_designations(
    provider: &dyn FrameProvider,
    skeletons: &BTreeMap<String, Skeleton>,
    designatable: impl Fn(&str) -> bool,
) -> SubjectDesignations {
    let mut designations = SubjectDesignations::new();

    for subject_name in provider.subject_names() {
        if !designatable(&subject_name) {
            continue;
        }

        // A designatable object carries a single segment named after itself.
        let Some(subject_from_world) = provider.segment_global_pose(&subject_name, &subject_name)
        else {
            continue;
        };
        let subject_pos = position_from_world_transform(&subject_from_world);

        let mut candidates: Vec<(String, f64)> = Vec::new();
        for (skeleton_name, skeleton) in skeletons {
            let (Some(right_shoulder), Some(right_elbow)) =
                (skeleton.keypoint("RShoulder"), skeleton.keypoint("RElbow"))
            else {
                continue;
            };

            let closest_point = closest_point_on_half_ray(
                &subject_pos,
                &right_shoulder.position,
                &(right_elbow.position - right_shoulder.position),
            );
            candidates.push((skeleton_name.clone(), (subject_pos - closest_point).norm()));
        }

        if !candidates.is_empty() {
            candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
            designations.insert(subject_name, candidates);
        }
    }

    designations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::BONE_PAIRS;
    use crate::geometry::make_pose;
    use crate::skeleton::Keypoint;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Matrix4, Point3};
    use std::collections::HashMap;

    /// Provider exposing only object subjects with fixed world positions.
    struct ObjectProvider {
        objects: Vec<(String, Point3<f64>)>,
    }

    impl FrameProvider for ObjectProvider {
        fn advance_frame(&mut self) -> bool {
            true
        }

        fn frame_number(&self) -> Option<u64> {
            Some(1)
        }

        fn subject_names(&self) -> Vec<String> {
            self.objects.iter().map(|(name, _)| name.clone()).collect()
        }

        fn marker_positions(&self, _: &str) -> HashMap<String, Point3<f64>> {
            HashMap::new()
        }

        fn segment_names(&self, subject_name: &str) -> Vec<String> {
            vec![subject_name.to_string()]
        }

        fn segment_global_pose(&self, subject_name: &str, segment_name: &str) -> Option<Matrix4<f64>> {
            if subject_name != segment_name {
                return None;
            }
            self.objects
                .iter()
                .find(|(name, _)| name == subject_name)
                // Subject-from-world with identity rotation: t = -p.
                .map(|(_, p)| make_pose(&Matrix3::identity(), &(-p.coords)))
        }

        fn segment_local_rotation(&self, _: &str, _: &str) -> Option<Matrix3<f64>> {
            None
        }

        fn terminate(&mut self) {}
    }

    fn skeleton_with_right_arm(shoulder: [f64; 3], elbow: [f64; 3]) -> Skeleton {
        let mut keypoints = HashMap::new();
        keypoints.insert(
            "RShoulder".to_string(),
            Keypoint::new("RShoulder", Point3::new(shoulder[0], shoulder[1], shoulder[2])),
        );
        keypoints.insert(
            "RElbow".to_string(),
            Keypoint::new("RElbow", Point3::new(elbow[0], elbow[1], elbow[2])),
        );
        Skeleton::new(keypoints, BONE_PAIRS, HashMap::new(), HashMap::new())
    }

    #[test]
    fn test_distances_sorted_non_decreasing() {
        let provider = ObjectProvider {
            objects: vec![("Object:Cup".to_string(), Point3::new(5.0, 0.0, 0.0))],
        };

        let mut skeletons = BTreeMap::new();
        // Pointing straight at the cup: distance 0.
        skeletons.insert(
            "OnTarget".to_string(),
            skeleton_with_right_arm([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
        );
        // Pointing parallel, offset by 2 in y: distance 2.
        skeletons.insert(
            "OffTarget".to_string(),
            skeleton_with_right_arm([0.0, 2.0, 0.0], [1.0, 2.0, 0.0]),
        );

        let designations = compute_subject_designations(&provider, &skeletons, is_designatable);
        let candidates = &designations["Object:Cup"];

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].0, "OnTarget");
        assert_relative_eq!(candidates[0].1, 0.0);
        assert_eq!(candidates[1].0, "OffTarget");
        assert_relative_eq!(candidates[1].1, 2.0);
        assert!(candidates[0].1 <= candidates[1].1);
    }

    #[test]
    fn test_half_ray_clamps_behind_shoulder() {
        let provider = ObjectProvider {
            objects: vec![("Object:Cup".to_string(), Point3::new(-3.0, 0.0, 0.0))],
        };

        let mut skeletons = BTreeMap::new();
        // Arm points away from the cup; the closest ray point is the shoulder.
        skeletons.insert(
            "Turned".to_string(),
            skeleton_with_right_arm([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
        );

        let designations = compute_subject_designations(&provider, &skeletons, is_designatable);
        assert_relative_eq!(designations["Object:Cup"][0].1, 3.0);
    }

    #[test]
    fn test_skeletons_without_arm_keypoints_are_excluded() {
        let provider = ObjectProvider {
            objects: vec![("Object:Cup".to_string(), Point3::new(1.0, 1.0, 1.0))],
        };

        let mut skeletons = BTreeMap::new();
        skeletons.insert(
            "Armless".to_string(),
            Skeleton::new(HashMap::new(), BONE_PAIRS, HashMap::new(), HashMap::new()),
        );

        let designations = compute_subject_designations(&provider, &skeletons, is_designatable);
        assert!(!designations.contains_key("Object:Cup"));
    }

    #[test]
    fn test_non_designatable_subjects_are_excluded() {
        let provider = ObjectProvider {
            objects: vec![("Aylin".to_string(), Point3::new(0.0, 0.0, 0.0))],
        };

        let mut skeletons = BTreeMap::new();
        skeletons.insert(
            "Pointer".to_string(),
            skeleton_with_right_arm([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
        );

        let designations = compute_subject_designations(&provider, &skeletons, is_designatable);
        assert!(designations.is_empty());
    }

    #[test]
    fn test_empty_scene_yields_empty_designations() {
        let provider = ObjectProvider { objects: vec![] };
        let designations =
            compute_subject_designations(&provider, &BTreeMap::new(), is_designatable);
        assert!(designations.is_empty());
    }

    #[test]
    fn test_designatable_prefix_convention() {
        assert!(is_designatable("Object:Cup"));
        assert!(is_designatable("Object1"));
        assert!(!is_designatable("Aylin"));
    }
}
