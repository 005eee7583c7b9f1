// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::process;

use crate::calibration::SubjectFromSourceCache;
use crate::cli::args::PlayArgs;
use crate::designation::{compute_subject_designations, is_designatable};
use crate::detector::{DetectorOptions, SkeletonDetector};
use crate::offline::OfflineProvider;
use crate::provider::FrameProvider;
use crate::saver::FrameSaver;
use crate::{error, info, section, success, verbose, warn};

/// Replay a recorded session, reconstructing skeletons frame by frame.
pub fn run_playback(args: &PlayArgs) {
    crate::cli::logging::set_verbose(args.verbose);

    let mut provider = match OfflineProvider::new(&args.folder) {
        Ok(provider) => provider,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    let saver = args.resave.as_ref().map(|folder| {
        FrameSaver::new(folder).unwrap_or_else(|e| {
            error!("Cannot create output folder: {e}");
            process::exit(1);
        })
    });

    let mut calibration_cache = args
        .calibration_dir
        .as_ref()
        .map(|dir| SubjectFromSourceCache::new(dir.clone()));

    let options = DetectorOptions {
        compute_poses: !args.keypoints_only,
        hallucinate_markers: !args.no_hallucinate,
    };
    let detector = SkeletonDetector::new(options);

    section!("Mocap playback");
    info!(
        "Playing back {} frame(s) from {}",
        provider.frame_count(),
        args.folder
    );

    let mut frames_played = 0usize;
    while args.limit.is_none_or(|limit| frames_played < limit) {
        if !provider.advance_frame() {
            if let Some(e) = provider.last_error() {
                error!("Stopping playback: {e}");
                process::exit(1);
            }
            break; // Recording exhausted.
        }
        frames_played += 1;

        let frame_number = provider.frame_number().unwrap_or_default();
        let skeletons = detector.detect_skeletons(&provider);

        verbose!("--- Frame {frame_number} ---");
        for (subject_name, skeleton) in &skeletons {
            verbose!(
                "{subject_name}: {} keypoint(s), {} bone(s), {} pose(s), {} local rotation(s)",
                skeleton.keypoints().len(),
                skeleton.bones().count(),
                skeleton.global_keypoint_poses().len(),
                skeleton.local_keypoint_rotations().len()
            );
        }

        if args.designations {
            let designations = compute_subject_designations(&provider, &skeletons, is_designatable);
            for (subject_name, candidates) in &designations {
                let ranked: Vec<String> = candidates
                    .iter()
                    .map(|(skeleton_name, distance)| format!("{skeleton_name} ({distance:.3}m)"))
                    .collect();
                verbose!("{subject_name} designated by: {}", ranked.join(", "));
            }
        }

        if let Some(cache) = calibration_cache.as_mut() {
            for subject_name in provider.subject_names() {
                if cache.get(&subject_name).is_none() {
                    verbose!("No subject-from-source calibration for {subject_name}");
                }
            }
        }

        if let Some(saver) = &saver {
            if let Err(e) = saver.save_frame(&provider) {
                warn!("Failed to re-save frame {frame_number}: {e}");
            }
        }
    }

    provider.terminate();
    success!("Played back {frames_played} frame(s)");
}
