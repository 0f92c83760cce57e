//! End-to-end alignment scenarios on synthesized detections


use head_pose_alignment::{
    alignment::{Aligner, AlignmentJob},
    face_detection::{BoundingBox, FaceDetection},
    objective::ReprojectionObjective,
    optimizer::{GradientDescent, Termination},
    pose::Pose,
    Error,
};
use test_helpers::{
    assert_pose_usable, default_aligner, detection_for, init_logging, reference_scene, truth_pose, IMAGE_HEIGHT,
    IMAGE_WIDTH,
};

/// Refine from `seed` against the reference face; returns (initial, final, refined pose)
fn refine_from(seed: Pose) -> (f64, f64, Pose) {
    let detection = detection_for(&truth_pose()).unwrap();
    let objective = ReprojectionObjective::new(reference_scene().unwrap(), &detection).unwrap();
    let initial = objective.compute_error(&seed).unwrap();
    let refinement = GradientDescent::default().refine_with_cancel(&seed, |p| objective.evaluate(p), None);
    assert_pose_usable(&refinement.pose);
    assert_eq!(refinement.error, objective.evaluate(&refinement.pose));
    (initial, refinement.error, refinement.pose)
}

#[test]
fn test_seeded_alignment_reduces_error() {
    init_logging();
    let aligner = default_aligner().unwrap();
    let detection = detection_for(&truth_pose()).unwrap();

    let report = aligner.align(&detection, IMAGE_WIDTH, IMAGE_HEIGHT).unwrap();

    assert_pose_usable(&report.pose);
    assert!(report.initial_error > 0.0);
    assert!(report.final_error < report.initial_error);
    assert_eq!(report.seed_pose.euler_pitch, detection.pitch);
    assert_eq!(report.seed_pose.euler_yaw, detection.yaw);
    assert_eq!(report.seed_pose.euler_roll, detection.roll);
}

#[test]
fn test_horizontal_offset_is_recovered() {
    let mut seed = truth_pose();
    seed.position_x += 0.1;
    let (initial, last, pose) = refine_from(seed);

    assert!(last < initial / 20.0, "error {initial:e} -> {last:e}");
    assert!((pose.position_x - truth_pose().position_x).abs() < 0.02);
}

#[test]
fn test_vertical_offset_is_reduced() {
    let mut seed = truth_pose();
    seed.position_y -= 0.08;
    let (initial, last, _) = refine_from(seed);
    assert!(last < initial / 10.0, "error {initial:e} -> {last:e}");
}

#[test]
fn test_position_and_scale_offset_is_reduced() {
    let mut seed = truth_pose();
    seed.position_x += 0.05;
    seed.position_y += 0.05;
    seed.scale += 0.03;
    let (initial, last, _) = refine_from(seed);
    assert!(last < initial / 20.0, "error {initial:e} -> {last:e}");
}

#[test]
fn test_refinement_at_truth_stays_close() {
    let (initial, last, pose) = refine_from(truth_pose());
    assert!(initial < 1e-20);
    assert!(last.is_finite());
    assert!((pose.position_x - truth_pose().position_x).abs() < 0.05);
    assert!((pose.position_y - truth_pose().position_y).abs() < 0.05);
}

#[test]
fn test_align_all_keeps_order_and_skips_degenerate_faces() {
    init_logging();
    let aligner = default_aligner().unwrap();
    let left = detection_for(&truth_pose()).unwrap();
    let right = detection_for(&Pose::new(-0.12, 0.25, 0.06, 0.12, -0.05, 0.30)).unwrap();
    let broken = FaceDetection::new(BoundingBox::new(0.4, 0.4, 0.0, 0.1), 0.0, 0.0, 0.0);

    let results = aligner.align_all(&[left.clone(), broken, right.clone()], IMAGE_WIDTH, IMAGE_HEIGHT);

    assert_eq!(results.len(), 3);
    assert!(matches!(results[1], Err(Error::DegenerateDetection(_))));

    let first = results[0].as_ref().unwrap();
    let third = results[2].as_ref().unwrap();
    assert_pose_usable(&first.pose);
    assert_pose_usable(&third.pose);
    assert!(first.seed_pose.position_x > 0.0);
    assert!(third.seed_pose.position_x < 0.0);

    // Each face is independent of the others
    let alone = aligner.align(&left, IMAGE_WIDTH, IMAGE_HEIGHT).unwrap();
    assert_eq!(&alone, first);
}

#[test]
fn test_align_all_with_no_faces() {
    let aligner = default_aligner().unwrap();
    assert!(aligner.align_all(&[], IMAGE_WIDTH, IMAGE_HEIGHT).is_empty());
}

#[test]
fn test_background_alignment_matches_foreground() {
    let aligner = default_aligner().unwrap();
    let detection = detection_for(&truth_pose()).unwrap();
    let worker = aligner.spawn_alignment(detection.clone(), IMAGE_WIDTH, IMAGE_HEIGHT).unwrap();
    let background = worker.join().unwrap().unwrap();
    let foreground = aligner.align(&detection, IMAGE_WIDTH, IMAGE_HEIGHT).unwrap();
    assert_eq!(background, foreground);
}

#[test]
fn test_cancelled_background_alignment_returns_usable_pose() {
    let base = default_aligner().unwrap();
    // Tiny steps and no iteration cap: only cancellation ends the run
    let slow = GradientDescent::new(1e-6, 0.0, usize::MAX).unwrap();
    let aligner = Aligner::new(base.model().clone(), base.camera().clone(), *base.estimator(), slow);
    let detection = detection_for(&truth_pose()).unwrap();

    let worker = aligner.spawn_alignment(detection, IMAGE_WIDTH, IMAGE_HEIGHT).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(20));
    worker.cancel();
    let report = worker.join().unwrap().unwrap();

    assert_eq!(report.termination, Termination::Cancelled);
    assert!(report.cancelled());
    assert_pose_usable(&report.pose);
    assert!(report.final_error.is_finite());
    assert!(report.final_error <= report.initial_error);
}

#[test]
fn test_align_all_stays_on_the_callers_pool() {
    let aligner = default_aligner().unwrap();
    let faces: Vec<_> = (0..16)
        .map(|i| detection_for(&Pose::new(-0.2 + 0.025 * f64::from(i), 0.25, 0.06, -0.12, 0.05, 0.30)).unwrap())
        .collect();
    let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();

    let results = pool.install(|| aligner.align_all(&faces, IMAGE_WIDTH, IMAGE_HEIGHT));

    assert_eq!(results.len(), faces.len());
    for (face, result) in faces.iter().zip(&results) {
        let alone = aligner.align(face, IMAGE_WIDTH, IMAGE_HEIGHT).unwrap();
        assert_eq!(result.as_ref().unwrap(), &alone);
    }
}

#[test]
fn test_job_with_mixed_faces_reports_each_by_index() {
    let aligner = default_aligner().unwrap();
    let job = AlignmentJob {
        image_width: IMAGE_WIDTH,
        image_height: IMAGE_HEIGHT,
        detections: vec![
            FaceDetection::new(BoundingBox::new(0.4, 0.4, 0.0, 0.1), 0.0, 0.0, 0.0),
            detection_for(&truth_pose()).unwrap(),
        ],
    };

    let faces = aligner.align_job(&job);

    assert_eq!(faces.len(), 2);
    assert_eq!((faces[0].index, faces[1].index), (0, 1));
    assert!(faces[0].report.is_none());
    assert!(faces[0].error.is_some());
    let report = faces[1].report.as_ref().unwrap();
    assert_eq!(report, &aligner.align(&job.detections[1], IMAGE_WIDTH, IMAGE_HEIGHT).unwrap());
}
