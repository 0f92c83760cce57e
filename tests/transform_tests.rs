//! Coordinate transform and projection tests against the reference camera


use head_pose_alignment::{
    camera::{scene_to_image_perspective, CameraProjection, ImagePlane},
    head_model::Anchor,
    objective::SceneAdapter,
    transform::{image_to_scene, landmark_to_image, scene_to_clipping},
    Error,
};
use nalgebra::{Matrix4, Point2, Point3, Vector4};
use proptest::prelude::*;
use test_helpers::{
    detection_for, reference_camera, reference_scene, truth_pose, IMAGE_HEIGHT, IMAGE_WIDTH, SCREEN_HEIGHT,
    SCREEN_WIDTH,
};

#[test]
fn test_corner_mapping_scenario() {
    let camera = reference_camera().unwrap();
    let expected = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
    for (x, y) in expected {
        let corner = Point2::new(x, y);
        let scene = image_to_scene(&corner, IMAGE_WIDTH, IMAGE_HEIGHT);
        let mapped = scene_to_image_perspective(&scene, &camera, IMAGE_WIDTH, IMAGE_HEIGHT).unwrap();
        assert!((mapped.x - x).abs() < 1e-6, "corner ({x}, {y}) mapped to {mapped:?}");
        assert!((mapped.y - y).abs() < 1e-6, "corner ({x}, {y}) mapped to {mapped:?}");
    }
}

#[test]
fn test_corner_mapping_for_landscape_image() {
    let camera = reference_camera().unwrap();
    let (w, h) = (1920.0, 1080.0);
    for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
        let corner = Point2::new(x, y);
        let mapped = scene_to_image_perspective(&image_to_scene(&corner, w, h), &camera, w, h).unwrap();
        assert!((mapped - corner).norm() < 1e-6);
    }
}

#[test]
fn test_projection_consistency() {
    let camera = reference_camera().unwrap();
    let scene = reference_scene().unwrap();
    let truth = truth_pose();
    let detection = detection_for(&truth).unwrap();

    for anchor in Anchor::ALL {
        let (region, statistic) = anchor.correspondence();
        let landmark = detection.region_statistic(region, statistic).unwrap();
        let image = landmark_to_image(&landmark, &detection.bounding_box);
        let on_plane = image_to_scene(&image, IMAGE_WIDTH, IMAGE_HEIGHT);
        let from_landmark = scene_to_clipping(&on_plane, camera.view(), camera.projection()).unwrap();

        let world = scene.anchor_world_position(&truth, anchor);
        let from_model = camera.project_to_clipping(&world).unwrap();

        let gap = (from_landmark.xy() - from_model.xy()).norm();
        assert!(gap < 0.06, "{} differs by {gap}", anchor.name());
    }
}

#[test]
fn test_reference_camera_projects_origin_to_center() {
    let camera = reference_camera().unwrap();
    let clip = camera.project_to_clipping(&Point3::origin()).unwrap();
    assert!(clip.x.abs() < 1e-12);
    assert!(clip.y.abs() < 1e-12);
    assert!(clip.z > -1.0 && clip.z < 1.0);
}

#[test]
fn test_projection_rejects_zero_w() {
    // Projection with w taken from x: points on the x = 0 plane have w = 0
    let mut projection = Matrix4::identity();
    projection.set_row(3, &Vector4::new(1.0, 0.0, 0.0, 0.0).transpose());
    let result = scene_to_clipping(&Point3::new(0.0, 0.3, 0.0), &Matrix4::identity(), &projection);
    assert!(matches!(result, Err(Error::DegenerateProjection(_))));
}

#[test]
fn test_collapsed_camera_cannot_frame_image() {
    let projection = Matrix4::zeros();
    let camera = CameraProjection::new(Matrix4::identity(), projection);
    assert!(ImagePlane::new(&camera, IMAGE_WIDTH, IMAGE_HEIGHT).is_err());
}

#[test]
fn test_framing_camera_also_covers_full_frame() {
    let camera = CameraProjection::framing(
        SCREEN_WIDTH,
        SCREEN_HEIGHT,
        IMAGE_WIDTH,
        IMAGE_HEIGHT,
        std::f64::consts::FRAC_PI_3,
    )
    .unwrap();
    let plane = ImagePlane::new(&camera, IMAGE_WIDTH, IMAGE_HEIGHT).unwrap();
    let center = plane
        .project(&image_to_scene(&Point2::new(0.5, 0.5), IMAGE_WIDTH, IMAGE_HEIGHT))
        .unwrap();
    assert!((center - Point2::new(0.5, 0.5)).norm() < 1e-9);
}

proptest! {
    #[test]
    fn prop_plane_points_survive_perspective_projection(x in 0.0..=1.0f64, y in 0.0..=1.0f64) {
        let camera = reference_camera().unwrap();
        let p = Point2::new(x, y);
        let scene = image_to_scene(&p, IMAGE_WIDTH, IMAGE_HEIGHT);
        let mapped = scene_to_image_perspective(&scene, &camera, IMAGE_WIDTH, IMAGE_HEIGHT).unwrap();
        prop_assert!((mapped - p).norm() < 1e-6);
    }
}
