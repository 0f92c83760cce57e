//! Reprojection error between the placed head model and detected landmarks.
//!
//! The scene is reached through [`SceneAdapter`]. [`AnalyticScene`] is the
//! built-in adapter: anchor positions are a closed-form transform of the
//! model's offset table and projection goes through a precomputed
//! [`ImagePlane`], so an evaluation never touches shared state and any number
//! of evaluations can run against independent poses.

use crate::{
    camera::{CameraProjection, ImagePlane},
    face_detection::FaceDetection,
    head_model::{Anchor, HeadModel, ANCHOR_COUNT},
    pose::Pose,
    transform::landmark_to_image,
    Error, Result,
};
use nalgebra::{Point2, Point3, Vector2};

/// Placement and projection capabilities the objective needs from a scene
pub trait SceneAdapter {
    /// World position of a named anchor with the model placed at `pose`
    fn anchor_world_position(&self, pose: &Pose, anchor: Anchor) -> Point3<f64>;

    /// Project a world position into image-relative coordinates
    ///
    /// # Errors
    ///
    /// Returns `Error::DegenerateProjection` when the camera cannot project the point
    fn project_to_image(&self, world: &Point3<f64>) -> Result<Point2<f64>>;

    /// Image-relative positions of every anchor, in [`Anchor::ALL`] order
    ///
    /// # Errors
    ///
    /// Propagates the first projection failure
    fn project_anchors(&self, pose: &Pose) -> Result<[Point2<f64>; ANCHOR_COUNT]> {
        let mut projected = [Point2::origin(); ANCHOR_COUNT];
        for anchor in Anchor::ALL {
            projected[anchor.index()] = self.project_to_image(&self.anchor_world_position(pose, anchor))?;
        }
        Ok(projected)
    }
}

/// Closed-form scene: head model anchor table plus a fixed camera and image
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticScene {
    model: HeadModel,
    plane: ImagePlane,
}

impl AnalyticScene {
    /// # Errors
    ///
    /// Returns an error if the camera cannot project the image plane
    pub fn new(model: HeadModel, camera: &CameraProjection, image_width: f64, image_height: f64) -> Result<Self> {
        Ok(Self {
            model,
            plane: ImagePlane::new(camera, image_width, image_height)?,
        })
    }

    #[must_use]
    pub fn model(&self) -> &HeadModel {
        &self.model
    }

    #[must_use]
    pub fn image_plane(&self) -> &ImagePlane {
        &self.plane
    }
}

impl SceneAdapter for AnalyticScene {
    fn anchor_world_position(&self, pose: &Pose, anchor: Anchor) -> Point3<f64> {
        self.model.world_position(pose, anchor)
    }

    fn project_to_image(&self, world: &Point3<f64>) -> Result<Point2<f64>> {
        self.plane.project(world)
    }
}

/// Image-relative target point for every anchor, in [`Anchor::ALL`] order
///
/// # Errors
///
/// Returns `Error::DegenerateDetection` if the detection is invalid or lacks
/// one of the landmark groups the anchors are matched against
pub fn landmark_targets(detection: &FaceDetection) -> Result<[Point2<f64>; ANCHOR_COUNT]> {
    detection.validate()?;
    let mut targets = [Point2::origin(); ANCHOR_COUNT];
    for anchor in Anchor::ALL {
        let (region, statistic) = anchor.correspondence();
        let face_relative = detection.region_statistic(region, statistic)?;
        targets[anchor.index()] = landmark_to_image(&face_relative, &detection.bounding_box);
    }
    Ok(targets)
}

/// Sum of squared image-space distances between projected anchors and their
/// detected landmark targets
///
/// Targets depend only on the detection, so they are resolved once here and
/// each evaluation only re-projects the anchors.
#[derive(Debug, Clone)]
pub struct ReprojectionObjective<S> {
    scene: S,
    targets: [Point2<f64>; ANCHOR_COUNT],
}

impl<S: SceneAdapter> ReprojectionObjective<S> {
    /// # Errors
    ///
    /// Returns `Error::DegenerateDetection` if the landmark targets cannot be resolved
    pub fn new(scene: S, detection: &FaceDetection) -> Result<Self> {
        Ok(Self {
            scene,
            targets: landmark_targets(detection)?,
        })
    }

    #[must_use]
    pub fn scene(&self) -> &S {
        &self.scene
    }

    #[must_use]
    pub fn targets(&self) -> &[Point2<f64>; ANCHOR_COUNT] {
        &self.targets
    }

    /// Per-anchor `projected - target` offsets
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for a non-finite pose and propagates projection failures
    pub fn residuals(&self, pose: &Pose) -> Result<[Vector2<f64>; ANCHOR_COUNT]> {
        if !pose.is_finite() {
            return Err(Error::InvalidInput(format!("Pose has non-finite parameters: {pose:?}")));
        }
        let projected = self.scene.project_anchors(pose)?;
        let mut residuals = [Vector2::zeros(); ANCHOR_COUNT];
        for (i, residual) in residuals.iter_mut().enumerate() {
            *residual = projected[i] - self.targets[i];
        }
        Ok(residuals)
    }

    /// Reprojection error of `pose`; always `>= 0`
    ///
    /// # Errors
    ///
    /// See [`ReprojectionObjective::residuals`]
    pub fn compute_error(&self, pose: &Pose) -> Result<f64> {
        Ok(self.residuals(pose)?.iter().map(Vector2::norm_squared).sum())
    }

    /// Scalar form for the refiner: failures become `+∞`, which the refiner
    /// treats as a stop signal
    #[must_use]
    pub fn evaluate(&self, pose: &Pose) -> f64 {
        match self.compute_error(pose) {
            Ok(error) => error,
            Err(err) => {
                log::trace!("Objective evaluation failed: {err}");
                f64::INFINITY
            }
        }
    }
}

/// One-shot reprojection error for a pose against a detection
///
/// # Errors
///
/// Returns an error for a degenerate camera, detection or pose
pub fn compute_error(
    pose: &Pose,
    model: &HeadModel,
    detection: &FaceDetection,
    camera: &CameraProjection,
    image_width: f64,
    image_height: f64,
) -> Result<f64> {
    let scene = AnalyticScene::new(model.clone(), camera, image_width, image_height)?;
    ReprojectionObjective::new(scene, detection)?.compute_error(pose)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face_detection::{BoundingBox, LandmarkRegion};
    use crate::synthetic::detection_from_pose;

    const IMAGE: (f64, f64) = (1080.0, 1920.0);

    fn scene() -> AnalyticScene {
        let camera = CameraProjection::reference(500.0, 700.0).unwrap();
        AnalyticScene::new(HeadModel::default(), &camera, IMAGE.0, IMAGE.1).unwrap()
    }

    fn truth() -> Pose {
        Pose::new(0.12, 0.25, 0.06, -0.12, 0.05, 0.30)
    }

    #[test]
    fn test_error_vanishes_at_ground_truth() {
        let scene = scene();
        let detection = detection_from_pose(&scene, &truth()).unwrap();
        let objective = ReprojectionObjective::new(scene, &detection).unwrap();
        assert!(objective.compute_error(&truth()).unwrap() < 1e-20);
    }

    #[test]
    fn test_error_grows_with_offset() {
        let scene = scene();
        let detection = detection_from_pose(&scene, &truth()).unwrap();
        let objective = ReprojectionObjective::new(scene, &detection).unwrap();

        let mut near = truth();
        near.position_x += 0.02;
        let mut far = truth();
        far.position_x += 0.1;

        let e_near = objective.compute_error(&near).unwrap();
        let e_far = objective.compute_error(&far).unwrap();
        assert!(e_near > 0.0);
        assert!(e_far > e_near);
    }

    #[test]
    fn test_translation_error_matches_plane_geometry() {
        let scene = scene();
        let detection = detection_from_pose(&scene, &truth()).unwrap();
        let objective = ReprojectionObjective::new(scene, &detection).unwrap();

        let mut shifted = truth();
        shifted.position_x += 0.1;
        let residuals = objective.residuals(&shifted).unwrap();
        // Anchors sit in front of the plane, so the image shift exceeds 0.1 / SCENE_WIDTH.
        for r in residuals {
            assert!(r.x > 0.05);
            assert!(r.x < 0.06);
            assert!(r.y.abs() < 1e-12);
        }
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let scene = scene();
        let detection = detection_from_pose(&scene, &truth()).unwrap();
        let objective = ReprojectionObjective::new(scene, &detection).unwrap();
        let pose = Pose::new(0.1, 0.2, 0.0, 0.0, 0.0, 0.3);
        let first = objective.compute_error(&pose).unwrap();
        let second = objective.compute_error(&pose).unwrap();
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn test_missing_landmark_group_rejected() {
        let scene = scene();
        let mut detection = detection_from_pose(&scene, &truth()).unwrap();
        detection.landmarks.remove(&LandmarkRegion::OuterLips);
        assert!(matches!(
            ReprojectionObjective::new(scene, &detection),
            Err(Error::DegenerateDetection(_))
        ));
    }

    #[test]
    fn test_targets_use_region_statistics() {
        let bbox = BoundingBox::new(0.2, 0.4, 0.5, 0.25);
        let detection = FaceDetection::new(bbox, 0.0, 0.0, 0.0)
            .with_landmarks(LandmarkRegion::LeftEye, vec![Point2::new(0.2, 0.6), Point2::new(0.4, 0.62)])
            .with_landmarks(LandmarkRegion::RightEye, vec![Point2::new(0.6, 0.6), Point2::new(0.8, 0.61)])
            .with_landmarks(LandmarkRegion::NoseCrest, vec![Point2::new(0.5, 0.5), Point2::new(0.5, 0.3)])
            .with_landmarks(LandmarkRegion::OuterLips, vec![Point2::new(0.4, 0.2), Point2::new(0.6, 0.2)]);
        let targets = landmark_targets(&detection).unwrap();

        let expect = |x: f64, y: f64| Point2::new(0.2 + x * 0.5, 0.4 + y * 0.25);
        assert!((targets[Anchor::LeftEyeLeft.index()] - expect(0.2, 0.6)).norm() < 1e-12);
        assert!((targets[Anchor::LeftEyeRight.index()] - expect(0.4, 0.62)).norm() < 1e-12);
        assert!((targets[Anchor::RightEyeLeft.index()] - expect(0.6, 0.6)).norm() < 1e-12);
        assert!((targets[Anchor::RightEyeRight.index()] - expect(0.8, 0.61)).norm() < 1e-12);
        assert!((targets[Anchor::NoseCenter.index()] - expect(0.5, 0.4)).norm() < 1e-12);
        assert!((targets[Anchor::MouthCenter.index()] - expect(0.5, 0.2)).norm() < 1e-12);
    }

    #[test]
    fn test_non_finite_pose_evaluates_to_infinity() {
        let scene = scene();
        let detection = detection_from_pose(&scene, &truth()).unwrap();
        let objective = ReprojectionObjective::new(scene, &detection).unwrap();
        let pose = Pose::new(f64::NAN, 0.0, 0.0, 0.0, 0.0, 1.0);
        assert!(objective.compute_error(&pose).is_err());
        assert_eq!(objective.evaluate(&pose), f64::INFINITY);
    }

    #[test]
    fn test_one_shot_compute_error() {
        let camera = CameraProjection::reference(500.0, 700.0).unwrap();
        let detection = detection_from_pose(&scene(), &truth()).unwrap();
        let error = compute_error(&truth(), &HeadModel::default(), &detection, &camera, IMAGE.0, IMAGE.1).unwrap();
        assert!(error < 1e-20);
    }
}
