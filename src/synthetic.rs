//! Ground-truth face detections rendered from a known model pose.
//!
//! The landmark groups are built so that each anchor's region statistic lands
//! exactly on the anchor's projection, which makes the known pose a zero of
//! the reprojection error.

use crate::{
    face_detection::{BoundingBox, FaceDetection, LandmarkRegion},
    head_model::Anchor,
    objective::SceneAdapter,
    pose::Pose,
    transform::image_to_landmark,
    Error, Result,
};
use nalgebra::{Point2, Vector2};

/// Horizontal padding on each side of the anchor extent, as a fraction of its width
const BOX_SIDE_PADDING: f64 = 0.25;

/// Padding below the mouth and above the eyes, as fractions of the anchor extent height
const BOX_BOTTOM_PADDING: f64 = 0.35;
const BOX_TOP_PADDING: f64 = 0.35;

/// Render a detection whose landmarks agree with `pose` projected through `scene`
///
/// # Errors
///
/// Returns `Error::InvalidInput` if the pose mirrors the eye corners or pushes
/// the face outside the image, and propagates projection failures
pub fn detection_from_pose<S: SceneAdapter>(scene: &S, pose: &Pose) -> Result<FaceDetection> {
    let projected = scene.project_anchors(pose)?;
    let at = |anchor: Anchor| projected[anchor.index()];

    let (lel, ler, rel, rer) = (
        at(Anchor::LeftEyeLeft),
        at(Anchor::LeftEyeRight),
        at(Anchor::RightEyeLeft),
        at(Anchor::RightEyeRight),
    );
    if lel.x >= ler.x || rel.x >= rer.x {
        return Err(Error::InvalidInput(
            "Pose turns the face so far that eye corners swap sides".to_string(),
        ));
    }

    let extent = BoundingBox::enclosing(&projected)
        .ok_or_else(|| Error::InvalidInput("No anchors to enclose".to_string()))?;
    let bounding_box = BoundingBox::new(
        extent.x - BOX_SIDE_PADDING * extent.width,
        extent.y - BOX_BOTTOM_PADDING * extent.height,
        extent.width * (1.0 + 2.0 * BOX_SIDE_PADDING),
        extent.height * (1.0 + BOX_BOTTOM_PADDING + BOX_TOP_PADDING),
    );
    bounding_box
        .validate()
        .map_err(|err| Error::InvalidInput(format!("Synthetic face does not fit the image: {err}")))?;

    let eye = |left: Point2<f64>, right: Point2<f64>| {
        let mid = Point2::from((left.coords + right.coords) / 2.0);
        let lid = Vector2::new(0.0, 0.25 * (right.x - left.x));
        vec![left, mid + lid, right, mid - lid]
    };
    let nose = at(Anchor::NoseCenter);
    let mouth = at(Anchor::MouthCenter);
    let feature = 0.15 * extent.width;
    let crest = Vector2::new(0.0, feature);
    let lips_w = Vector2::new(feature, 0.0);
    let lips_h = Vector2::new(0.0, 0.3 * feature);

    let groups = [
        (LandmarkRegion::LeftEye, eye(lel, ler)),
        (LandmarkRegion::RightEye, eye(rel, rer)),
        (LandmarkRegion::NoseCrest, vec![nose + crest, nose - crest]),
        (
            LandmarkRegion::OuterLips,
            vec![mouth - lips_w, mouth + lips_h, mouth + lips_w, mouth - lips_h],
        ),
        (LandmarkRegion::MedianLine, vec![nose, mouth]),
    ];

    let mut detection = FaceDetection::new(bounding_box, pose.euler_roll, pose.euler_pitch, pose.euler_yaw);
    for (region, points) in groups {
        let face_relative = points
            .iter()
            .map(|p| image_to_landmark(p, &bounding_box))
            .collect::<Result<Vec<_>>>()?;
        detection = detection.with_landmarks(region, face_relative);
    }
    Ok(detection)
}
