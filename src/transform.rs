//! Coordinate conversions between the four spaces used by the alignment engine.
//!
//! - **Image space**: image-relative `[0, 1]²`, bottom-left origin.
//! - **Landmark space**: `[0, 1]²` relative to a face bounding box.
//! - **Scene space**: 3D world units. The photograph is laid on the `z = 0`
//!   plane, centered on the origin, [`SCENE_WIDTH`] wide and as tall as the
//!   image aspect ratio requires.
//! - **Clipping space**: normalized device coordinates after perspective
//!   division, roughly `[-1, 1]` on each visible axis.
//!
//! Every function here is pure and reentrant.

use crate::constants::{SCENE_WIDTH, W_EPSILON};
use crate::face_detection::BoundingBox;
use crate::{Error, Result};
use nalgebra::{Matrix4, Point2, Point3, Vector4};

/// Height of the scene-space image plane for an image of the given size
#[must_use]
pub fn scene_height(image_width: f64, image_height: f64) -> f64 {
    SCENE_WIDTH * image_height / image_width
}

/// Map an image-relative point onto the scene-space image plane (`z = 0`)
#[must_use]
pub fn image_to_scene(point: &Point2<f64>, image_width: f64, image_height: f64) -> Point3<f64> {
    let height = scene_height(image_width, image_height);
    Point3::new((point.x - 0.5) * SCENE_WIDTH, (point.y - 0.5) * height, 0.0)
}

/// Inverse of [`image_to_scene`]; the `z` component is ignored
#[must_use]
pub fn scene_to_image(point: &Point3<f64>, image_width: f64, image_height: f64) -> Point2<f64> {
    let height = scene_height(image_width, image_height);
    Point2::new(point.x / SCENE_WIDTH + 0.5, point.y / height + 0.5)
}

/// Divide a homogeneous clip-space vector by its `w` component
///
/// # Errors
///
/// Returns `Error::DegenerateProjection` if `w` is zero, near zero or not finite
pub fn perspective_divide(clip: &Vector4<f64>) -> Result<Point3<f64>> {
    let w = clip.w;
    if !w.is_finite() || w.abs() <= W_EPSILON {
        return Err(Error::DegenerateProjection(format!("Homogeneous w is degenerate: {w}")));
    }
    let ndc = Point3::new(clip.x / w, clip.y / w, clip.z / w);
    if !(ndc.x.is_finite() && ndc.y.is_finite() && ndc.z.is_finite()) {
        return Err(Error::DegenerateProjection(format!(
            "Perspective division produced non-finite coordinates: {ndc:?}"
        )));
    }
    Ok(ndc)
}

/// Project a scene point into clipping space
///
/// `view_transform` is the camera's world transform; the point is taken into
/// camera space through its inverse, then through `projection_transform`, then
/// divided by `w`.
///
/// # Errors
///
/// Returns `Error::DegenerateProjection` if the view transform is singular or `w ≈ 0`
pub fn scene_to_clipping(
    point: &Point3<f64>,
    view_transform: &Matrix4<f64>,
    projection_transform: &Matrix4<f64>,
) -> Result<Point3<f64>> {
    let world_to_camera = view_transform
        .try_inverse()
        .ok_or_else(|| Error::DegenerateProjection("View transform is not invertible".to_string()))?;
    perspective_divide(&(projection_transform * world_to_camera * point.to_homogeneous()))
}

/// Map a clipping-space point to viewport pixels (top-left origin)
#[must_use]
pub fn clipping_to_viewport(clip: &Point3<f64>, screen_width: f64, screen_height: f64) -> Point2<f64> {
    Point2::new(
        (clip.x + 1.0) * 0.5 * screen_width,
        (1.0 - clip.y) * 0.5 * screen_height,
    )
}

/// Map a face-relative landmark point into image-relative coordinates
#[must_use]
pub fn landmark_to_image(point: &Point2<f64>, bounding_box: &BoundingBox) -> Point2<f64> {
    Point2::new(
        bounding_box.min_x() + point.x * bounding_box.width,
        bounding_box.min_y() + point.y * bounding_box.height,
    )
}

/// Inverse of [`landmark_to_image`]
///
/// # Errors
///
/// Returns `Error::DegenerateDetection` for a zero-area bounding box
pub fn image_to_landmark(point: &Point2<f64>, bounding_box: &BoundingBox) -> Result<Point2<f64>> {
    if bounding_box.width.abs() <= f64::EPSILON || bounding_box.height.abs() <= f64::EPSILON {
        return Err(Error::DegenerateDetection(format!(
            "Cannot normalize against zero-area bounding box {bounding_box:?}"
        )));
    }
    Ok(Point2::new(
        (point.x - bounding_box.min_x()) / bounding_box.width,
        (point.y - bounding_box.min_y()) / bounding_box.height,
    ))
}

/// Scene-space position (`z = 0`) of a bounding box center
#[must_use]
pub fn bounding_box_center_to_scene(bounding_box: &BoundingBox, image_width: f64, image_height: f64) -> Point3<f64> {
    image_to_scene(&bounding_box.center(), image_width, image_height)
}

/// Largest size with the inner aspect ratio that fits inside the outer bounds
#[must_use]
pub fn fit_rect_into_bounds(outer_width: f64, outer_height: f64, inner_width: f64, inner_height: f64) -> (f64, f64) {
    let scale = (outer_width / inner_width).min(outer_height / inner_height);
    (inner_width * scale, inner_height * scale)
}
