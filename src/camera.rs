//! Camera model and perspective projection onto the photograph.

use crate::constants::{
    DEFAULT_Z_FAR, DEFAULT_Z_NEAR, EPSILON, REFERENCE_CAMERA_DISTANCE, REFERENCE_FIELD_OF_VIEW, W_EPSILON,
};
use crate::transform::{fit_rect_into_bounds, image_to_scene, perspective_divide, scene_height, scene_to_clipping};
use crate::{Error, Result};
use nalgebra::{Matrix3, Matrix4, Perspective3, Point2, Point3, SMatrix, SVector, Vector3};

/// View and projection transforms of the camera looking at the scene
///
/// `view` is the camera's world transform (camera → world); `projection`
/// takes camera space to clip space.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraProjection {
    view: Matrix4<f64>,
    projection: Matrix4<f64>,
}

impl CameraProjection {
    #[must_use]
    pub fn new(view: Matrix4<f64>, projection: Matrix4<f64>) -> Self {
        Self { view, projection }
    }

    /// Camera on the +z axis at `distance`, looking at the origin through a
    /// symmetric perspective frustum
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for a non-positive aspect, a field of view
    /// outside `(0, π)`, inverted clip planes or a non-positive distance
    pub fn perspective(field_of_view: f64, aspect: f64, z_near: f64, z_far: f64, distance: f64) -> Result<Self> {
        if !(aspect.is_finite() && aspect > EPSILON) {
            return Err(Error::InvalidInput(format!("Aspect ratio must be positive, got {aspect}")));
        }
        if !(field_of_view > 0.0 && field_of_view < std::f64::consts::PI) {
            return Err(Error::InvalidInput(format!(
                "Field of view must be in (0, π), got {field_of_view}"
            )));
        }
        if !(z_near > 0.0 && z_far > z_near) {
            return Err(Error::InvalidInput(format!(
                "Clip planes must satisfy 0 < near < far, got near={z_near}, far={z_far}"
            )));
        }
        if !(distance.is_finite() && distance > 0.0) {
            return Err(Error::InvalidInput(format!("Camera distance must be positive, got {distance}")));
        }
        let view = Matrix4::new_translation(&Vector3::new(0.0, 0.0, distance));
        let projection = Perspective3::new(aspect, field_of_view, z_near, z_far).to_homogeneous();
        Ok(Self::new(view, projection))
    }

    /// Fixed camera used as the reference fixture: translation `z = 3.4641`,
    /// 60° vertical field of view (projection diagonal ≈ 1.732)
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for a non-positive screen size
    pub fn reference(screen_width: f64, screen_height: f64) -> Result<Self> {
        Self::perspective(
            REFERENCE_FIELD_OF_VIEW,
            screen_aspect(screen_width, screen_height)?,
            DEFAULT_Z_NEAR,
            DEFAULT_Z_FAR,
            REFERENCE_CAMERA_DISTANCE,
        )
    }

    /// Camera placed so the image plane exactly fills its letterboxed
    /// rectangle on a screen of the given size
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for non-positive sizes or an invalid field of view
    pub fn framing(
        screen_width: f64,
        screen_height: f64,
        image_width: f64,
        image_height: f64,
        field_of_view: f64,
    ) -> Result<Self> {
        let aspect = screen_aspect(screen_width, screen_height)?;
        if !(image_width > 0.0 && image_height > 0.0) {
            return Err(Error::InvalidInput(format!(
                "Image size must be positive, got {image_width}x{image_height}"
            )));
        }
        let (_, fitted_height) = fit_rect_into_bounds(screen_width, screen_height, image_width, image_height);
        let focal = 1.0 / (field_of_view / 2.0).tan();
        // Top edge of the plane must land at ndc y = fitted_height / screen_height.
        let distance = focal * scene_height(image_width, image_height) * screen_height / (2.0 * fitted_height);
        Self::perspective(field_of_view, aspect, DEFAULT_Z_NEAR, DEFAULT_Z_FAR, distance)
    }

    #[must_use]
    pub fn view(&self) -> &Matrix4<f64> {
        &self.view
    }

    #[must_use]
    pub fn projection(&self) -> &Matrix4<f64> {
        &self.projection
    }

    /// Combined world → clip transform
    ///
    /// # Errors
    ///
    /// Returns `Error::DegenerateProjection` if the view transform is singular
    pub fn view_projection(&self) -> Result<Matrix4<f64>> {
        let world_to_camera = self
            .view
            .try_inverse()
            .ok_or_else(|| Error::DegenerateProjection("View transform is not invertible".to_string()))?;
        Ok(self.projection * world_to_camera)
    }

    /// Project a scene point into clipping space
    ///
    /// # Errors
    ///
    /// Returns `Error::DegenerateProjection` on a singular view or `w ≈ 0`
    pub fn project_to_clipping(&self, point: &Point3<f64>) -> Result<Point3<f64>> {
        scene_to_clipping(point, &self.view, &self.projection)
    }
}

fn screen_aspect(screen_width: f64, screen_height: f64) -> Result<f64> {
    if !(screen_width > 0.0 && screen_height > 0.0) {
        return Err(Error::InvalidInput(format!(
            "Screen size must be positive, got {screen_width}x{screen_height}"
        )));
    }
    Ok(screen_width / screen_height)
}

/// Precomputed projection of world points into image-relative coordinates
///
/// The photograph's plane is projected through the camera once; the
/// homography taking its four projected corners back to the unit square then
/// maps any clip-space position onto the image, whatever the screen/image
/// aspect mismatch.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePlane {
    view_projection: Matrix4<f64>,
    clip_to_image: Matrix3<f64>,
}

impl ImagePlane {
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for a non-positive image size and
    /// `Error::DegenerateProjection` if the plane does not project to a proper quad
    pub fn new(camera: &CameraProjection, image_width: f64, image_height: f64) -> Result<Self> {
        if !(image_width > 0.0 && image_height > 0.0) {
            return Err(Error::InvalidInput(format!(
                "Image size must be positive, got {image_width}x{image_height}"
            )));
        }
        let view_projection = camera.view_projection()?;
        let corners = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let mut projected = [Point2::origin(); 4];
        for (dst, corner) in projected.iter_mut().zip(corners.iter()) {
            let scene = image_to_scene(corner, image_width, image_height);
            let clip = perspective_divide(&(view_projection * scene.to_homogeneous()))?;
            *dst = clip.xy();
        }
        let clip_to_image = homography_from_correspondences(&projected, &corners)?;
        Ok(Self {
            view_projection,
            clip_to_image,
        })
    }

    /// Project a world point to clipping space
    ///
    /// Only points in front of the camera have an image; anything on or
    /// behind the camera plane would otherwise come out mirrored.
    ///
    /// # Errors
    ///
    /// Returns `Error::DegenerateProjection` when `w` is not clearly positive
    pub fn project_to_clipping(&self, world: &Point3<f64>) -> Result<Point3<f64>> {
        let clip = self.view_projection * world.to_homogeneous();
        if clip.w.is_finite() && clip.w <= W_EPSILON {
            return Err(Error::DegenerateProjection(format!(
                "Point {world:?} lies behind the camera (w = {})",
                clip.w
            )));
        }
        perspective_divide(&clip)
    }

    /// Map a clipping-space position onto the photograph
    ///
    /// # Errors
    ///
    /// Returns `Error::DegenerateProjection` if the homography sends the point to infinity
    pub fn clipping_to_image(&self, clip: &Point2<f64>) -> Result<Point2<f64>> {
        let mapped = self.clip_to_image * clip.to_homogeneous();
        if !mapped.z.is_finite() || mapped.z.abs() <= EPSILON {
            return Err(Error::DegenerateProjection(format!(
                "Clip point {clip:?} maps to infinity on the image plane"
            )));
        }
        Ok(Point2::new(mapped.x / mapped.z, mapped.y / mapped.z))
    }

    /// Project a world point to image-relative coordinates
    ///
    /// # Errors
    ///
    /// Returns `Error::DegenerateProjection` if either projection step degenerates
    pub fn project(&self, world: &Point3<f64>) -> Result<Point2<f64>> {
        let clip = self.project_to_clipping(world)?;
        self.clipping_to_image(&clip.xy())
    }
}

/// Project a scene point through the camera into image-relative coordinates
///
/// # Errors
///
/// Returns `Error::DegenerateProjection` for a degenerate camera or point
pub fn scene_to_image_perspective(
    point: &Point3<f64>,
    camera: &CameraProjection,
    image_width: f64,
    image_height: f64,
) -> Result<Point2<f64>> {
    ImagePlane::new(camera, image_width, image_height)?.project(point)
}

/// Direct linear solve for the homography sending each `src[i]` to `dst[i]`
fn homography_from_correspondences(src: &[Point2<f64>; 4], dst: &[Point2<f64>; 4]) -> Result<Matrix3<f64>> {
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
        let r = 2 * i;
        a[(r, 0)] = s.x;
        a[(r, 1)] = s.y;
        a[(r, 2)] = 1.0;
        a[(r, 6)] = -d.x * s.x;
        a[(r, 7)] = -d.x * s.y;
        b[r] = d.x;

        a[(r + 1, 3)] = s.x;
        a[(r + 1, 4)] = s.y;
        a[(r + 1, 5)] = 1.0;
        a[(r + 1, 6)] = -d.y * s.x;
        a[(r + 1, 7)] = -d.y * s.y;
        b[r + 1] = d.y;
    }
    let h = a
        .lu()
        .solve(&b)
        .ok_or_else(|| Error::DegenerateProjection("Image plane projects to a degenerate quad".to_string()))?;
    Ok(Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0))
}
