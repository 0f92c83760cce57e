use crate::{
    constants::{DEFAULT_SCALE_FACTOR, HEAD_HEIGHT_PER_WIDTH_RATIO},
    face_detection::FaceDetection,
    head_model::{Anchor, HeadModel},
    pose::Pose,
    transform::bounding_box_center_to_scene,
    Error, Result,
};

/// Seeds a model pose from a face detection
///
/// The seed places the model over the bounding-box center, copies the
/// detector's orientation verbatim and sizes the model from the box width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseEstimator {
    scale_factor: f64,
    head_height_per_width: f64,
}

impl Default for PoseEstimator {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            head_height_per_width: HEAD_HEIGHT_PER_WIDTH_RATIO,
        }
    }
}

impl PoseEstimator {
    /// Create an estimator with a tuned scale multiplier and head proportion
    ///
    /// # Errors
    ///
    /// Returns an error if either factor is not a positive finite number
    pub fn new(scale_factor: f64, head_height_per_width: f64) -> Result<Self> {
        for (name, value) in [("scale factor", scale_factor), ("head height per width", head_height_per_width)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidInput(format!("{name} must be positive, got {value}")));
            }
        }
        Ok(Self {
            scale_factor,
            head_height_per_width,
        })
    }

    #[must_use]
    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    #[must_use]
    pub fn head_height_per_width(&self) -> f64 {
        self.head_height_per_width
    }

    /// Uniform model scale for a face box of the given image-relative width
    ///
    /// Only the width is used: the detector's box stops at the brows, so its
    /// height under-reports the head.
    ///
    /// # Errors
    ///
    /// Returns `Error::DegenerateDetection` for a non-positive width and
    /// `Error::InvalidInput` for a non-positive model radius
    pub fn estimate_scale(&self, bounding_box_width: f64, model_bounding_radius: f64) -> Result<f64> {
        if !(bounding_box_width.is_finite() && bounding_box_width > 0.0) {
            return Err(Error::DegenerateDetection(format!(
                "Bounding box width must be positive, got {bounding_box_width}"
            )));
        }
        if !(model_bounding_radius.is_finite() && model_bounding_radius > 0.0) {
            return Err(Error::InvalidInput(format!(
                "Model bounding radius must be positive, got {model_bounding_radius}"
            )));
        }
        Ok(self.scale_factor * self.head_height_per_width * bounding_box_width / model_bounding_radius)
    }

    /// Seed pose for one detected face
    ///
    /// # Errors
    ///
    /// Returns `Error::DegenerateDetection` for an invalid bounding box or
    /// orientation or when a landmark group the model anchors are matched
    /// against is missing or empty, and `Error::InvalidInput` for a
    /// non-positive image size
    pub fn estimate_initial_pose(
        &self,
        detection: &FaceDetection,
        model: &HeadModel,
        image_width: f64,
        image_height: f64,
    ) -> Result<Pose> {
        if !(image_width > 0.0 && image_height > 0.0) {
            return Err(Error::InvalidInput(format!(
                "Image size must be positive, got {image_width}x{image_height}"
            )));
        }
        detection.validate()?;
        for anchor in Anchor::ALL {
            let (region, statistic) = anchor.correspondence();
            detection.region_statistic(region, statistic)?;
        }

        let position = bounding_box_center_to_scene(&detection.bounding_box, image_width, image_height);
        let scale = self.estimate_scale(detection.bounding_box.width, model.bounding_radius())?;
        let pose = Pose::new(
            position.x,
            position.y,
            detection.pitch,
            detection.yaw,
            detection.roll,
            scale,
        );
        log::debug!(
            "Seed pose: position=({:.4}, {:.4}), pitch={:.4}, yaw={:.4}, roll={:.4}, scale={:.4}",
            pose.position_x,
            pose.position_y,
            pose.euler_pitch,
            pose.euler_yaw,
            pose.euler_roll,
            pose.scale
        );
        Ok(pose)
    }
}

/// Seed pose using the default estimator constants
///
/// # Errors
///
/// See [`PoseEstimator::estimate_initial_pose`]
pub fn estimate_initial_pose(
    detection: &FaceDetection,
    model: &HeadModel,
    image_width: f64,
    image_height: f64,
) -> Result<Pose> {
    PoseEstimator::default().estimate_initial_pose(detection, model, image_width, image_height)
}
