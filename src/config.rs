//! Configuration management for the alignment engine

use crate::{
    camera::CameraProjection,
    constants::{
        DEFAULT_ALPHA, DEFAULT_CONVERGENCE_THRESHOLD, DEFAULT_MAX_ITERATIONS, DEFAULT_SCALE_FACTOR, DEFAULT_Z_FAR,
        DEFAULT_Z_NEAR, HEAD_HEIGHT_PER_WIDTH_RATIO, REFERENCE_CAMERA_DISTANCE,
    },
    head_model::{Anchor, HeadModel},
    optimizer::GradientDescent,
    pose_estimation::PoseEstimator,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Camera looking at the photograph
    pub camera: CameraConfig,

    /// Initial pose estimation
    pub estimator: EstimatorConfig,

    /// Pose refinement
    pub optimizer: OptimizerConfig,

    /// Reference head model
    pub model: ModelConfig,
}

/// Camera parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Viewport width in pixels
    pub screen_width: f64,

    /// Viewport height in pixels
    pub screen_height: f64,

    /// Vertical field of view in degrees
    pub field_of_view_deg: f64,

    /// Near clip plane
    pub z_near: f64,

    /// Far clip plane
    pub z_far: f64,

    /// Camera distance from the image plane; when absent the camera is placed
    /// so the photograph fills its letterboxed rectangle on screen
    pub distance: Option<f64>,
}

/// Initial pose estimator parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Multiplier applied to the anthropometric scale estimate
    pub scale_factor: f64,

    /// Head height as a multiple of the detected face width
    pub head_height_per_width: f64,
}

/// Pose refiner parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Finite-difference step and descent step size
    pub alpha: f64,

    /// Squared gradient norm at which refinement stops
    pub convergence_threshold: f64,

    /// Iteration cap
    pub max_iterations: usize,
}

/// Head model anchor table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Radius of the model's bounding sphere in model units
    pub bounding_radius: f64,

    /// Model-space offset of every anchor
    pub anchors: BTreeMap<Anchor, [f64; 3]>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            screen_width: 500.0,
            screen_height: 700.0,
            field_of_view_deg: 60.0,
            z_near: DEFAULT_Z_NEAR,
            z_far: DEFAULT_Z_FAR,
            distance: Some(REFERENCE_CAMERA_DISTANCE),
        }
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            head_height_per_width: HEAD_HEIGHT_PER_WIDTH_RATIO,
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            convergence_threshold: DEFAULT_CONVERGENCE_THRESHOLD,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        let model = HeadModel::default();
        Self {
            bounding_radius: model.bounding_radius(),
            anchors: model.anchor_map(),
        }
    }
}

impl CameraConfig {
    /// Build the camera for a photograph of the given pixel size
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for invalid camera or image parameters
    pub fn camera(&self, image_width: f64, image_height: f64) -> Result<CameraProjection> {
        let field_of_view = self.field_of_view_deg.to_radians();
        match self.distance {
            Some(distance) => CameraProjection::perspective(
                field_of_view,
                self.screen_width / self.screen_height,
                self.z_near,
                self.z_far,
                distance,
            ),
            None => CameraProjection::framing(
                self.screen_width,
                self.screen_height,
                image_width,
                image_height,
                field_of_view,
            ),
        }
    }
}

impl EstimatorConfig {
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for non-positive factors
    pub fn estimator(&self) -> Result<PoseEstimator> {
        PoseEstimator::new(self.scale_factor, self.head_height_per_width)
    }
}

impl OptimizerConfig {
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for invalid refiner parameters
    pub fn optimizer(&self) -> Result<GradientDescent> {
        GradientDescent::new(self.alpha, self.convergence_threshold, self.max_iterations)
    }
}

impl ModelConfig {
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for a missing anchor, a non-finite offset
    /// or a non-positive radius
    pub fn model(&self) -> Result<HeadModel> {
        HeadModel::from_anchor_map(&self.anchors, self.bounding_radius)
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::IoError(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content).map_err(|e| Error::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let camera = &self.camera;
        if !(camera.screen_width > 0.0 && camera.screen_height > 0.0) {
            return Err(Error::ConfigError(format!(
                "Screen size must be positive, got {}x{}",
                camera.screen_width, camera.screen_height
            )));
        }
        if !(camera.field_of_view_deg > 0.0 && camera.field_of_view_deg < 180.0) {
            return Err(Error::ConfigError(
                "Field of view must be between 0 and 180 degrees (exclusive)".to_string(),
            ));
        }
        if !(camera.z_near > 0.0 && camera.z_far > camera.z_near) {
            return Err(Error::ConfigError("Clip planes must satisfy 0 < z_near < z_far".to_string()));
        }
        if let Some(distance) = camera.distance {
            if !(distance.is_finite() && distance > 0.0) {
                return Err(Error::ConfigError("Camera distance must be positive".to_string()));
            }
        }

        if !(self.estimator.scale_factor.is_finite() && self.estimator.scale_factor > 0.0) {
            return Err(Error::ConfigError("Scale factor must be greater than 0".to_string()));
        }
        if !(self.estimator.head_height_per_width.is_finite() && self.estimator.head_height_per_width > 0.0) {
            return Err(Error::ConfigError("Head height per width must be greater than 0".to_string()));
        }

        self.optimizer
            .optimizer()
            .map_err(|e| Error::ConfigError(format!("Invalid optimizer settings: {e}")))?;

        self.model
            .model()
            .map_err(|e| Error::ConfigError(format!("Invalid head model: {e}")))?;

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Head Pose Alignment Configuration

# Camera looking at the photograph
camera:
  screen_width: 500.0
  screen_height: 700.0
  field_of_view_deg: 60.0
  z_near: 0.1
  z_far: 100.0
  # Remove to place the camera so the photo fills the screen
  distance: 3.4641016151377546

# Initial pose estimation
estimator:
  scale_factor: 1.0
  head_height_per_width: 1.3

# Pose refinement
optimizer:
  alpha: 0.01
  convergence_threshold: 0.0001
  max_iterations: 300

# Reference head model (model units, facing +z)
model:
  bounding_radius: 1.0
  anchors:
    left_eye_left: [-0.5, 0.2, 0.7]
    left_eye_right: [-0.18, 0.2, 0.8]
    right_eye_left: [0.18, 0.2, 0.8]
    right_eye_right: [0.5, 0.2, 0.7]
    nose_center: [0.0, -0.1, 0.95]
    mouth_center: [0.0, -0.45, 0.8]
"#;
