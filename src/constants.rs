//! Constants used throughout the alignment engine

/// Width of the image plane in scene units; height follows the image aspect ratio
pub const SCENE_WIDTH: f64 = 2.0;

/// Head height divided by face bounding-box width (anthropometric)
pub const HEAD_HEIGHT_PER_WIDTH_RATIO: f64 = 1.3;

/// Default multiplier applied on top of the anthropometric scale estimate
pub const DEFAULT_SCALE_FACTOR: f64 = 1.0;

/// Finite-difference perturbation and descent step of the pose refiner
pub const DEFAULT_ALPHA: f64 = 0.01;

/// Squared-gradient-norm convergence threshold of the pose refiner
pub const DEFAULT_CONVERGENCE_THRESHOLD: f64 = 0.0001;

/// Iteration cap of the pose refiner
pub const DEFAULT_MAX_ITERATIONS: usize = 300;

/// Number of pose parameters (x, y, pitch, yaw, roll, scale)
pub const POSE_DIMENSIONS: usize = 6;

/// Smallest scale a refined pose may take
pub const MIN_SCALE: f64 = 1e-6;

/// Homogeneous `w` magnitude below which perspective division is refused
pub const W_EPSILON: f64 = 1e-9;

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-10;

/// Camera distance of the reference camera (2 * sqrt(3))
pub const REFERENCE_CAMERA_DISTANCE: f64 = 3.464_101_615_137_754_6;

/// Vertical field of view of the reference camera (60 degrees)
pub const REFERENCE_FIELD_OF_VIEW: f64 = std::f64::consts::FRAC_PI_3;

/// Near clipping plane distance
pub const DEFAULT_Z_NEAR: f64 = 0.1;

/// Far clipping plane distance
pub const DEFAULT_Z_FAR: f64 = 100.0;
