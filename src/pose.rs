//! Six-parameter placement of the head model in the scene.

use crate::constants::{MIN_SCALE, POSE_DIMENSIONS};
use nalgebra::{Matrix4, Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Position, orientation and uniform scale of a placed model instance
///
/// Rotation is applied as roll (about z), then pitch (about x), then yaw
/// (about y): `R = Ry(yaw) · Rx(pitch) · Rz(roll)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// World-space x offset
    pub position_x: f64,
    /// World-space y offset
    pub position_y: f64,
    /// Depth; held fixed while refining
    #[serde(default)]
    pub position_z: f64,
    /// Rotation about the x axis in radians
    pub euler_pitch: f64,
    /// Rotation about the y axis in radians
    pub euler_yaw: f64,
    /// Rotation about the z axis in radians
    pub euler_roll: f64,
    /// Uniform scale, always positive
    pub scale: f64,
}

impl Default for Pose {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0, 0.0, 1.0)
    }
}

impl Pose {
    /// Pose on the image plane (`z = 0`)
    #[must_use]
    pub fn new(position_x: f64, position_y: f64, pitch: f64, yaw: f64, roll: f64, scale: f64) -> Self {
        Self {
            position_x,
            position_y,
            position_z: 0.0,
            euler_pitch: pitch,
            euler_yaw: yaw,
            euler_roll: roll,
            scale,
        }
    }

    /// Parameter vector in refiner order: x, y, pitch, yaw, roll, scale
    #[must_use]
    pub fn to_parameters(&self) -> [f64; POSE_DIMENSIONS] {
        [
            self.position_x,
            self.position_y,
            self.euler_pitch,
            self.euler_yaw,
            self.euler_roll,
            self.scale,
        ]
    }

    /// Copy of this pose with the refined parameters written back
    ///
    /// Depth is kept; scale is clamped to stay positive.
    #[must_use]
    pub fn with_parameters(&self, parameters: &[f64; POSE_DIMENSIONS]) -> Self {
        Self {
            position_x: parameters[0],
            position_y: parameters[1],
            position_z: self.position_z,
            euler_pitch: parameters[2],
            euler_yaw: parameters[3],
            euler_roll: parameters[4],
            scale: parameters[5].max(MIN_SCALE),
        }
    }

    #[must_use]
    pub fn translation(&self) -> Vector3<f64> {
        Vector3::new(self.position_x, self.position_y, self.position_z)
    }

    #[must_use]
    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::from_axis_angle(&Vector3::y_axis(), self.euler_yaw)
            * Rotation3::from_axis_angle(&Vector3::x_axis(), self.euler_pitch)
            * Rotation3::from_axis_angle(&Vector3::z_axis(), self.euler_roll)
    }

    /// Model → world transform `T · R · S`
    #[must_use]
    pub fn model_matrix(&self) -> Matrix4<f64> {
        Matrix4::new_translation(&self.translation())
            * self.rotation().to_homogeneous()
            * Matrix4::new_scaling(self.scale)
    }

    /// World position of a model-space offset
    #[must_use]
    pub fn transform_point(&self, offset: &Vector3<f64>) -> Point3<f64> {
        Point3::from(self.rotation() * (offset * self.scale) + self.translation())
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.to_parameters().iter().all(|v| v.is_finite()) && self.position_z.is_finite()
    }
}
