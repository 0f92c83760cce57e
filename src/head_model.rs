//! Reference head model reduced to its named anchor points.
//!
//! The model is never rendered: each anchor is a fixed model-space offset, and
//! its world position under a pose is a closed-form transform of that offset.

use crate::face_detection::{LandmarkRegion, RegionStatistic};
use crate::pose::Pose;
use crate::{Error, Result};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of anchor correspondences driving the reprojection error
pub const ANCHOR_COUNT: usize = 6;

/// Named model locations paired with detected landmark statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    LeftEyeLeft,
    LeftEyeRight,
    RightEyeLeft,
    RightEyeRight,
    NoseCenter,
    MouthCenter,
}

impl Anchor {
    pub const ALL: [Self; ANCHOR_COUNT] = [
        Self::LeftEyeLeft,
        Self::LeftEyeRight,
        Self::RightEyeLeft,
        Self::RightEyeRight,
        Self::NoseCenter,
        Self::MouthCenter,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::LeftEyeLeft => "left_eye_left",
            Self::LeftEyeRight => "left_eye_right",
            Self::RightEyeLeft => "right_eye_left",
            Self::RightEyeRight => "right_eye_right",
            Self::NoseCenter => "nose_center",
            Self::MouthCenter => "mouth_center",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|anchor| anchor.name() == name)
    }

    /// Position of this anchor in [`Anchor::ALL`]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Detected landmark group and statistic this anchor is matched against
    #[must_use]
    pub const fn correspondence(self) -> (LandmarkRegion, RegionStatistic) {
        match self {
            Self::LeftEyeLeft => (LandmarkRegion::LeftEye, RegionStatistic::Leftmost),
            Self::LeftEyeRight => (LandmarkRegion::LeftEye, RegionStatistic::Rightmost),
            Self::RightEyeLeft => (LandmarkRegion::RightEye, RegionStatistic::Leftmost),
            Self::RightEyeRight => (LandmarkRegion::RightEye, RegionStatistic::Rightmost),
            Self::NoseCenter => (LandmarkRegion::NoseCrest, RegionStatistic::Centroid),
            Self::MouthCenter => (LandmarkRegion::OuterLips, RegionStatistic::Centroid),
        }
    }
}

/// Anchor offsets of the reference head, in model units with the head
/// centered on the origin, facing +z, bounding radius 1
const DEFAULT_ANCHOR_OFFSETS: [[f64; 3]; ANCHOR_COUNT] = [
    [-0.50, 0.20, 0.70],
    [-0.18, 0.20, 0.80],
    [0.18, 0.20, 0.80],
    [0.50, 0.20, 0.70],
    [0.00, -0.10, 0.95],
    [0.00, -0.45, 0.80],
];

const DEFAULT_BOUNDING_RADIUS: f64 = 1.0;

/// Anchor table of a head asset plus its bounding radius
#[derive(Debug, Clone, PartialEq)]
pub struct HeadModel {
    anchors: [Vector3<f64>; ANCHOR_COUNT],
    bounding_radius: f64,
}

impl Default for HeadModel {
    fn default() -> Self {
        Self {
            anchors: DEFAULT_ANCHOR_OFFSETS.map(Vector3::from),
            bounding_radius: DEFAULT_BOUNDING_RADIUS,
        }
    }
}

impl HeadModel {
    /// Build a model from offsets given in [`Anchor::ALL`] order
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for non-finite offsets or a non-positive radius
    pub fn new(anchors: [Vector3<f64>; ANCHOR_COUNT], bounding_radius: f64) -> Result<Self> {
        if !(bounding_radius.is_finite() && bounding_radius > 0.0) {
            return Err(Error::InvalidInput(format!(
                "Bounding radius must be positive, got {bounding_radius}"
            )));
        }
        if let Some(anchor) = Anchor::ALL
            .into_iter()
            .find(|a| anchors[a.index()].iter().any(|v| !v.is_finite()))
        {
            return Err(Error::InvalidInput(format!("Anchor '{}' has a non-finite offset", anchor.name())));
        }
        Ok(Self {
            anchors,
            bounding_radius,
        })
    }

    /// Build a model from a name-keyed anchor table (e.g. loaded from config)
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if any anchor is missing or invalid
    pub fn from_anchor_map(offsets: &BTreeMap<Anchor, [f64; 3]>, bounding_radius: f64) -> Result<Self> {
        let mut anchors = [Vector3::zeros(); ANCHOR_COUNT];
        for anchor in Anchor::ALL {
            let offset = offsets
                .get(&anchor)
                .ok_or_else(|| Error::InvalidInput(format!("Missing anchor '{}'", anchor.name())))?;
            anchors[anchor.index()] = Vector3::from(*offset);
        }
        Self::new(anchors, bounding_radius)
    }

    /// Name-keyed copy of the anchor table
    #[must_use]
    pub fn anchor_map(&self) -> BTreeMap<Anchor, [f64; 3]> {
        Anchor::ALL
            .into_iter()
            .map(|a| {
                let v = self.anchors[a.index()];
                (a, [v.x, v.y, v.z])
            })
            .collect()
    }

    #[must_use]
    pub fn anchor_offset(&self, anchor: Anchor) -> &Vector3<f64> {
        &self.anchors[anchor.index()]
    }

    #[must_use]
    pub fn bounding_radius(&self) -> f64 {
        self.bounding_radius
    }

    /// World position of an anchor once the model is placed at `pose`
    #[must_use]
    pub fn world_position(&self, pose: &Pose, anchor: Anchor) -> Point3<f64> {
        pose.transform_point(self.anchor_offset(anchor))
    }

    /// World positions of all anchors, in [`Anchor::ALL`] order
    #[must_use]
    pub fn world_positions(&self, pose: &Pose) -> [Point3<f64>; ANCHOR_COUNT] {
        Anchor::ALL.map(|anchor| self.world_position(pose, anchor))
    }
}
