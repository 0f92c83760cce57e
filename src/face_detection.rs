//! Face detection records consumed by the alignment engine.
//!
//! Detections are produced by an external face analyser. Coordinates follow the
//! detector's convention: the bounding box lives in image-relative `[0, 1]²`
//! space with a bottom-left origin, and every landmark point is normalized to
//! the bounding box of its face (not to the image).

use crate::{Error, Result};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Slack allowed when checking that a bounding box lies inside the unit square
const UNIT_SQUARE_TOLERANCE: f64 = 1e-9;

/// Axis-aligned face rectangle in image-relative coordinates (bottom-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge
    pub x: f64,
    /// Bottom edge
    pub y: f64,
    /// Horizontal extent
    pub width: f64,
    /// Vertical extent
    pub height: f64,
}

impl BoundingBox {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    #[must_use]
    pub fn min_x(&self) -> f64 {
        self.x
    }

    #[must_use]
    pub fn min_y(&self) -> f64 {
        self.y
    }

    #[must_use]
    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    /// Center of the box in image-relative coordinates
    #[must_use]
    pub fn center(&self) -> Point2<f64> {
        Point2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Smallest box enclosing all `points`, or `None` for an empty slice
    #[must_use]
    pub fn enclosing(points: &[Point2<f64>]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self::new(min_x, min_y, max_x - min_x, max_y - min_y))
    }

    /// Check the box is finite, has positive area and lies inside `[0, 1]²`
    ///
    /// # Errors
    ///
    /// Returns `Error::DegenerateDetection` describing the first violated constraint
    pub fn validate(&self) -> Result<()> {
        if ![self.x, self.y, self.width, self.height].iter().all(|v| v.is_finite()) {
            return Err(Error::DegenerateDetection(format!(
                "Bounding box has non-finite components: {self:?}"
            )));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(Error::DegenerateDetection(format!(
                "Bounding box has zero area: width={}, height={}",
                self.width, self.height
            )));
        }
        let inside = self.min_x() >= -UNIT_SQUARE_TOLERANCE
            && self.min_y() >= -UNIT_SQUARE_TOLERANCE
            && self.max_x() <= 1.0 + UNIT_SQUARE_TOLERANCE
            && self.max_y() <= 1.0 + UNIT_SQUARE_TOLERANCE;
        if !inside {
            return Err(Error::DegenerateDetection(format!(
                "Bounding box leaves the unit square: {self:?}"
            )));
        }
        Ok(())
    }
}

/// Named anatomical landmark groups reported by the detector
///
/// `LeftEye` and `RightEye` are named from the viewer's side: the left eye is
/// the one closer to the left edge of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkRegion {
    OuterLips,
    InnerLips,
    Nose,
    NoseCrest,
    LeftEye,
    RightEye,
    LeftEyebrow,
    RightEyebrow,
    MedianLine,
    FaceContour,
}

impl LandmarkRegion {
    /// Stable snake-case name, matching the serialized form
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::OuterLips => "outer_lips",
            Self::InnerLips => "inner_lips",
            Self::Nose => "nose",
            Self::NoseCrest => "nose_crest",
            Self::LeftEye => "left_eye",
            Self::RightEye => "right_eye",
            Self::LeftEyebrow => "left_eyebrow",
            Self::RightEyebrow => "right_eyebrow",
            Self::MedianLine => "median_line",
            Self::FaceContour => "face_contour",
        }
    }
}

/// Reduction of a landmark group to a single representative point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionStatistic {
    /// Point with the smallest x
    Leftmost,
    /// Point with the largest x
    Rightmost,
    /// Arithmetic mean of all points
    Centroid,
}

impl RegionStatistic {
    /// Reduce `points`, returning `None` when the group is empty
    #[must_use]
    pub fn apply(self, points: &[Point2<f64>]) -> Option<Point2<f64>> {
        let first = *points.first()?;
        match self {
            Self::Leftmost => Some(points.iter().copied().fold(first, |best, p| if p.x < best.x { p } else { best })),
            Self::Rightmost => Some(points.iter().copied().fold(first, |best, p| if p.x > best.x { p } else { best })),
            Self::Centroid => {
                let n = points.len() as f64;
                let sum = points.iter().fold(nalgebra::Vector2::zeros(), |acc, p| acc + p.coords);
                Some(Point2::from(sum / n))
            }
        }
    }
}

/// Result of face analysis for one face in one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    /// Face extent in image-relative coordinates
    pub bounding_box: BoundingBox,
    /// Head roll estimate in radians
    pub roll: f64,
    /// Head pitch estimate in radians
    pub pitch: f64,
    /// Head yaw estimate in radians
    pub yaw: f64,
    /// Landmark groups in face-relative coordinates
    #[serde(default)]
    pub landmarks: BTreeMap<LandmarkRegion, Vec<Point2<f64>>>,
}

impl FaceDetection {
    /// Create a detection without landmarks
    #[must_use]
    pub fn new(bounding_box: BoundingBox, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self {
            bounding_box,
            roll,
            pitch,
            yaw,
            landmarks: BTreeMap::new(),
        }
    }

    /// Attach (or replace) a landmark group
    #[must_use]
    pub fn with_landmarks(mut self, region: LandmarkRegion, points: Vec<Point2<f64>>) -> Self {
        self.landmarks.insert(region, points);
        self
    }

    /// Points of a landmark group, if the detector reported it
    #[must_use]
    pub fn landmarks(&self, region: LandmarkRegion) -> Option<&[Point2<f64>]> {
        self.landmarks.get(&region).map(Vec::as_slice)
    }

    /// Reduce a landmark group to one face-relative point
    ///
    /// # Errors
    ///
    /// Returns `Error::DegenerateDetection` if the group is missing or empty
    pub fn region_statistic(&self, region: LandmarkRegion, statistic: RegionStatistic) -> Result<Point2<f64>> {
        let points = self.landmarks(region).ok_or_else(|| {
            Error::DegenerateDetection(format!("Missing landmark group '{}'", region.name()))
        })?;
        statistic
            .apply(points)
            .ok_or_else(|| Error::DegenerateDetection(format!("Landmark group '{}' is empty", region.name())))
    }

    /// Validate the bounding box, orientation and landmark values
    ///
    /// # Errors
    ///
    /// Returns `Error::DegenerateDetection` if any component would poison the pose math
    pub fn validate(&self) -> Result<()> {
        self.bounding_box.validate()?;
        if ![self.roll, self.pitch, self.yaw].iter().all(|v| v.is_finite()) {
            return Err(Error::DegenerateDetection(format!(
                "Non-finite head orientation: roll={}, pitch={}, yaw={}",
                self.roll, self.pitch, self.yaw
            )));
        }
        for (region, points) in &self.landmarks {
            if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
                return Err(Error::DegenerateDetection(format!(
                    "Landmark group '{}' contains non-finite points",
                    region.name()
                )));
            }
        }
        Ok(())
    }
}
