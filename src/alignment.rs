//! End-to-end alignment: detection → seed pose → refined pose.

use crate::{
    camera::CameraProjection,
    config::Config,
    face_detection::FaceDetection,
    head_model::HeadModel,
    objective::{AnalyticScene, ReprojectionObjective},
    optimizer::{GradientDescent, Termination},
    pose::Pose,
    pose_estimation::PoseEstimator,
    worker::RefinementWorker,
    Error, Result,
};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::AtomicBool;

/// Outcome of aligning the model with one detected face
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentReport {
    /// Pose derived directly from the detection
    pub seed_pose: Pose,
    /// Pose after refinement
    pub pose: Pose,
    /// Reprojection error of the seed pose
    pub initial_error: f64,
    /// Reprojection error of the refined pose
    pub final_error: f64,
    pub iterations: usize,
    pub termination: Termination,
}

impl AlignmentReport {
    #[must_use]
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }

    #[must_use]
    pub fn cancelled(&self) -> bool {
        self.termination == Termination::Cancelled
    }
}

/// Result for one face of a job, keyed by its position in the input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceAlignment {
    /// Position of the face in the job's `detections`
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<AlignmentReport>,
    /// Why the face could not be aligned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FaceAlignment {
    #[must_use]
    pub fn new(index: usize, result: Result<AlignmentReport>) -> Self {
        match result {
            Ok(report) => Self {
                index,
                report: Some(report),
                error: None,
            },
            Err(err) => Self {
                index,
                report: None,
                error: Some(err.to_string()),
            },
        }
    }

    #[must_use]
    pub fn is_aligned(&self) -> bool {
        self.report.is_some()
    }
}

/// A photograph's pixel size plus the faces detected in it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentJob {
    pub image_width: f64,
    pub image_height: f64,
    #[serde(default)]
    pub detections: Vec<FaceDetection>,
}

impl AlignmentJob {
    /// Load a job from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::IoError(e.to_string()))?;
        Self::from_yaml(&content)
    }

    /// Parse a job from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let job: Self = serde_yaml::from_str(content)
            .map_err(|e| Error::InvalidInput(format!("Failed to parse alignment job: {e}")))?;
        if !(job.image_width > 0.0 && job.image_height > 0.0) {
            return Err(Error::InvalidInput(format!(
                "Image size must be positive, got {}x{}",
                job.image_width, job.image_height
            )));
        }
        Ok(job)
    }
}

/// Aligns the head model with detected faces
#[derive(Debug, Clone, PartialEq)]
pub struct Aligner {
    model: HeadModel,
    camera: CameraProjection,
    estimator: PoseEstimator,
    optimizer: GradientDescent,
}

impl Aligner {
    #[must_use]
    pub fn new(model: HeadModel, camera: CameraProjection, estimator: PoseEstimator, optimizer: GradientDescent) -> Self {
        Self {
            model,
            camera,
            estimator,
            optimizer,
        }
    }

    /// Build an aligner for photographs of the given pixel size
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the configuration is invalid
    pub fn from_config(config: &Config, image_width: f64, image_height: f64) -> Result<Self> {
        config.validate()?;
        let to_config_error = |e: Error| Error::ConfigError(e.to_string());
        Ok(Self::new(
            config.model.model().map_err(to_config_error)?,
            config.camera.camera(image_width, image_height).map_err(to_config_error)?,
            config.estimator.estimator().map_err(to_config_error)?,
            config.optimizer.optimizer().map_err(to_config_error)?,
        ))
    }

    #[must_use]
    pub fn model(&self) -> &HeadModel {
        &self.model
    }

    #[must_use]
    pub fn camera(&self) -> &CameraProjection {
        &self.camera
    }

    #[must_use]
    pub fn estimator(&self) -> &PoseEstimator {
        &self.estimator
    }

    #[must_use]
    pub fn optimizer(&self) -> &GradientDescent {
        &self.optimizer
    }

    /// Seed and refine the model pose for one face
    ///
    /// # Errors
    ///
    /// Returns `Error::DegenerateDetection` for an unusable detection and
    /// `Error::DegenerateProjection` if the seed pose cannot be projected
    pub fn align(&self, detection: &FaceDetection, image_width: f64, image_height: f64) -> Result<AlignmentReport> {
        self.align_with_cancel(detection, image_width, image_height, None)
    }

    /// Like [`Aligner::align`], stopping early once `cancel` is raised
    ///
    /// # Errors
    ///
    /// See [`Aligner::align`]
    pub fn align_with_cancel(
        &self,
        detection: &FaceDetection,
        image_width: f64,
        image_height: f64,
        cancel: Option<&AtomicBool>,
    ) -> Result<AlignmentReport> {
        let seed_pose = self
            .estimator
            .estimate_initial_pose(detection, &self.model, image_width, image_height)?;
        let scene = AnalyticScene::new(self.model.clone(), &self.camera, image_width, image_height)?;
        let objective = ReprojectionObjective::new(scene, detection)?;
        let initial_error = objective.compute_error(&seed_pose)?;

        let refinement = self
            .optimizer
            .refine_with_cancel(&seed_pose, |pose| objective.evaluate(pose), cancel);
        debug!(
            "Refined pose in {} iterations ({:?}): error {:.6e} -> {:.6e}",
            refinement.iterations, refinement.termination, initial_error, refinement.error
        );

        Ok(AlignmentReport {
            seed_pose,
            pose: refinement.pose,
            initial_error,
            final_error: refinement.error,
            iterations: refinement.iterations,
            termination: refinement.termination,
        })
    }

    /// Align one face on a background worker
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the worker thread cannot be started
    pub fn spawn_alignment(
        &self,
        detection: FaceDetection,
        image_width: f64,
        image_height: f64,
    ) -> Result<RefinementWorker<Result<AlignmentReport>>> {
        let aligner = self.clone();
        RefinementWorker::spawn("head-pose-align", move |token| {
            aligner.align_with_cancel(&detection, image_width, image_height, Some(token.flag()))
        })
    }

    /// Align every face in parallel on the rayon pool, one model copy per face
    ///
    /// Results keep the order of `detections`; a face that cannot be aligned
    /// yields its error without affecting the others. The number of threads
    /// is bounded by the pool the call runs on, not by the number of faces.
    #[must_use]
    pub fn align_all(&self, detections: &[FaceDetection], image_width: f64, image_height: f64) -> Vec<Result<AlignmentReport>> {
        info!(
            "Aligning {} face(s) in a {}x{} image",
            detections.len(),
            image_width,
            image_height
        );
        let reports: Vec<_> = detections
            .par_iter()
            .enumerate()
            .map(|(i, detection)| {
                let result = self.align(detection, image_width, image_height);
                if let Err(err) = &result {
                    warn!("Skipping face {i}: {err}");
                }
                result
            })
            .collect();

        let aligned = reports.iter().filter(|r| r.is_ok()).count();
        info!("Aligned {aligned} of {} face(s)", detections.len());
        reports
    }

    /// Align every face of `job`, one entry per input face
    #[must_use]
    pub fn align_job(&self, job: &AlignmentJob) -> Vec<FaceAlignment> {
        self.align_all(&job.detections, job.image_width, job.image_height)
            .into_iter()
            .enumerate()
            .map(|(index, result)| FaceAlignment::new(index, result))
            .collect()
    }
}
