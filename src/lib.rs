//! Head pose alignment library for fitting a reference 3D head model to faces
//! detected in a photograph.
//!
//! This library provides:
//! - Coordinate conversions between landmark, image, scene and clipping space
//! - A seed pose derived from a face detection's box and orientation
//! - Derivative-free refinement of the pose against landmark reprojection error
//!
//! The alignment pipeline consists of:
//! 1. Seeding a pose from the detection (box center, detector angles, box width)
//! 2. Projecting six model anchors through the camera onto the photograph
//! 3. Minimizing the squared distance to the matching landmark statistics
//!
//! # Examples
//!
//! ## Aligning a single face
//!
//! ```no_run
//! use head_pose_alignment::{alignment::Aligner, alignment::AlignmentJob, config::Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let job = AlignmentJob::from_file("faces.yaml")?;
//! let aligner = Aligner::from_config(&Config::default(), job.image_width, job.image_height)?;
//!
//! for detection in &job.detections {
//!     let report = aligner.align(detection, job.image_width, job.image_height)?;
//!     println!(
//!         "scale {:.3}, error {:.2e} -> {:.2e}",
//!         report.pose.scale, report.initial_error, report.final_error
//!     );
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Refining in the background
//!
//! ```no_run
//! use head_pose_alignment::{alignment::Aligner, config::Config, face_detection::FaceDetection};
//!
//! # fn run(detection: FaceDetection) -> Result<(), Box<dyn std::error::Error>> {
//! let aligner = Aligner::from_config(&Config::default(), 1080.0, 1920.0)?;
//! let worker = aligner.spawn_alignment(detection, 1080.0, 1920.0)?;
//!
//! // The user moved on; keep whatever the refiner has so far
//! worker.cancel();
//! let report = worker.join()??;
//! println!("{:?} after {} iterations", report.termination, report.iterations);
//! # Ok(())
//! # }
//! ```

/// Design constants of the alignment engine
pub mod constants;

/// Error types and result handling
pub mod error;

/// Face detection records and landmark statistics
pub mod face_detection;

/// Coordinate conversions between landmark, image, scene and clipping space
pub mod transform;

/// Camera view/projection transforms and image-plane projection
pub mod camera;

/// Reference head model anchors
pub mod head_model;

/// Six-parameter model placement
pub mod pose;

/// Seed pose estimation from a face detection
pub mod pose_estimation;

/// Landmark reprojection error
pub mod objective;

/// Finite-difference gradient descent refiner
pub mod optimizer;

/// Background refinement with cooperative cancellation
pub mod worker;

/// End-to-end alignment pipeline
pub mod alignment;

/// Detections synthesized from a known pose
pub mod synthetic;

/// Configuration management
pub mod config;

pub use error::{Error, Result};
