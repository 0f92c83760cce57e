//! Command-line front end: aligns the head model with detected faces and
//! prints one YAML entry per input face: its index plus either the
//! alignment report or the reason it failed.

use anyhow::{Context, Result};
use clap::Parser;
use head_pose_alignment::{
    alignment::{Aligner, AlignmentJob},
    config::{Config, EXAMPLE_CONFIG},
    objective::AnalyticScene,
    pose::Pose,
    synthetic::detection_from_pose,
};
use log::{info, warn};

/// Image size used by `--demo`
const DEMO_IMAGE_SIZE: (f64, f64) = (1080.0, 1920.0);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<String>,

    /// Alignment job: image size plus face detections (YAML format)
    #[arg(short, long, conflicts_with = "demo")]
    input: Option<String>,

    /// Align a face synthesized from a known pose
    #[arg(long)]
    demo: bool,

    /// Override the refiner's iteration cap
    #[arg(short, long)]
    max_iterations: Option<usize>,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Print an example configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger
    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.print_config {
        print!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {path}");
            Config::from_file(path).with_context(|| format!("Failed to load config file {path}"))?
        }
        None => Config::default(),
    };
    if let Some(max_iterations) = args.max_iterations {
        config.optimizer.max_iterations = max_iterations;
    }
    config.validate().context("Invalid configuration")?;

    let job = match (&args.input, args.demo) {
        (Some(path), _) => {
            info!("Loading alignment job from: {path}");
            AlignmentJob::from_file(path).with_context(|| format!("Failed to load alignment job {path}"))?
        }
        (None, true) => demo_job(&config)?,
        (None, false) => anyhow::bail!("Nothing to align: pass --input <job.yaml> or --demo"),
    };
    if job.detections.is_empty() {
        warn!("Alignment job contains no detections");
    }

    let aligner = Aligner::from_config(&config, job.image_width, job.image_height)?;
    let faces = aligner.align_job(&job);
    print!("{}", serde_yaml::to_string(&faces)?);

    let failed = faces.iter().filter(|face| !face.is_aligned()).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} face(s) could not be aligned", faces.len());
    }
    Ok(())
}

/// One face rendered from a fixed ground-truth pose
fn demo_job(config: &Config) -> Result<AlignmentJob> {
    let (image_width, image_height) = DEMO_IMAGE_SIZE;
    let truth = Pose::new(0.12, 0.25, 0.06, -0.12, 0.05, 0.30);
    info!("Demo face rendered at {truth:?}");

    let camera = config.camera.camera(image_width, image_height)?;
    let scene = AnalyticScene::new(config.model.model()?, &camera, image_width, image_height)?;
    Ok(AlignmentJob {
        image_width,
        image_height,
        detections: vec![detection_from_pose(&scene, &truth)?],
    })
}
