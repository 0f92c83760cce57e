//! Tests for command-line argument parsing
//!
//! Note: These tests verify the argument parser configuration by creating
//! a test parser with the same structure as the main application.

use clap::{Arg, ArgAction, Command as ClapCommand};

/// Create a command with the same argument structure as the main binary
fn create_test_command() -> ClapCommand {
    ClapCommand::new("head-pose-align")
        .version("0.1.0")
        .about("Aligns a reference 3D head model with detected faces")
        .arg(
            Arg::new("config")
                .short('C')
                .long("config")
                .value_name("PATH")
                .help("Path to configuration file (YAML format)"),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("PATH")
                .conflicts_with("demo")
                .help("Alignment job: image size plus face detections"),
        )
        .arg(
            Arg::new("demo")
                .long("demo")
                .action(ArgAction::SetTrue)
                .help("Align a face synthesized from a known pose"),
        )
        .arg(
            Arg::new("max-iterations")
                .short('m')
                .long("max-iterations")
                .value_name("COUNT")
                .value_parser(clap::value_parser!(usize))
                .help("Override the refiner's iteration cap"),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .action(ArgAction::SetTrue)
                .help("Enable debug output"),
        )
        .arg(
            Arg::new("print-config")
                .long("print-config")
                .action(ArgAction::SetTrue)
                .help("Print an example configuration and exit"),
        )
}

#[test]
fn test_help_argument() {
    let cmd = create_test_command();
    let result = cmd.try_get_matches_from(vec!["head-pose-align", "--help"]);

    // Help should cause an error (but a specific help error)
    assert!(result.is_err());
    let err = result.unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
}

#[test]
fn test_no_arguments() {
    let cmd = create_test_command();
    let result = cmd.try_get_matches_from(vec!["head-pose-align"]);

    assert!(result.is_ok());
    let matches = result.unwrap();
    assert!(!matches.get_flag("demo"));
    assert!(!matches.get_flag("debug"));
    assert!(matches.get_one::<String>("input").is_none());
    assert!(matches.get_one::<usize>("max-iterations").is_none());
}

#[test]
fn test_input_argument() {
    let cmd = create_test_command();
    let result = cmd.try_get_matches_from(vec!["head-pose-align", "--input", "faces.yaml"]);

    assert!(result.is_ok());
    let matches = result.unwrap();
    assert_eq!(matches.get_one::<String>("input").map(|s| s.as_str()), Some("faces.yaml"));
}

#[test]
fn test_input_demo_conflict() {
    let cmd = create_test_command();
    let result = cmd.try_get_matches_from(vec!["head-pose-align", "--input", "faces.yaml", "--demo"]);

    // Should fail due to conflict
    assert!(result.is_err());
}

#[test]
fn test_max_iterations_argument() {
    let cmd = create_test_command();
    let matches = cmd
        .try_get_matches_from(vec!["head-pose-align", "--demo", "-m", "50"])
        .unwrap();
    assert_eq!(matches.get_one::<usize>("max-iterations"), Some(&50));
    assert!(matches.get_flag("demo"));
}

#[test]
fn test_max_iterations_rejects_non_numbers() {
    for value in ["many", "-5", "1.5"] {
        let cmd = create_test_command();
        let result = cmd.try_get_matches_from(vec!["head-pose-align", "--max-iterations", value]);
        assert!(result.is_err(), "Should reject iteration cap: {}", value);
    }
}

#[test]
fn test_config_and_flags() {
    let cmd = create_test_command();
    let matches = cmd
        .try_get_matches_from(vec!["head-pose-align", "-C", "align.yaml", "--debug", "--print-config"])
        .unwrap();
    assert_eq!(matches.get_one::<String>("config").map(|s| s.as_str()), Some("align.yaml"));
    assert!(matches.get_flag("debug"));
    assert!(matches.get_flag("print-config"));
}

#[test]
fn test_unknown_argument() {
    let cmd = create_test_command();
    let result = cmd.try_get_matches_from(vec!["head-pose-align", "--cam", "0"]);
    assert!(result.is_err());
}
