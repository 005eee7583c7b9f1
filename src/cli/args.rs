// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use clap::{Args, Parser, Subcommand};

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Play Options:
    <FOLDER>                 Recording folder containing <frame>.txt files
    --keypoints-only         Skip pose/rotation reconstruction
    --no-hallucinate         Disable pelvis-marker hallucination
    --designations           Print subject designations per frame
    --calibration-dir <DIR>  Report subject-from-source calibration availability
    --resave <DIR>           Re-save each frame to DIR in the current layout
    --limit <N>              Stop after N frames
    --verbose                Show verbose output

Examples:
    mocap-skeletons play recordings/session-01
    mocap-skeletons play recordings/session-01 --designations
    mocap-skeletons play recordings/legacy --resave recordings/converted
    mocap-skeletons play recordings/session-01 --keypoints-only --limit 100"#)]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a recorded session and reconstruct skeletons frame by frame
    Play(PlayArgs),
}

/// Arguments for the play command.
#[derive(Args, Debug)]
pub struct PlayArgs {
    /// Recording folder containing <frame>.txt files
    pub folder: String,

    /// Skip pose/rotation reconstruction (keypoint-only mode)
    #[arg(long, default_value_t = false)]
    pub keypoints_only: bool,

    /// Disable pelvis-marker hallucination
    #[arg(long, default_value_t = false)]
    pub no_hallucinate: bool,

    /// Print subject designations per frame
    #[arg(long, default_value_t = false)]
    pub designations: bool,

    /// Directory of subject-from-source calibration files to report on
    #[arg(long)]
    pub calibration_dir: Option<String>,

    /// Re-save each frame to this folder in the current on-disk layout
    #[arg(long)]
    pub resave: Option<String>,

    /// Stop after this many frames
    #[arg(long)]
    pub limit: Option<usize>,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}
