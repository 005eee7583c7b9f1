// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use clap::Parser;

use mocap_skeletons::cli::args::{Cli, Commands};
use mocap_skeletons::cli::play::run_playback;

fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Play(args) => run_playback(args),
    }
}
