//! Argument parsing, matching spec.md §6.3's CLI surface.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about = "An interactive AI coding agent", long_about = None)]
pub struct Args {
    /// Path to the project directory this session operates in.
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    /// Resume the most recently modified session for this project.
    #[arg(short = 'c', long = "continue")]
    pub continue_session: bool,

    /// Resume a specific session id.
    #[arg(short = 's', long)]
    pub session: Option<String>,

    /// Model name to request from the provider.
    #[arg(short = 'm', long, default_value = "claude-opus-4-20250514")]
    pub model: String,

    /// Enable verbose logging (repeat for more).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
