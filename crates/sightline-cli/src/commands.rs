//! Subcommands and their arguments.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one narration session and print its events
    Narrate(NarrateArgs),

    /// Read voice commands from stdin, one per line (`!err N` simulates a recognizer error)
    Listen(ListenArgs),

    /// Print the effective narration settings as JSON
    Config,
}

/// Arguments for `narrate`.
#[derive(Debug, Args)]
pub struct NarrateArgs {
    /// Prompt to describe the scene with (defaults to the configured prompt)
    #[arg(short, long)]
    pub prompt: Option<String>,

    #[command(flatten)]
    pub demo: DemoArgs,
}

/// Arguments for `listen`.
#[derive(Debug, Args)]
pub struct ListenArgs {
    #[command(flatten)]
    pub demo: DemoArgs,
}

/// Knobs for the built-in demo collaborators.
#[derive(Debug, Clone, Args)]
pub struct DemoArgs {
    /// Image file to narrate (a built-in test frame is used otherwise)
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Run without any image source wired up
    #[arg(long, conflicts_with = "image")]
    pub no_camera: bool,

    /// Text file the demo model streams back instead of its canned description
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Delay between streamed words (ms)
    #[arg(long, default_value_t = 60)]
    pub token_delay_ms: u64,

    /// Speaking rate of the console voice
    #[arg(long, default_value_t = 180, value_parser = clap::value_parser!(u32).range(30..=600))]
    pub words_per_minute: u32,
}
