//! Main CLI parser and top-level argument handling.
//!
//! Global options carry the narration timing settings so every subcommand
//! sees the same configuration. Each can also be set through a `SIGHTLINE_*`
//! environment variable (or a `.env` file).

use clap::Parser;

use crate::commands::Commands;

/// Speak scene descriptions while they are still being generated.
#[derive(Debug, Parser)]
#[command(name = "sightline")]
#[command(about = "Narrate scene descriptions as they stream from the model")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Print events as JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Delay before the first utterance while text is still streaming (ms)
    #[arg(long, global = true, env = "SIGHTLINE_FIRST_SPEECH_DELAY_MS")]
    pub first_speech_delay_ms: Option<u64>,

    /// Interval between checks for newly generated text (ms)
    #[arg(long, global = true, env = "SIGHTLINE_POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Prompt used for the plain `start` command
    #[arg(long, global = true, env = "SIGHTLINE_DEFAULT_PROMPT")]
    pub default_prompt: Option<String>,

    /// Template for spoken custom requests; must contain `{request}`
    #[arg(long, global = true, env = "SIGHTLINE_CUSTOM_PROMPT_TEMPLATE")]
    pub custom_prompt_template: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
