//! Command-line front end for sightline.
//!
//! Wires the narration core to console stand-ins for the model, the voice
//! and the camera so sessions and voice commands can be exercised from a
//! terminal.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by the binary target only
use anyhow as _;
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod demo;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod presentation;

// Re-export primary types for convenient access
pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::{Commands, DemoArgs, ListenArgs, NarrateArgs};
pub use error::CliError;
pub use parser::Cli;
