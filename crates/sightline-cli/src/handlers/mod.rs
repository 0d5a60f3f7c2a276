//! Command handlers.
//!
//! Each handler receives the composed context (or the settings it needs)
//! and returns `Result<(), CliError>`.

pub mod config;
pub mod listen;
pub mod narrate;
