//! CLI-specific error types and mappings.
//!
//! Maps narration errors onto exit codes and user-facing messages.

use sightline_core::{NarrationError, SettingsError};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// The narration session failed or was rejected.
    #[error("{0}")]
    Narration(String),

    /// Argument parsing error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// IO error (file not found, permission denied, etc.).
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required collaborator is missing or not ready.
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow sysexits.h where a category fits:
    /// - 1: General error
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 69: Service unavailable
    /// - 74: I/O error
    /// - 78: Configuration error
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Narration(_) => 1,
            Self::Arguments(_) => 2,
            Self::Unavailable(_) => 69, // EX_UNAVAILABLE
            Self::Io(_) => 74,          // EX_IOERR
            Self::Config(_) => 78,      // EX_CONFIG
        }
    }
}

impl From<NarrationError> for CliError {
    fn from(err: NarrationError) -> Self {
        match err {
            NarrationError::Settings(e) => Self::Config(e.to_string()),
            NarrationError::HandleUnusable(_)
            | NarrationError::CaptureUnavailable
            | NarrationError::ControllerClosed => Self::Unavailable(err.to_string()),
            other => Self::Narration(other.to_string()),
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
