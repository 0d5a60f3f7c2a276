//! Config command handler.

use sightline_core::NarrationSettings;

use crate::error::CliError;

/// Print the effective settings as pretty JSON.
pub fn execute(settings: &NarrationSettings) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| CliError::Config(format!("failed to serialize settings: {e}")))?;
    println!("{json}");
    Ok(())
}
