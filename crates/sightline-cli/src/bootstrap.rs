//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where collaborators are wired together
//! for the CLI adapter:
//! - Narration settings (defaults, then env/flags, then validation)
//! - Demo inference provider, speech sink and frame source
//! - The session controller and its event channel
//!
//! Command handlers receive the composed [`CliContext`].

use std::sync::Arc;
use std::time::Duration;

use sightline_core::ports::{ImageSource, InferenceProvider};
use sightline_core::{
    ChannelObserver, NarrationEvent, NarrationObserver, NarrationSettings, SettingsUpdate,
    validate_settings,
};
use sightline_narrator::{ControllerDeps, InferenceGuard, SessionController};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::commands::DemoArgs;
use crate::demo::{DEFAULT_SCRIPT, FrameSource, PacedSpeechSink, ScriptedProvider};
use crate::error::CliError;
use crate::parser::Cli;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Validated narration settings.
    pub settings: NarrationSettings,
    /// Demo collaborator knobs.
    pub demo: DemoArgs,
}

impl CliConfig {
    /// Build the config from parsed arguments.
    pub fn new(cli: &Cli, demo: DemoArgs) -> Result<Self, CliError> {
        Ok(Self {
            settings: settings_from_cli(cli)?,
            demo,
        })
    }
}

/// Resolve the effective settings: defaults overlaid with flags/env.
pub fn settings_from_cli(cli: &Cli) -> Result<NarrationSettings, CliError> {
    let mut settings = NarrationSettings::with_defaults();
    settings.merge(&SettingsUpdate {
        first_speech_delay_ms: cli.first_speech_delay_ms.map(Some),
        poll_interval_ms: cli.poll_interval_ms.map(Some),
        default_prompt: cli.default_prompt.clone().map(Some),
        custom_prompt_template: cli.custom_prompt_template.clone().map(Some),
        stream_capacity: None,
    });
    validate_settings(&settings)?;
    Ok(settings)
}

/// Fully composed context for CLI commands.
pub struct CliContext {
    pub settings: NarrationSettings,
    pub controller: SessionController,
    /// Observer feeding `events`; hand it to anything else that emits.
    pub observer: Arc<dyn NarrationObserver>,
    pub events: UnboundedReceiver<NarrationEvent>,
}

/// Compose the CLI context.
pub async fn bootstrap(config: CliConfig) -> Result<CliContext, CliError> {
    let CliConfig { settings, demo } = config;

    let script = match &demo.script {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CliError::Io(format!("{}: {e}", path.display())))?,
        None => DEFAULT_SCRIPT.to_owned(),
    };
    let provider: Arc<dyn InferenceProvider> = Arc::new(ScriptedProvider::new(
        script,
        Duration::from_millis(demo.token_delay_ms),
        settings.effective_stream_capacity(),
    ));

    let images: Option<Arc<dyn ImageSource>> = if demo.no_camera {
        None
    } else {
        let source = demo
            .image
            .clone()
            .map_or(FrameSource::TestPattern, FrameSource::File);
        Some(Arc::new(source))
    };

    let (observer, events) = ChannelObserver::new();
    let observer: Arc<dyn NarrationObserver> = Arc::new(observer);

    let deps = ControllerDeps {
        guard: InferenceGuard::new(provider),
        sink: Arc::new(PacedSpeechSink::new(demo.words_per_minute)),
        images,
        observer: Arc::clone(&observer),
    };
    let controller = SessionController::spawn(deps, &settings)?;

    Ok(CliContext {
        settings,
        controller,
        observer,
        events,
    })
}
