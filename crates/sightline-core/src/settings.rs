//! Narration settings and validation.
//!
//! Timing policy and prompt wording are configuration, not constants buried
//! in the dispatcher. All fields are optional so partial updates and
//! defaults compose; the `effective_*` accessors resolve the fallbacks.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default delay before the first utterance when generation is still running.
pub const DEFAULT_FIRST_SPEECH_DELAY_MS: u64 = 5000;

/// Default interval between checks for newly generated text.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Default capacity of the generation stream channel.
pub const DEFAULT_STREAM_CAPACITY: usize = 64;

/// Placeholder replaced with the user's request in custom prompts.
pub const REQUEST_PLACEHOLDER: &str = "{request}";

/// Prompt used for the plain `start` command.
pub const DEFAULT_PROMPT: &str = "Describe the scene in this image for someone who cannot see it. \
Mention the most important objects, people and any text first, and keep it brief.";

/// Template used to embed a spoken custom request into the description prompt.
pub const DEFAULT_CUSTOM_PROMPT_TEMPLATE: &str = "Look at this image and answer the user's request: \
\"{request}\". Be concise and describe only what is visible.";

const MAX_FIRST_SPEECH_DELAY_MS: u64 = 60_000;
const POLL_INTERVAL_RANGE_MS: std::ops::RangeInclusive<u64> = 10..=10_000;
const STREAM_CAPACITY_RANGE: std::ops::RangeInclusive<usize> = 1..=4096;

/// Narration settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NarrationSettings {
    /// Delay before speech starts while generation is still running (ms).
    pub first_speech_delay_ms: Option<u64>,

    /// Interval between checks for more text to speak (ms).
    pub poll_interval_ms: Option<u64>,

    /// Prompt sent for a plain `start`.
    pub default_prompt: Option<String>,

    /// Template for custom spoken requests; must contain `{request}`.
    pub custom_prompt_template: Option<String>,

    /// Capacity of the generation stream channel.
    pub stream_capacity: Option<usize>,
}

impl NarrationSettings {
    /// Create settings with every field populated by its default.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            first_speech_delay_ms: Some(DEFAULT_FIRST_SPEECH_DELAY_MS),
            poll_interval_ms: Some(DEFAULT_POLL_INTERVAL_MS),
            default_prompt: Some(DEFAULT_PROMPT.to_owned()),
            custom_prompt_template: Some(DEFAULT_CUSTOM_PROMPT_TEMPLATE.to_owned()),
            stream_capacity: Some(DEFAULT_STREAM_CAPACITY),
        }
    }

    /// Effective first-speech delay.
    #[must_use]
    pub fn effective_first_speech_delay(&self) -> Duration {
        Duration::from_millis(
            self.first_speech_delay_ms
                .unwrap_or(DEFAULT_FIRST_SPEECH_DELAY_MS),
        )
    }

    /// Effective poll interval.
    #[must_use]
    pub fn effective_poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS))
    }

    /// Effective default prompt.
    #[must_use]
    pub fn effective_default_prompt(&self) -> &str {
        self.default_prompt.as_deref().unwrap_or(DEFAULT_PROMPT)
    }

    /// Effective custom prompt template.
    #[must_use]
    pub fn effective_custom_prompt_template(&self) -> &str {
        self.custom_prompt_template
            .as_deref()
            .unwrap_or(DEFAULT_CUSTOM_PROMPT_TEMPLATE)
    }

    /// Effective generation stream capacity.
    #[must_use]
    pub fn effective_stream_capacity(&self) -> usize {
        self.stream_capacity.unwrap_or(DEFAULT_STREAM_CAPACITY)
    }

    /// Build the prompt for a custom spoken request.
    ///
    /// The request is embedded verbatim.
    #[must_use]
    pub fn custom_prompt(&self, request: &str) -> String {
        self.effective_custom_prompt_template()
            .replace(REQUEST_PLACEHOLDER, request)
    }

    /// Merge another settings into this one, only updating fields that are Some.
    pub fn merge(&mut self, other: &SettingsUpdate) {
        if let Some(delay) = other.first_speech_delay_ms {
            self.first_speech_delay_ms = delay;
        }
        if let Some(poll) = other.poll_interval_ms {
            self.poll_interval_ms = poll;
        }
        if let Some(ref prompt) = other.default_prompt {
            self.default_prompt.clone_from(prompt);
        }
        if let Some(ref template) = other.custom_prompt_template {
            self.custom_prompt_template.clone_from(template);
        }
        if let Some(capacity) = other.stream_capacity {
            self.stream_capacity = capacity;
        }
    }
}

/// Partial settings update.
///
/// Each field is `Option<Option<T>>`:
/// - `None` = don't change this field
/// - `Some(None)` = reset field to its default
/// - `Some(Some(value))` = set field to value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub first_speech_delay_ms: Option<Option<u64>>,
    pub poll_interval_ms: Option<Option<u64>>,
    pub default_prompt: Option<Option<String>>,
    pub custom_prompt_template: Option<Option<String>>,
    pub stream_capacity: Option<Option<usize>>,
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("First speech delay must be at most 60000 ms, got {0}")]
    InvalidFirstSpeechDelay(u64),

    #[error("Poll interval must be between 10 and 10000 ms, got {0}")]
    InvalidPollInterval(u64),

    #[error("Default prompt cannot be empty")]
    EmptyDefaultPrompt,

    #[error("Custom prompt template must contain {{request}}")]
    MissingRequestPlaceholder,

    #[error("Stream capacity must be between 1 and 4096, got {0}")]
    InvalidStreamCapacity(usize),
}

/// Validate settings values.
pub fn validate_settings(settings: &NarrationSettings) -> Result<(), SettingsError> {
    if let Some(delay) = settings.first_speech_delay_ms {
        if delay > MAX_FIRST_SPEECH_DELAY_MS {
            return Err(SettingsError::InvalidFirstSpeechDelay(delay));
        }
    }

    if let Some(poll) = settings.poll_interval_ms {
        if !POLL_INTERVAL_RANGE_MS.contains(&poll) {
            return Err(SettingsError::InvalidPollInterval(poll));
        }
    }

    if settings
        .default_prompt
        .as_ref()
        .is_some_and(|p| p.trim().is_empty())
    {
        return Err(SettingsError::EmptyDefaultPrompt);
    }

    if settings
        .custom_prompt_template
        .as_ref()
        .is_some_and(|t| !t.contains(REQUEST_PLACEHOLDER))
    {
        return Err(SettingsError::MissingRequestPlaceholder);
    }

    if let Some(capacity) = settings.stream_capacity {
        if !STREAM_CAPACITY_RANGE.contains(&capacity) {
            return Err(SettingsError::InvalidStreamCapacity(capacity));
        }
    }

    Ok(())
}
