//! Console stand-ins for the model, the voice and the camera.
//!
//! These let the CLI run full narration sessions without a GPU, an audio
//! device or a camera: the provider streams a canned (or file-supplied)
//! description word by word, the speech sink "speaks" at a configurable
//! words-per-minute rate, and images come from a file or a built-in frame.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use sightline_core::ports::{
    CaptureError, GenerationStream, ImageSource, InferenceError, InferenceProvider, SpeechError,
    SpeechSink,
};
use sightline_core::Image;
use tracing::debug;

/// Description streamed when no `--script` is given.
pub const DEFAULT_SCRIPT: &str = "You are facing a kitchen counter. A red kettle sits on the \
left burner of the stove, and a wooden cutting board with half a loaf of bread is in front of \
you. To the right there is a coffee mug with steam rising from it. The window above the sink \
shows daylight, and a set of keys is hanging on a hook beside it.";

// A 1x1 white PNG.
const TEST_FRAME: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
    0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x08, 0xD7, 0x63, 0xF8,
    0xFF, 0xFF, 0x3F, 0x00, 0x05, 0xFE, 0x02, 0xFE, 0xDC, 0xCC, 0x59, 0xE7, 0x00, 0x00, 0x00,
    0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

// ── Inference ──────────────────────────────────────────────────────

/// Streams a fixed text back one word at a time.
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    script: String,
    token_delay: Duration,
    capacity: usize,
}

impl ScriptedProvider {
    pub fn new(script: impl Into<String>, token_delay: Duration, capacity: usize) -> Self {
        Self {
            script: script.into(),
            token_delay,
            capacity,
        }
    }
}

#[async_trait]
impl InferenceProvider for ScriptedProvider {
    fn is_ready(&self) -> bool {
        !self.script.trim().is_empty()
    }

    async fn reset(&self) -> Result<(), InferenceError> {
        debug!("Demo model context reset");
        Ok(())
    }

    async fn open_stream(
        &self,
        prompt: &str,
        images: Vec<Image>,
    ) -> Result<GenerationStream, InferenceError> {
        if !self.is_ready() {
            return Err(InferenceError::NotLoaded);
        }
        debug!(prompt, images = images.len(), "Demo generation started");

        let (tx, stream) = GenerationStream::channel(self.capacity);
        let words: Vec<String> = self
            .script
            .split_inclusive(char::is_whitespace)
            .map(str::to_owned)
            .collect();
        let delay = self.token_delay;
        tokio::spawn(async move {
            for word in words {
                tokio::time::sleep(delay).await;
                if !tx.increment(word).await {
                    debug!("Demo generation abandoned by consumer");
                    return;
                }
            }
            tx.finish().await;
        });
        Ok(stream)
    }
}

// ── Speech ─────────────────────────────────────────────────────────

/// Simulates speech by waiting as long as reading the text aloud would take.
#[derive(Debug, Clone, Copy)]
pub struct PacedSpeechSink {
    words_per_minute: u32,
}

impl PacedSpeechSink {
    pub const fn new(words_per_minute: u32) -> Self {
        Self { words_per_minute }
    }

    /// How long `text` takes to say at this rate.
    pub fn duration_of(&self, text: &str) -> Duration {
        let words = u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX);
        let per_word_ms = 60_000 / u64::from(self.words_per_minute.max(1));
        Duration::from_millis(per_word_ms * u64::from(words))
    }
}

#[async_trait]
impl SpeechSink for PacedSpeechSink {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        tokio::time::sleep(self.duration_of(text)).await;
        Ok(())
    }

    fn cancel(&self) {
        debug!("Console speech interrupted");
    }
}

// ── Images ─────────────────────────────────────────────────────────

/// Where frames come from.
#[derive(Debug, Clone)]
pub enum FrameSource {
    /// Read a file on every capture.
    File(PathBuf),
    /// A built-in blank frame.
    TestPattern,
}

#[async_trait]
impl ImageSource for FrameSource {
    async fn capture(&self) -> Result<Image, CaptureError> {
        match self {
            Self::File(path) => {
                let data = tokio::fs::read(path).await.map_err(|e| {
                    CaptureError::Unavailable(format!("{}: {e}", path.display()))
                })?;
                if data.is_empty() {
                    return Err(CaptureError::Failed(format!(
                        "{} is empty",
                        path.display()
                    )));
                }
                Ok(Image::new(data, mime_type_for(path)))
            }
            Self::TestPattern => Ok(Image::new(TEST_FRAME.to_vec(), "image/png")),
        }
    }
}

fn mime_type_for(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sightline_core::GenerationChunk;

    #[test]
    fn speech_duration_scales_with_words() {
        let sink = PacedSpeechSink::new(120);
        assert_eq!(sink.duration_of("one two three"), Duration::from_millis(1500));
        assert_eq!(sink.duration_of("   "), Duration::ZERO);
    }

    #[test]
    fn mime_type_from_extension() {
        assert_eq!(mime_type_for(std::path::Path::new("a/b.JPG")), "image/jpeg");
        assert_eq!(mime_type_for(std::path::Path::new("frame.png")), "image/png");
        assert_eq!(
            mime_type_for(std::path::Path::new("noext")),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn scripted_provider_streams_whole_script() {
        let provider = ScriptedProvider::new("a red kettle", Duration::ZERO, 4);
        let mut stream = provider.open_stream("describe", Vec::new()).await.unwrap();

        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                GenerationChunk::Increment(inc) => text.push_str(&inc),
                GenerationChunk::Done(outcome) => {
                    assert_eq!(outcome, sightline_core::GenerationOutcome::Finished);
                }
            }
        }
        assert_eq!(text, "a red kettle");
    }

    #[tokio::test]
    async fn missing_image_file_is_unavailable() {
        let source = FrameSource::File(PathBuf::from("/definitely/not/here.png"));
        assert!(matches!(
            source.capture().await,
            Err(CaptureError::Unavailable(_))
        ));
    }
}
