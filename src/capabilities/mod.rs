use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub mod fetcher;
pub mod summarizer;
pub mod transcriber;

pub use fetcher::YtDlpFetcher;
pub use summarizer::ChatSummarizer;
pub use transcriber::WhisperTranscriber;

/// Failure modes shared by every external capability.
///
/// The retry policy keys off the variant: `Transient` is worth retrying,
/// the other two are permanent for this input and go straight to fallback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    /// Rate limit, timeout, or other transient network/service error.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The resource is permanently gone (removed, private, region-blocked).
    #[error("resource unavailable: {0}")]
    Unavailable(String),

    /// The stage input itself is malformed (corrupt artifact, empty instruction).
    #[error("invalid input: {0}")]
    InputInvalid(String),
}

impl CapabilityError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CapabilityError::Transient(_))
    }
}

/// Downloads a source reference's audio track to a local file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the audio for `source_reference` into `destination`.
    async fn fetch(
        &self,
        source_reference: &str,
        destination: &Path,
    ) -> Result<PathBuf, CapabilityError>;
}

/// Converts an audio artifact to text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the audio file at `artifact_path`.
    async fn transcribe(&self, artifact_path: &Path) -> Result<String, CapabilityError>;
}

/// Produces an instruction-conditioned summary of a transcript.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `text` following the caller's `instruction`.
    async fn summarize(&self, text: &str, instruction: &str) -> Result<String, CapabilityError>;
}
