use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use super::{CapabilityError, Transcriber};

/// Speech-to-text client for an OpenAI-compatible `/audio/transcriptions` endpoint.
pub struct WhisperTranscriber {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

/// Transcription response body (only the text matters here).
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl WhisperTranscriber {
    pub fn new(api_base: String, api_key: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .expect("default reqwest client");

        Self {
            client,
            api_base,
            api_key,
            model,
        }
    }

    fn classify_status(status: reqwest::StatusCode, body: &str) -> CapabilityError {
        if status.as_u16() == 429 || status.is_server_error() {
            CapabilityError::Transient(format!("transcription API returned {status}: {body}"))
        } else {
            CapabilityError::InputInvalid(format!("transcription API rejected input ({status}): {body}"))
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, artifact_path: &Path) -> Result<String, CapabilityError> {
        let audio = fs_err::read(artifact_path).map_err(|e| {
            CapabilityError::InputInvalid(format!(
                "cannot read audio artifact {}: {e}",
                artifact_path.display()
            ))
        })?;

        if audio.is_empty() {
            return Err(CapabilityError::InputInvalid(format!(
                "audio artifact {} is empty",
                artifact_path.display()
            )));
        }

        let file_name = artifact_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("audio_{}.mp3", Uuid::new_v4()));

        tracing::info!(
            "Transcribing {} ({} bytes) with model {}",
            artifact_path.display(),
            audio.len(),
            self.model
        );

        let part = multipart::Part::bytes(audio)
            .file_name(file_name)
            .mime_str("audio/mpeg")
            .map_err(|e| CapabilityError::InputInvalid(format!("invalid audio mime type: {e}")))?;

        let form = multipart::Form::new()
            .text("model", self.model.clone())
            .part("file", part);

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.api_base))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CapabilityError::Transient(format!("transcription request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::Transient(format!("malformed transcription response: {e}")))?;

        Ok(parsed.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_rate_limit_is_transient() {
        let err = WhisperTranscriber::classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, CapabilityError::Transient(_)));
    }

    #[test]
    fn test_server_error_is_transient() {
        let err = WhisperTranscriber::classify_status(StatusCode::BAD_GATEWAY, "");
        assert!(matches!(err, CapabilityError::Transient(_)));
    }

    #[test]
    fn test_bad_request_is_input_invalid() {
        let err = WhisperTranscriber::classify_status(StatusCode::BAD_REQUEST, "unsupported format");
        assert!(matches!(err, CapabilityError::InputInvalid(_)));
    }

    #[tokio::test]
    async fn test_missing_artifact_is_input_invalid() {
        let transcriber = WhisperTranscriber::new(
            "http://localhost:0".into(),
            "test-key".into(),
            "whisper-1".into(),
        );

        let err = transcriber
            .transcribe(Path::new("/nonexistent/audio.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::InputInvalid(_)));
    }
}
