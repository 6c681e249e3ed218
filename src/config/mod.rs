use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::retry::RetrySettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Summarization/transcription API settings
    pub api: ApiConfig,

    /// Per-stage retry settings
    #[serde(default)]
    pub retries: StageRetries,

    /// Batch throttling settings
    #[serde(default)]
    pub batch: BatchSettings,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of an OpenAI-compatible API
    pub api_base: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Speech-to-text model
    pub transcription_model: String,

    /// Summarization model
    pub summary_model: String,
}

/// Backoff settings per stage. Transcription gets the longest base delay
/// since speech-to-text rate limits recover slowly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRetries {
    pub fetch: RetrySettings,
    pub transcribe: RetrySettings,
    pub summarize: RetrySettings,
}

impl Default for StageRetries {
    fn default() -> Self {
        Self {
            fetch: RetrySettings {
                max_attempts: 3,
                base_delay_ms: 1000,
                max_delay_ms: 30_000,
            },
            transcribe: RetrySettings {
                max_attempts: 3,
                base_delay_ms: 5000,
                max_delay_ms: 60_000,
            },
            summarize: RetrySettings {
                max_attempts: 3,
                base_delay_ms: 2000,
                max_delay_ms: 60_000,
            },
        }
    }
}

/// Spacing between batch invocations, in seconds. A randomized wait in
/// `[wait_min_secs, wait_max_secs]` is inserted before every invocation
/// after the first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSettings {
    pub wait_min_secs: u64,
    pub wait_max_secs: u64,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            wait_min_secs: 3,
            wait_max_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root directory for downloads/, transcripts/, and summaries/
    /// (current directory if not set)
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                api_base: "https://api.openai.com/v1".to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
                transcription_model: "whisper-1".to_string(),
                summary_model: "gpt-4-turbo".to_string(),
            },
            retries: StageRetries::default(),
            batch: BatchSettings::default(),
            app: AppConfig { data_dir: None },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("tube-digest").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api.api_base.is_empty() {
            anyhow::bail!("API base URL must be configured");
        }

        for (stage, settings) in [
            ("fetch", &self.retries.fetch),
            ("transcribe", &self.retries.transcribe),
            ("summarize", &self.retries.summarize),
        ] {
            if settings.max_attempts == 0 {
                anyhow::bail!("{stage} retry settings need at least one attempt");
            }
            if settings.base_delay_ms > settings.max_delay_ms {
                anyhow::bail!("{stage} base delay exceeds its max delay");
            }
        }

        if self.batch.wait_min_secs > self.batch.wait_max_secs {
            anyhow::bail!("batch wait_min_secs exceeds wait_max_secs");
        }

        Ok(())
    }

    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api.api_key_env).with_context(|| {
            format!(
                "API key environment variable {} is not set",
                self.api.api_key_env
            )
        })
    }

    /// Root directory for stage artifacts
    pub fn data_dir(&self) -> PathBuf {
        self.app
            .data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  API Base: {}", self.api.api_base);
        println!("  API Key Env: {}", self.api.api_key_env);
        println!("  Transcription Model: {}", self.api.transcription_model);
        println!("  Summary Model: {}", self.api.summary_model);
        println!("  Data Dir: {}", self.data_dir().display());
        println!(
            "  Batch Wait: {}-{}s",
            self.batch.wait_min_secs, self.batch.wait_max_secs
        );
        for (stage, settings) in [
            ("fetch", &self.retries.fetch),
            ("transcribe", &self.retries.transcribe),
            ("summarize", &self.retries.summarize),
        ] {
            println!(
                "  Retry ({stage}): {} attempts, {}ms base, {}ms max",
                settings.max_attempts, settings.base_delay_ms, settings.max_delay_ms
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = Config::default();
        config.retries.summarize.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_batch_window_rejected() {
        let mut config = Config::default();
        config.batch.wait_min_secs = 20;
        config.batch.wait_max_secs = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_round_trips_through_yaml() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.api.transcription_model, "whisper-1");
        assert_eq!(back.retries.transcribe.base_delay_ms, 5000);
    }

    #[test]
    fn test_missing_retry_section_uses_defaults() {
        let yaml = r#"
api:
  api_base: "https://api.openai.com/v1"
  api_key_env: "OPENAI_API_KEY"
  transcription_model: "whisper-1"
  summary_model: "gpt-4-turbo"
app:
  data_dir: null
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.retries.fetch.max_attempts, 3);
        assert_eq!(config.batch.wait_min_secs, 3);
    }
}
