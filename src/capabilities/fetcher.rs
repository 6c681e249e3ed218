use async_trait::async_trait;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{CapabilityError, Fetcher};

/// Audio fetcher backed by yt-dlp.
///
/// yt-dlp handles YouTube and a long tail of other platforms, so a single
/// fetcher covers every supported source reference.
pub struct YtDlpFetcher {
    yt_dlp_path: String,
}

/// stderr markers that mean the video is permanently out of reach.
const UNAVAILABLE_MARKERS: &[&str] = &[
    "Video unavailable",
    "Private video",
    "This video is not available",
    "account associated with this video has been terminated",
    "HTTP Error 404",
    "HTTP Error 410",
];

impl YtDlpFetcher {
    pub fn new() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
        }
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> bool {
        Command::new(&self.yt_dlp_path)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn classify_failure(stderr: &str) -> CapabilityError {
        if UNAVAILABLE_MARKERS
            .iter()
            .any(|marker| stderr.contains(marker))
        {
            CapabilityError::Unavailable(first_error_line(stderr))
        } else {
            CapabilityError::Transient(first_error_line(stderr))
        }
    }

    /// Download a direct media URL with progress tracking, bypassing yt-dlp.
    async fn download_direct(
        &self,
        url: &str,
        destination: &Path,
    ) -> Result<PathBuf, CapabilityError> {
        let response = reqwest::get(url)
            .await
            .map_err(|e| CapabilityError::Transient(format!("download request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(CapabilityError::Transient(format!(
                    "download returned HTTP {status}"
                )));
            }
            return Err(CapabilityError::Unavailable(format!(
                "media not reachable: HTTP {status}"
            )));
        }

        let progress = ProgressBar::new(response.content_length().unwrap_or(0));
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
                .expect("valid progress template"),
        );
        progress.set_message("Downloading audio...");

        let mut file = fs_err::File::create(destination)
            .map_err(|e| CapabilityError::Transient(format!("cannot create media file: {e}")))?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| CapabilityError::Transient(format!("download interrupted: {e}")))?;
            file.write_all(&chunk)
                .map_err(|e| CapabilityError::Transient(format!("cannot write media file: {e}")))?;
            downloaded += chunk.len() as u64;
            progress.set_position(downloaded);
        }

        progress.finish_with_message("Download complete");
        Ok(destination.to_path_buf())
    }
}

/// URLs whose path already points at a media file skip yt-dlp entirely.
fn is_direct_media_url(url: &str) -> bool {
    const MEDIA_EXTENSIONS: &[&str] = &["mp3", "m4a", "wav", "flac", "ogg", "mp4", "webm"];

    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('.')
        .next()
        .map(|ext| MEDIA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn first_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .find(|line| line.starts_with("ERROR"))
        .or_else(|| stderr.lines().last())
        .unwrap_or("yt-dlp failed without output")
        .to_string()
}

#[async_trait]
impl Fetcher for YtDlpFetcher {
    async fn fetch(
        &self,
        source_reference: &str,
        destination: &Path,
    ) -> Result<PathBuf, CapabilityError> {
        tracing::debug!("Fetching audio for: {}", source_reference);

        if is_direct_media_url(source_reference) {
            return self.download_direct(source_reference, destination).await;
        }

        let output = Command::new(&self.yt_dlp_path)
            .args([
                // Output to specific file
                "--output",
                &destination.to_string_lossy(),
                // Extract audio in the most efficient format for transcription
                "--extract-audio",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "9", // Lowest quality for speed (still good for transcription)
                // Prioritize smaller/faster formats
                "--format",
                "worstaudio[acodec^=mp4a]/worstaudio[ext=m4a]/worstaudio[ext=mp3]/worstaudio",
                "--no-playlist",
                "--newline",
                source_reference,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CapabilityError::Transient(format!("failed to run yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::classify_failure(&stderr));
        }

        if !destination.exists() {
            return Err(CapabilityError::Transient(format!(
                "yt-dlp reported success but {} was not written",
                destination.display()
            )));
        }

        Ok(destination.to_path_buf())
    }
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_removed_video_as_unavailable() {
        let err = YtDlpFetcher::classify_failure(
            "ERROR: [youtube] abc123: Video unavailable. This video has been removed",
        );
        assert!(matches!(err, CapabilityError::Unavailable(_)));
    }

    #[test]
    fn test_classify_private_video_as_unavailable() {
        let err = YtDlpFetcher::classify_failure("ERROR: [youtube] abc123: Private video");
        assert!(matches!(err, CapabilityError::Unavailable(_)));
    }

    #[test]
    fn test_classify_network_error_as_transient() {
        let err = YtDlpFetcher::classify_failure(
            "ERROR: unable to download video data: HTTP Error 503: Service Unavailable",
        );
        assert!(matches!(err, CapabilityError::Transient(_)));
    }

    #[test]
    fn test_direct_media_url_detection() {
        assert!(is_direct_media_url("https://example.com/audio/episode.mp3"));
        assert!(is_direct_media_url("https://example.com/clip.M4A?token=abc"));
        assert!(is_direct_media_url("https://example.com/video.webm#t=10"));
        assert!(!is_direct_media_url("https://www.youtube.com/watch?v=abc123"));
        assert!(!is_direct_media_url("https://example.com/page.html"));
    }

    #[test]
    fn test_first_error_line_prefers_error_prefix() {
        let stderr = "WARNING: something minor\nERROR: the real cause\ntrailing";
        assert_eq!(first_error_line(stderr), "ERROR: the real cause");
    }
}
