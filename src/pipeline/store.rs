use std::path::{Path, PathBuf};

use super::executor::FallbackError;
use crate::utils::{sanitize_filename, source_id};

/// On-disk layout for stage artifacts.
///
/// Layout under the data root:
/// - `downloads/<id>.mp3` fetched audio
/// - `transcripts/<id>.txt`
/// - `summaries/summary_<id>_<instruction prefix>.txt`
///
/// Paths are deterministic per source/instruction so a re-run can skip stages
/// whose artifact already exists. Placeholder artifacts carry a `fallback_`
/// name prefix and never occupy a genuine path: the skip predicates only see
/// genuine artifacts, so a re-run retries the capability instead of serving
/// a stale placeholder as real output. Placeholder content embeds the failure
/// cause for audit.
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn ensure_layout(&self) -> std::io::Result<()> {
        for dir in ["downloads", "transcripts", "summaries"] {
            fs_err::create_dir_all(self.root.join(dir))?;
        }
        Ok(())
    }

    pub fn media_path(&self, source_reference: &str) -> PathBuf {
        self.root
            .join("downloads")
            .join(format!("{}.mp3", source_id(source_reference)))
    }

    pub fn transcript_path(&self, source_reference: &str) -> PathBuf {
        self.root
            .join("transcripts")
            .join(format!("{}.txt", source_id(source_reference)))
    }

    pub fn summary_path(&self, source_reference: &str, instruction: &str) -> PathBuf {
        let prefix: String = instruction.chars().take(50).collect();
        self.root.join("summaries").join(format!(
            "summary_{}_{}.txt",
            source_id(source_reference),
            sanitize_filename(&prefix)
        ))
    }

    pub fn placeholder_media_path(&self, source_reference: &str) -> PathBuf {
        self.root
            .join("downloads")
            .join(format!("fallback_{}.mp3", source_id(source_reference)))
    }

    pub fn placeholder_transcript_path(&self, source_reference: &str) -> PathBuf {
        self.root
            .join("transcripts")
            .join(format!("fallback_{}.txt", source_id(source_reference)))
    }

    pub fn placeholder_summary_path(&self, source_reference: &str, instruction: &str) -> PathBuf {
        let prefix: String = instruction.chars().take(50).collect();
        self.root.join("summaries").join(format!(
            "fallback_summary_{}_{}.txt",
            source_id(source_reference),
            sanitize_filename(&prefix)
        ))
    }

    /// "Already produced" predicate for the fetch stage.
    pub fn existing_media(&self, source_reference: &str) -> Option<PathBuf> {
        let path = self.media_path(source_reference);
        path.is_file().then_some(path)
    }

    /// "Already produced" predicate for the transcribe stage. Re-reads the
    /// transcript so a skipped stage still fully populates the state record.
    pub fn existing_transcript(&self, source_reference: &str) -> Option<(PathBuf, String)> {
        let path = self.transcript_path(source_reference);
        let text = fs_err::read_to_string(&path).ok()?;
        (!text.is_empty()).then_some((path, text))
    }

    /// "Already produced" predicate for the summarize stage.
    pub fn existing_summary(
        &self,
        source_reference: &str,
        instruction: &str,
    ) -> Option<(PathBuf, String)> {
        let path = self.summary_path(source_reference, instruction);
        let text = fs_err::read_to_string(&path).ok()?;
        (!text.is_empty()).then_some((path, text))
    }

    pub fn write_transcript(&self, source_reference: &str, text: &str) -> std::io::Result<PathBuf> {
        let path = self.transcript_path(source_reference);
        fs_err::write(&path, text)?;
        Ok(path)
    }

    pub fn write_summary(
        &self,
        source_reference: &str,
        instruction: &str,
        text: &str,
    ) -> std::io::Result<PathBuf> {
        let path = self.summary_path(source_reference, instruction);
        fs_err::write(&path, text)?;
        Ok(path)
    }

    /// Fallback for the fetch stage: a marker file standing in for the audio.
    /// Downstream transcription of it fails as invalid input and degrades in
    /// turn, which is the intended cascade.
    pub fn produce_placeholder_media(
        &self,
        source_reference: &str,
        cause: &str,
    ) -> Result<PathBuf, FallbackError> {
        let path = self.placeholder_media_path(source_reference);
        let note = format!(
            "[placeholder media]\nsource: {source_reference}\nfetch failed: {cause}\nproduced: {}\n",
            chrono::Utc::now().to_rfc3339()
        );
        fs_err::write(&path, note)
            .map_err(|e| FallbackError(format!("cannot write placeholder media: {e}")))?;
        tracing::info!("Wrote placeholder media marker: {}", path.display());
        Ok(path)
    }

    /// Fallback for the transcribe stage.
    pub fn produce_placeholder_transcript(
        &self,
        source_reference: &str,
        cause: &str,
    ) -> Result<(PathBuf, String), FallbackError> {
        let text = format!(
            "[placeholder transcript]\n\
             Source: {source_reference}\n\
             Transcription failed: {cause}\n\
             Produced: {}\n\
             This stand-in lets the pipeline continue; it contains no speech content.",
            chrono::Utc::now().to_rfc3339()
        );
        let path = self.placeholder_transcript_path(source_reference);
        fs_err::write(&path, &text)
            .map_err(|e| FallbackError(format!("cannot write placeholder transcript: {e}")))?;
        tracing::info!("Wrote placeholder transcript: {}", path.display());
        Ok((path, text))
    }

    /// Fallback for the summarize stage.
    pub fn produce_placeholder_summary(
        &self,
        source_reference: &str,
        instruction: &str,
        cause: &str,
    ) -> Result<(PathBuf, String), FallbackError> {
        let text = format!(
            "[placeholder summary]\n\
             Instruction: {instruction}\n\
             Summarization failed: {cause}\n\
             Produced: {}\n\
             This stand-in lets the pipeline terminate cleanly; it is not a real summary.",
            chrono::Utc::now().to_rfc3339()
        );
        let path = self.placeholder_summary_path(source_reference, instruction);
        fs_err::write(&path, &text)
            .map_err(|e| FallbackError(format!("cannot write placeholder summary: {e}")))?;
        tracing::info!("Wrote placeholder summary: {}", path.display());
        Ok((path, text))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SOURCE: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    #[test]
    fn test_paths_are_deterministic_per_source() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        assert_eq!(store.media_path(SOURCE), store.media_path(SOURCE));
        assert!(store
            .media_path(SOURCE)
            .to_string_lossy()
            .ends_with("downloads/dQw4w9WgXcQ.mp3"));
        assert!(store
            .transcript_path(SOURCE)
            .to_string_lossy()
            .ends_with("transcripts/dQw4w9WgXcQ.txt"));
    }

    #[test]
    fn test_summary_path_keyed_by_source_and_instruction() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let path = store.summary_path(SOURCE, "Summarize the key points / main ideas!");
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("summary_dQw4w9WgXcQ_"));
        assert!(!name.contains('/'));
        assert!(!name.contains('!'));

        let other = store.summary_path("https://youtu.be/other", "Summarize the key points");
        assert_ne!(path, other);
    }

    #[test]
    fn test_existing_transcript_reads_back_content() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.ensure_layout().unwrap();

        assert!(store.existing_transcript(SOURCE).is_none());

        store.write_transcript(SOURCE, "hello world").unwrap();
        let (path, text) = store.existing_transcript(SOURCE).unwrap();
        assert_eq!(text, "hello world");
        assert_eq!(path, store.transcript_path(SOURCE));
    }

    #[test]
    fn test_placeholder_transcript_is_clearly_marked() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.ensure_layout().unwrap();

        let (path, text) = store
            .produce_placeholder_transcript(SOURCE, "rate limit exceeded")
            .unwrap();
        assert!(text.starts_with("[placeholder transcript]"));
        assert!(text.contains("rate limit exceeded"));
        assert!(path.is_file());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("fallback_"));
        // the genuine path stays clear so a re-run retries transcription
        assert!(store.existing_transcript(SOURCE).is_none());
    }

    #[test]
    fn test_placeholder_summary_leaves_skip_predicate_unsatisfied() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.ensure_layout().unwrap();

        let instruction = "Summarize the key points";
        let (path, text) = store
            .produce_placeholder_summary(SOURCE, instruction, "model overloaded")
            .unwrap();
        assert!(text.starts_with("[placeholder summary]"));
        assert!(path.is_file());
        assert_ne!(path, store.summary_path(SOURCE, instruction));
        assert!(store.existing_summary(SOURCE, instruction).is_none());
    }

    #[test]
    fn test_placeholder_media_carries_fallback_prefix() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.ensure_layout().unwrap();

        let path = store
            .produce_placeholder_media(SOURCE, "video removed")
            .unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("fallback_"));
    }

    #[test]
    fn test_placeholder_write_failure_is_fallback_error() {
        let dir = tempdir().unwrap();
        // No ensure_layout: downloads/ does not exist, so the write must fail.
        let store = ArtifactStore::new(dir.path().join("missing-root"));

        let err = store
            .produce_placeholder_media(SOURCE, "cause")
            .unwrap_err();
        assert!(err.0.contains("cannot write placeholder media"));
    }
}
