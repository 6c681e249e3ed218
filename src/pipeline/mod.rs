use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::capabilities::{CapabilityError, Fetcher, Summarizer, Transcriber};
use crate::config::StageRetries;

pub mod executor;
pub mod state;
pub mod store;

pub use executor::{run_stage, FallbackError, StageFailure, StageOutcome};
pub use state::{PipelineState, Stage};
pub use store::ArtifactStore;

/// Sequences the three stages and threads the state record between them.
///
/// The transition table is fixed: fetch -> transcribe -> summarize -> done,
/// with any hard stage failure terminating the run. `run` always returns a
/// `PipelineState`, never an error, so batch callers can aggregate uniformly.
pub struct PipelineController {
    fetcher: Arc<dyn Fetcher>,
    transcriber: Arc<dyn Transcriber>,
    summarizer: Arc<dyn Summarizer>,
    store: ArtifactStore,
    retries: StageRetries,
    cancel: CancellationToken,
}

impl PipelineController {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        transcriber: Arc<dyn Transcriber>,
        summarizer: Arc<dyn Summarizer>,
        store: ArtifactStore,
        retries: StageRetries,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            transcriber,
            summarizer,
            store,
            retries,
            cancel,
        }
    }

    /// Runs one pipeline invocation end to end.
    ///
    /// A failed stage sets `error` and stops; artifacts produced by earlier
    /// stages stay in the returned state.
    pub async fn run(&self, source_reference: &str, instruction: &str) -> PipelineState {
        let mut state = PipelineState::new(source_reference, instruction);

        tracing::info!("Starting pipeline for: {}", source_reference);

        if let Err(e) = self.store.ensure_layout() {
            state.fail(Stage::Fetch, format!("cannot prepare artifact store: {e}"));
            return state;
        }

        // fetch
        match self.fetch_stage(&state).await {
            Ok(outcome) => {
                state.media_artifact_path = Some(outcome.value.to_string_lossy().into_owned());
                if outcome.degraded {
                    state.degraded.insert(Stage::Fetch);
                }
            }
            Err(failure) => {
                state.fail(failure.stage, &failure.cause);
                return state;
            }
        }
        state.current_stage = Stage::Transcribe;

        // transcribe
        let media_path = PathBuf::from(state.media_artifact_path.as_deref().unwrap_or_default());
        match self.transcribe_stage(&state, &media_path).await {
            Ok(outcome) => {
                let (path, text) = outcome.value;
                state.transcript_artifact_path = Some(path.to_string_lossy().into_owned());
                state.transcript_text = Some(text);
                if outcome.degraded {
                    state.degraded.insert(Stage::Transcribe);
                }
            }
            Err(failure) => {
                state.fail(failure.stage, &failure.cause);
                return state;
            }
        }
        state.current_stage = Stage::Summarize;

        // summarize
        let transcript = state.transcript_text.clone().unwrap_or_default();
        match self.summarize_stage(&state, &transcript).await {
            Ok(outcome) => {
                let (path, text) = outcome.value;
                state.summary_artifact_path = Some(path.to_string_lossy().into_owned());
                state.summary_text = Some(text);
                if outcome.degraded {
                    state.degraded.insert(Stage::Summarize);
                }
            }
            Err(failure) => {
                state.fail(failure.stage, &failure.cause);
                return state;
            }
        }
        state.current_stage = Stage::Done;

        tracing::info!(
            source = %state.source_reference,
            degraded = ?state.degraded,
            "Pipeline finished"
        );
        state
    }

    async fn fetch_stage(
        &self,
        state: &PipelineState,
    ) -> Result<StageOutcome<PathBuf>, StageFailure> {
        let source = state.source_reference.clone();
        let destination = self.store.media_path(&source);
        let fetcher = Arc::clone(&self.fetcher);

        run_stage(
            Stage::Fetch,
            &self.retries.fetch,
            &self.cancel,
            self.store.existing_media(&source),
            move || {
                let fetcher = Arc::clone(&fetcher);
                let source = source.clone();
                let destination = destination.clone();
                async move { fetcher.fetch(&source, &destination).await }
            },
            |error| {
                self.store
                    .produce_placeholder_media(&state.source_reference, &error.to_string())
            },
        )
        .await
    }

    async fn transcribe_stage(
        &self,
        state: &PipelineState,
        media_path: &std::path::Path,
    ) -> Result<StageOutcome<(PathBuf, String)>, StageFailure> {
        let source = state.source_reference.clone();
        let transcriber = Arc::clone(&self.transcriber);
        let media_path = media_path.to_path_buf();
        let store = &self.store;

        run_stage(
            Stage::Transcribe,
            &self.retries.transcribe,
            &self.cancel,
            store.existing_transcript(&source),
            move || {
                let transcriber = Arc::clone(&transcriber);
                let media_path = media_path.clone();
                let source = source.clone();
                async move {
                    let text = transcriber.transcribe(&media_path).await?;
                    let path = store.write_transcript(&source, &text).map_err(|e| {
                        CapabilityError::Transient(format!("cannot persist transcript: {e}"))
                    })?;
                    Ok((path, text))
                }
            },
            |error| {
                store.produce_placeholder_transcript(&state.source_reference, &error.to_string())
            },
        )
        .await
    }

    async fn summarize_stage(
        &self,
        state: &PipelineState,
        transcript: &str,
    ) -> Result<StageOutcome<(PathBuf, String)>, StageFailure> {
        let summarizer = Arc::clone(&self.summarizer);
        let transcript = transcript.to_string();
        let source = state.source_reference.clone();
        let instruction = state.instruction.clone();
        let store = &self.store;

        run_stage(
            Stage::Summarize,
            &self.retries.summarize,
            &self.cancel,
            store.existing_summary(&state.source_reference, &state.instruction),
            move || {
                let summarizer = Arc::clone(&summarizer);
                let transcript = transcript.clone();
                let source = source.clone();
                let instruction = instruction.clone();
                async move {
                    let text = summarizer.summarize(&transcript, &instruction).await?;
                    let path = store.write_summary(&source, &instruction, &text).map_err(|e| {
                        CapabilityError::Transient(format!("cannot persist summary: {e}"))
                    })?;
                    Ok((path, text))
                }
            },
            |error| {
                store.produce_placeholder_summary(
                    &state.source_reference,
                    &state.instruction,
                    &error.to_string(),
                )
            },
        )
        .await
    }
}
