use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Pipeline position. Stage order is fixed: fetch, transcribe, summarize.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Transcribe,
    Summarize,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Transcribe => "transcribe",
            Stage::Summarize => "summarize",
            Stage::Done => "done",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The record threaded through the whole pipeline.
///
/// Mutated only by replacement between stages. Once `error` is set no stage
/// touches it again; a terminal state is either `error.is_some()` or
/// `current_stage == Done` with every artifact populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    /// Input reference (a video URL). Immutable once set.
    pub source_reference: String,

    /// The caller's summarization directive. Immutable once set.
    pub instruction: String,

    /// Fetched audio artifact; empty until the fetch stage completes.
    pub media_artifact_path: Option<String>,

    pub transcript_text: Option<String>,
    pub transcript_artifact_path: Option<String>,

    pub summary_text: Option<String>,
    pub summary_artifact_path: Option<String>,

    pub current_stage: Stage,

    /// Set exactly when a stage fails unrecoverably; freezes the record.
    pub error: Option<String>,

    /// Stages that completed via fallback rather than the real capability.
    pub degraded: BTreeSet<Stage>,
}

impl PipelineState {
    pub fn new(source_reference: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            source_reference: source_reference.into(),
            instruction: instruction.into(),
            media_artifact_path: None,
            transcript_text: None,
            transcript_artifact_path: None,
            summary_text: None,
            summary_artifact_path: None,
            current_stage: Stage::Fetch,
            error: None,
            degraded: BTreeSet::new(),
        }
    }

    /// Records a terminal stage failure as "<stage> stage: <cause>".
    pub fn fail(&mut self, stage: Stage, cause: impl std::fmt::Display) {
        self.error = Some(format!("{stage} stage: {cause}"));
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.current_stage == Stage::Done
    }

    /// Checks the completion invariant: a `Done` state must carry all three
    /// artifacts (genuine or degraded stand-ins) and no error.
    pub fn validate_complete(&self) -> Result<(), String> {
        if let Some(error) = &self.error {
            return Err(format!("state carries an error: {error}"));
        }
        if self.current_stage != Stage::Done {
            return Err(format!("pipeline stopped at stage {}", self.current_stage));
        }
        for (field, value) in [
            ("media_artifact_path", &self.media_artifact_path),
            ("transcript_text", &self.transcript_text),
            ("summary_text", &self.summary_text),
        ] {
            match value {
                Some(v) if !v.is_empty() => {}
                _ => return Err(format!("{field} is empty in a done state")),
            }
        }
        Ok(())
    }
}
