use anyhow::Result;
use console::style;
use std::path::Path;

use crate::pipeline::PipelineState;
use crate::utils::truncate_error;

/// Error column width in the batch report.
const ERROR_COLUMN_CHARS: usize = 100;

/// Render a single pipeline result for the console or a text file.
pub fn format_single(state: &PipelineState) -> String {
    let mut out = String::new();
    let bar = "=".repeat(50);

    if let Some(error) = &state.error {
        out.push_str(&format!("{bar}\nFAILED: {}\n{bar}\n", state.source_reference));
        out.push_str(&format!("{error}\n"));
        if let Some(media) = &state.media_artifact_path {
            out.push_str(&format!("Partial media artifact: {media}\n"));
        }
        if let Some(transcript) = &state.transcript_artifact_path {
            out.push_str(&format!("Partial transcript: {transcript}\n"));
        }
        return out;
    }

    out.push_str(&format!("{bar}\nSUMMARY\n{bar}\n"));
    out.push_str(state.summary_text.as_deref().unwrap_or(""));
    out.push('\n');
    out.push_str(&bar);
    out.push('\n');

    if !state.degraded.is_empty() {
        let stages: Vec<&str> = state.degraded.iter().map(|s| s.as_str()).collect();
        out.push_str(&format!(
            "Note: placeholder data was used for: {}\n",
            stages.join(", ")
        ));
    }

    out
}

/// Print a single result, either human-readable or as the full state record.
pub fn print_single(state: &PipelineState, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(state)?);
    } else {
        print!("{}", format_single(state));
    }
    Ok(())
}

/// Save a single result to a file.
pub fn save_single(state: &PipelineState, path: &Path, as_json: bool) -> Result<()> {
    let content = if as_json {
        serde_json::to_string_pretty(state)?
    } else {
        format_single(state)
    };
    fs_err::write(path, content)?;
    Ok(())
}

/// Write the tabular batch report as CSV.
pub fn write_csv_report(states: &[PipelineState], path: &Path) -> Result<()> {
    let mut content =
        String::from("URL,Success,Media File,Transcript File,Summary Length,Degraded,Error\n");

    for state in states {
        let degraded: Vec<&str> = state.degraded.iter().map(|s| s.as_str()).collect();
        let row = [
            state.source_reference.clone(),
            (!state.is_failed()).to_string(),
            file_name(state.media_artifact_path.as_deref()),
            file_name(state.transcript_artifact_path.as_deref()),
            state
                .summary_text
                .as_deref()
                .map(|s| s.len())
                .unwrap_or(0)
                .to_string(),
            degraded.join(" "),
            truncate_error(state.error.as_deref().unwrap_or(""), ERROR_COLUMN_CHARS),
        ];
        let escaped: Vec<String> = row.iter().map(|field| csv_escape(field)).collect();
        content.push_str(&escaped.join(","));
        content.push('\n');
    }

    fs_err::write(path, content)?;
    tracing::info!("Batch report saved to {}", path.display());
    Ok(())
}

/// Write the full summaries to a separate record.
pub fn write_summaries(states: &[PipelineState], path: &Path) -> Result<()> {
    let mut content = String::new();
    let bar = "=".repeat(50);

    for (i, state) in states.iter().enumerate() {
        content.push_str(&format!("\n{bar}\nVideo {}: {}\n{bar}\n\n", i + 1, state.source_reference));

        if let Some(error) = &state.error {
            content.push_str(&format!("ERROR: {error}\n"));
        } else {
            content.push_str(&format!(
                "SUMMARY:\n{}\n",
                state.summary_text.as_deref().unwrap_or("")
            ));
            if !state.degraded.is_empty() {
                let stages: Vec<&str> = state.degraded.iter().map(|s| s.as_str()).collect();
                content.push_str(&format!("(placeholder data used for: {})\n", stages.join(", ")));
            }
        }
    }

    fs_err::write(path, content)?;
    tracing::info!("Detailed summaries saved to {}", path.display());
    Ok(())
}

/// Print the batch outcome table to the console.
pub fn print_batch_table(states: &[PipelineState]) {
    let successes = states.iter().filter(|s| !s.is_failed()).count();
    println!(
        "\nProcessed {} source(s): {} succeeded, {} failed",
        states.len(),
        successes,
        states.len() - successes
    );

    for (i, state) in states.iter().enumerate() {
        let status = if state.is_failed() {
            style("FAIL").red().bold()
        } else if state.degraded.is_empty() {
            style("OK").green().bold()
        } else {
            style("OK*").yellow().bold()
        };

        let detail = match &state.error {
            Some(error) => truncate_error(error, ERROR_COLUMN_CHARS),
            None => {
                let degraded: Vec<&str> = state.degraded.iter().map(|s| s.as_str()).collect();
                if degraded.is_empty() {
                    String::new()
                } else {
                    format!("degraded: {}", degraded.join(", "))
                }
            }
        };

        println!("  {:>3}. [{}] {} {}", i + 1, status, state.source_reference, detail);
    }
}

fn file_name(path: Option<&str>) -> String {
    path.map(|p| {
        Path::new(p)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| p.to_string())
    })
    .unwrap_or_default()
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Stage;
    use tempfile::tempdir;

    fn done_state() -> PipelineState {
        let mut state = PipelineState::new("https://www.youtube.com/watch?v=vid1", "prompt");
        state.media_artifact_path = Some("downloads/vid1.mp3".into());
        state.transcript_artifact_path = Some("transcripts/vid1.txt".into());
        state.transcript_text = Some("the transcript".into());
        state.summary_artifact_path = Some("summaries/summary_prompt.txt".into());
        state.summary_text = Some("the summary".into());
        state.current_stage = Stage::Done;
        state
    }

    #[test]
    fn test_format_single_success() {
        let rendered = format_single(&done_state());
        assert!(rendered.contains("SUMMARY"));
        assert!(rendered.contains("the summary"));
        assert!(!rendered.contains("placeholder data"));
    }

    #[test]
    fn test_format_single_flags_degraded_stages() {
        let mut state = done_state();
        state.degraded.insert(Stage::Fetch);
        state.degraded.insert(Stage::Transcribe);

        let rendered = format_single(&state);
        assert!(rendered.contains("placeholder data was used for: fetch, transcribe"));
    }

    #[test]
    fn test_format_single_failure_keeps_partial_artifacts() {
        let mut state = PipelineState::new("url", "prompt");
        state.media_artifact_path = Some("downloads/vid1.mp3".into());
        state.fail(Stage::Transcribe, "fallback production failed");

        let rendered = format_single(&state);
        assert!(rendered.contains("FAILED"));
        assert!(rendered.contains("transcribe stage: fallback production failed"));
        assert!(rendered.contains("Partial media artifact"));
    }

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_write_csv_report_one_row_per_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.csv");

        let mut failed = PipelineState::new("https://example.com/bad", "prompt");
        failed.fail(Stage::Fetch, "it broke, badly");

        write_csv_report(&[done_state(), failed], &path).unwrap();

        let content = fs_err::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("URL,Success"));
        assert!(lines[1].contains("true"));
        assert!(lines[2].contains("false"));
        assert!(lines[2].contains("\"fetch stage: it broke, badly\""));
    }

    #[test]
    fn test_write_summaries_includes_errors_and_summaries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summaries.txt");

        let mut failed = PipelineState::new("https://example.com/bad", "prompt");
        failed.fail(Stage::Summarize, "boom");

        write_summaries(&[done_state(), failed], &path).unwrap();

        let content = fs_err::read_to_string(&path).unwrap();
        assert!(content.contains("SUMMARY:\nthe summary"));
        assert!(content.contains("ERROR: summarize stage: boom"));
    }
}
