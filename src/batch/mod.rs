use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::BatchSettings;
use crate::pipeline::{PipelineController, PipelineState, Stage};

/// Processes many source references with one shared instruction.
///
/// Invocations are independent: a failed pipeline becomes a failed row, never
/// an early exit. A randomized wait separates consecutive invocations to keep
/// the external services from throttling the whole batch.
pub async fn run_batch(
    controller: &PipelineController,
    sources: &[String],
    instruction: &str,
    settings: &BatchSettings,
    cancel: &CancellationToken,
) -> Vec<PipelineState> {
    let progress = ProgressBar::new(sources.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap(),
    );

    let mut results = Vec::with_capacity(sources.len());

    for (i, source) in sources.iter().enumerate() {
        if cancel.is_cancelled() {
            results.push(cancelled_state(source, instruction));
            progress.inc(1);
            continue;
        }

        if i > 0 && !throttle_wait(settings, cancel).await {
            results.push(cancelled_state(source, instruction));
            progress.inc(1);
            continue;
        }

        tracing::info!("Processing source {}/{}: {}", i + 1, sources.len(), source);
        progress.set_message(source.clone());

        results.push(controller.run(source, instruction).await);
        progress.inc(1);
    }

    progress.finish_with_message("Batch complete");
    results
}

/// Sleeps a random duration inside the configured window, racing the
/// cancellation token. Returns false when cancelled.
async fn throttle_wait(settings: &BatchSettings, cancel: &CancellationToken) -> bool {
    if settings.wait_max_secs == 0 {
        return true;
    }

    let secs = rand::thread_rng().gen_range(settings.wait_min_secs..=settings.wait_max_secs);
    tracing::info!("Waiting {}s before processing next source...", secs);

    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(Duration::from_secs(secs)) => true,
    }
}

fn cancelled_state(source: &str, instruction: &str) -> PipelineState {
    let mut state = PipelineState::new(source, instruction);
    state.fail(Stage::Fetch, "batch cancelled before invocation started");
    state
}
