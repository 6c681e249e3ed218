use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod batch;
mod capabilities;
mod cli;
mod config;
mod output;
mod pipeline;
mod retry;
mod utils;

use capabilities::{ChatSummarizer, WhisperTranscriber, YtDlpFetcher};
use cli::{Cli, Commands};
use config::Config;
use pipeline::{ArtifactStore, PipelineController};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "tubedigest=debug"
    } else {
        "tubedigest=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Check for required external dependencies (non-fatal)
    let missing_deps = utils::check_dependencies().await;
    if !missing_deps.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing_deps {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }

    let config = Config::load().await?;

    // Ctrl-C aborts backoff waits and batch spacing; in-flight external
    // calls are left to finish on their own.
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling pending work");
            interrupt.cancel();
        }
    });

    match cli.command {
        Commands::Summarize {
            url,
            instruction,
            output,
            json,
        } => {
            let url = utils::validate_and_normalize_url(&url)?;
            let controller = build_controller(&config, cancel.clone())?;

            tracing::info!("Starting pipeline for URL: {}", url);
            let state = controller.run(&url, &instruction).await;

            match output {
                Some(path) => {
                    output::save_single(&state, &path, json)?;
                    println!("Result saved to: {}", path.display());
                }
                None => {
                    output::print_single(&state, json)?;
                }
            }

            if state.is_failed() {
                std::process::exit(1);
            }
        }
        Commands::Batch {
            sources,
            instruction,
            report,
            summaries,
        } => {
            let sources = read_sources(&sources)?;
            if sources.is_empty() {
                anyhow::bail!("No source URLs found in the sources file");
            }

            let controller = build_controller(&config, cancel.clone())?;
            let results =
                batch::run_batch(&controller, &sources, &instruction, &config.batch, &cancel)
                    .await;

            output::write_csv_report(&results, &report)?;
            output::write_summaries(&results, &summaries)?;
            output::print_batch_table(&results);
            println!("Report saved to: {}", report.display());
            println!("Summaries saved to: {}", summaries.display());
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                println!("Edit the config file to change settings:");
                println!("  (a default file is created on first run)");
                config.display();
            }
        }
        Commands::Platforms => {
            println!("Supported sources (anything yt-dlp can fetch), including:");
            println!("  • YouTube (youtube.com, youtu.be)");
            println!("  • Twitter/X (twitter.com, x.com)");
            println!("  • Vimeo, Twitch VODs, SoundCloud");
            println!("  • Direct audio/video URLs");
        }
    }

    Ok(())
}

fn build_controller(config: &Config, cancel: CancellationToken) -> Result<PipelineController> {
    let api_key = config.api_key()?;

    Ok(PipelineController::new(
        Arc::new(YtDlpFetcher::new()),
        Arc::new(WhisperTranscriber::new(
            config.api.api_base.clone(),
            api_key.clone(),
            config.api.transcription_model.clone(),
        )),
        Arc::new(ChatSummarizer::new(
            config.api.api_base.clone(),
            api_key,
            config.api.summary_model.clone(),
        )),
        ArtifactStore::new(config.data_dir()),
        config.retries.clone(),
        cancel,
    ))
}

fn read_sources(path: &Path) -> Result<Vec<String>> {
    let content = fs_err::read_to_string(path)?;
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(utils::validate_and_normalize_url)
        .collect()
}
