use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tubedigest",
    about = "Tube Digest - Fetch, transcribe, and summarize videos with per-stage retry and fallback",
    version,
    long_about = "A CLI tool that downloads a video's audio, transcribes it with an external speech-to-text API, and produces an instruction-conditioned summary. Each stage retries transient failures with backoff and falls back to a clearly marked placeholder when the capability stays down."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch, transcribe, and summarize a single video
    Summarize {
        /// Video URL to process (YouTube or any yt-dlp supported source)
        #[arg(value_name = "URL")]
        url: String,

        /// Instruction the summary should follow
        #[arg(value_name = "INSTRUCTION")]
        instruction: String,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Emit the full pipeline state as JSON instead of plain text
        #[arg(long)]
        json: bool,
    },

    /// Process many videos with one shared instruction
    Batch {
        /// File with one video URL per line ('#' starts a comment)
        #[arg(value_name = "SOURCES_FILE")]
        sources: PathBuf,

        /// Instruction applied to every video
        #[arg(short, long, value_name = "TEXT")]
        instruction: String,

        /// CSV report path
        #[arg(long, value_name = "FILE", default_value = "batch_report.csv")]
        report: PathBuf,

        /// Detailed summaries record path
        #[arg(long, value_name = "FILE", default_value = "batch_summaries.txt")]
        summaries: PathBuf,
    },

    /// Configure API and retry settings
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List supported platforms
    Platforms,
}
