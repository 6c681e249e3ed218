//! Tube Digest - A Rust CLI tool for summarizing remote videos
//!
//! This library fetches a video's audio track, transcribes it with an external
//! speech-to-text API, and produces an instruction-conditioned summary. The
//! three external calls are unreliable, so each stage runs behind a retry
//! policy with a fallback path, and a single state record threads partial
//! results and error status through the pipeline.

pub mod batch;
pub mod capabilities;
pub mod cli;
pub mod config;
pub mod output;
pub mod pipeline;
pub mod retry;
pub mod utils;

pub use capabilities::{CapabilityError, Fetcher, Summarizer, Transcriber};
pub use cli::{Cli, Commands};
pub use config::Config;
pub use pipeline::{PipelineController, PipelineState, Stage};
pub use retry::{RetryDecision, RetrySettings};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;
