//! CLI entry point for the ytdl tool.

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use ytdl_core::{
    BatchError, BatchOutcome, FfmpegConverter, HttpClient, PagePlaylistSource, Pipeline, PipelineOptions,
    PipelineReporter, PlaybackResolver, RustyYtdlProvider, TargetOs, TracingReporter,
    validate_links,
};

mod cli;
mod config;
mod progress;

use cli::Args;
use config::FileConfig;
use progress::{ProgressReporter, should_use_progress};

/// Process outcome mapped to the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessExit {
    /// Every item completed.
    Success,
    /// Some items completed, some failed.
    Partial,
    /// Nothing completed, or the batch was rejected.
    Failure,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Partial => ExitCode::from(1),
            ProcessExit::Failure => ExitCode::from(2),
        }
    }
}

/// Maps a batch outcome to the process exit outcome.
///
/// Success requires every item to have completed, so an item that vanished
/// without an error still counts against the batch.
fn determine_exit_outcome(outcome: &BatchOutcome) -> ProcessExit {
    if outcome.is_success() {
        ProcessExit::Success
    } else if outcome.completed > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

/// Priority: `RUST_LOG` > `--quiet` > `-v` count > config verbosity > `info`.
fn default_log_level(args: &Args, file: &FileConfig) -> &'static str {
    if args.quiet {
        return "error";
    }
    match args.verbose {
        0 => file.verbosity.map_or("info", |v| v.log_level()),
        1 => "debug",
        _ => "trace",
    }
}

fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .try_init();
}

fn build_options(args: &Args, file: &FileConfig) -> Result<PipelineOptions> {
    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| file.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let target_os = args
        .target_os
        .map(TargetOs::from)
        .or(file.target_os)
        .unwrap_or_else(TargetOs::current);

    let options = PipelineOptions::new(output_dir)
        .with_concurrency(args.concurrency_or(file.concurrency))?
        .with_video_only(args.video_only || file.video_only.unwrap_or(false))
        .with_include_author(args.include_author || file.include_author.unwrap_or(false))
        .with_target_os(target_os);
    Ok(options)
}

fn find_converter(args: &Args, file: &FileConfig) -> Result<FfmpegConverter> {
    if let Some(path) = args.ffmpeg.clone().or_else(|| file.ffmpeg_path.clone()) {
        return Ok(FfmpegConverter::new(path));
    }
    FfmpegConverter::from_path().context("ffmpeg not found in PATH; pass --ffmpeg <PATH>")
}

fn print_invalid_links(errors: &[ytdl_core::LinkError]) {
    eprintln!("Batch rejected: {} invalid link(s)", errors.len());
    for error in errors {
        eprintln!("  {error}");
    }
}

async fn run(args: Args) -> Result<ProcessExit> {
    let file = config::load_config(args.config.as_deref())?;
    init_tracing(default_log_level(&args, &file));
    debug!(?args, "CLI arguments parsed");

    let links = args.all_links();
    if links.is_empty() {
        info!("No links provided. Pass links as arguments or with --links.");
        info!("Example: ytdl https://youtu.be/dQw4w9WgXcQ");
        return Ok(ProcessExit::Success);
    }

    // Reject bad batches before looking for a converter.
    if let Err(errors) = validate_links(&links) {
        print_invalid_links(&errors);
        return Ok(ProcessExit::Failure);
    }

    let options = build_options(&args, &file)?;
    let converter = find_converter(&args, &file)?;
    debug!(ffmpeg = %converter.binary_path().display(), "converter located");

    let http = match (file.connect_timeout_secs, file.read_timeout_secs) {
        (None, None) => HttpClient::new(),
        (connect, read) => HttpClient::new_with_timeouts(
            connect.unwrap_or(ytdl_core::download::CONNECT_TIMEOUT_SECS),
            read.unwrap_or(ytdl_core::download::READ_TIMEOUT_SECS),
        ),
    };
    let provider = Arc::new(RustyYtdlProvider::new());

    let progress = should_use_progress(io::stderr().is_terminal(), args.quiet)
        .then(|| Arc::new(ProgressReporter::new()));
    let reporter: Arc<dyn PipelineReporter> = match &progress {
        Some(bars) => Arc::clone(bars) as Arc<dyn PipelineReporter>,
        None => Arc::new(TracingReporter),
    };

    let pipeline = Pipeline::new(
        options,
        http.clone(),
        PlaybackResolver::new(http.clone(), provider.clone()),
        provider,
        Arc::new(PagePlaylistSource::new(http)),
        Arc::new(converter),
    )
    .with_reporter(reporter);

    info!(links = links.len(), "ytdl starting");
    let result = pipeline.run(&links).await;
    if let Some(bars) = &progress {
        bars.finish();
    }

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(BatchError::InvalidLinks(errors)) => {
            print_invalid_links(&errors);
            return Ok(ProcessExit::Failure);
        }
        Err(e) => return Err(e.into()),
    };

    for path in &outcome.outputs {
        println!("{}", path.display());
    }
    for error in &outcome.errors {
        eprintln!("{error}");
    }
    info!(
        completed = outcome.completed,
        failed = outcome.errors.len(),
        total = outcome.total,
        "Batch complete"
    );

    Ok(determine_exit_outcome(&outcome))
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    match run(args).await {
        Ok(exit) => exit.into(),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ProcessExit::Failure.into()
        }
    }
}
