//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use ytdl_core::{DEFAULT_CONCURRENCY, TargetOs};

/// Download batches of video links as audio files.
///
/// Every link is validated up front; a batch with any malformed or
/// unsupported link is rejected before anything is downloaded. Playlist links
/// are expanded one level into a per-playlist folder.
#[derive(Parser, Debug)]
#[command(name = "ytdl")]
#[command(author, version, about)]
pub struct Args {
    /// Links to process
    #[arg(value_name = "LINKS")]
    pub links: Vec<String>,

    /// Comma-separated list of links (combined with positional links)
    #[arg(short = 'l', long = "links", value_delimiter = ',', value_name = "LIST")]
    pub link_list: Vec<String>,

    /// Output directory (default: current directory)
    #[arg(short = 'd', long = "dst", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Treat playlist links as single videos; skip playlist expansion
    #[arg(long)]
    pub video_only: bool,

    /// Append the uploader name to output filenames
    #[arg(long)]
    pub include_author: bool,

    /// Maximum concurrent tasks per stage (1-100)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Filesystem naming rules for output files
    #[arg(long, value_enum)]
    pub target_os: Option<TargetOsArg>,

    /// Path to the ffmpeg binary (default: looked up in PATH)
    #[arg(long, value_name = "PATH")]
    pub ffmpeg: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/ytdl/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Positional links followed by `--links` entries, blanks dropped.
    #[must_use]
    pub fn all_links(&self) -> Vec<String> {
        self.links
            .iter()
            .chain(&self.link_list)
            .map(|link| link.trim())
            .filter(|link| !link.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Concurrency from the command line, falling back to `fallback`.
    #[must_use]
    pub fn concurrency_or(&self, fallback: Option<u8>) -> usize {
        self.concurrency
            .or(fallback)
            .map_or(DEFAULT_CONCURRENCY, usize::from)
    }
}

/// `--target-os` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TargetOsArg {
    /// Rules of the platform the binary runs on
    Auto,
    /// Portable (Unix-like) rules
    Portable,
    /// Windows rules: reserved names, 4-byte extensions, 259-char paths
    Windows,
}

impl From<TargetOsArg> for TargetOs {
    fn from(value: TargetOsArg) -> Self {
        match value {
            TargetOsArg::Auto => TargetOs::current(),
            TargetOsArg::Portable => TargetOs::Portable,
            TargetOsArg::Windows => TargetOs::Windows,
        }
    }
}
