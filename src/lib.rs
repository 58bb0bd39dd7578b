//! ytdl Core Library
//!
//! This library turns batches of video links into audio files. Each link is
//! validated, resolved to a direct playback stream, enriched with metadata,
//! downloaded to a scratch file and handed to an audio converter.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`link`] - Batch link validation and identifier extraction
//! - [`resolver`] - Two-tier playback URL resolution (in-page parse, provider fallback)
//! - [`provider`] - Extraction-provider and metadata capabilities
//! - [`playlist`] - One-level playlist expansion
//! - [`download`] - HTTP fetch capability with streaming downloads
//! - [`convert`] - Audio conversion capability
//! - [`filename`] - Cross-platform filename sanitizer
//! - [`pipeline`] - Concurrent per-stage orchestration with partial-failure reporting

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod convert;
pub mod download;
pub mod filename;
pub mod link;
mod page;
pub mod pipeline;
pub mod playlist;
pub mod provider;
pub mod resolver;
mod user_agent;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use convert::{AudioConverter, ConvertError, FfmpegConverter};
pub use download::{DownloadError, HttpClient};
pub use filename::{TargetOs, sanitize_filename, sanitize_path};
pub use link::{LinkError, VideoLink, validate_links};
pub use pipeline::{
    BatchError, BatchOutcome, DEFAULT_CONCURRENCY, ErrorKind, ItemError, NoopReporter, Pipeline,
    PipelineConfigError, PipelineOptions, PipelineReporter, ResolvedVideo, Stage, StageResult,
    TracingReporter,
};
pub use playlist::{PagePlaylistSource, PlaylistError, PlaylistListing, PlaylistSource};
pub use provider::{
    ExtractionProvider, MetadataError, MetadataSource, ProviderError, RustyYtdlProvider,
    StreamFormat, VideoMetadata,
};
pub use resolver::{PlaybackResolver, ResolutionTier, ResolveError, StreamDescriptor};
