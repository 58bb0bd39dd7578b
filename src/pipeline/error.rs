//! Error types for the pipeline orchestrator.
//!
//! [`BatchError`] aborts a run before any stage starts. Every other failure is
//! an [`ItemError`] tagged with its originating link and collected into the
//! batch outcome without affecting sibling items.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::options::{MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::convert::ConvertError;
use crate::download::DownloadError;
use crate::link::LinkError;
use crate::playlist::PlaylistError;
use crate::provider::MetadataError;
use crate::resolver::ResolveError;

/// Pipeline stage an item error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// One-level playlist expansion.
    Expand,
    /// Playback-URL resolution.
    Resolve,
    /// Title/author lookup.
    Metadata,
    /// Stream download into a scratch file.
    Download,
    /// Conversion into the output file.
    Convert,
    /// Scratch file removal.
    Cleanup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Expand => "expand",
            Self::Resolve => "resolve",
            Self::Metadata => "metadata",
            Self::Download => "download",
            Self::Convert => "convert",
            Self::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Classification of an item failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The link cannot be resolved as a single video.
    BadLink,
    /// Neither resolution tier offered an acceptable format.
    NoStreamFound,
    /// HTTP/network failure while fetching the watch page.
    Transport,
    /// The extraction provider failed.
    Provider,
    /// Playlist expansion failed.
    Playlist,
    /// Title lookup failed.
    Metadata,
    /// Stream download failed.
    Download,
    /// Conversion failed.
    Conversion,
    /// Scratch file removal failed.
    Cleanup,
    /// The stage task panicked.
    Panicked,
}

/// A per-item failure, tagged with the link it belongs to.
#[derive(Debug, Error)]
pub enum ItemError {
    /// Playlist expansion failed.
    #[error("{link}: {source}")]
    Playlist {
        /// Originating link.
        link: String,
        /// Underlying error.
        #[source]
        source: PlaylistError,
    },

    /// Playback-URL resolution failed.
    #[error("{link}: {source}")]
    Resolve {
        /// Originating link.
        link: String,
        /// Underlying error.
        #[source]
        source: ResolveError,
    },

    /// Metadata lookup failed.
    #[error("{link}: {source}")]
    Metadata {
        /// Originating link.
        link: String,
        /// Underlying error.
        #[source]
        source: MetadataError,
    },

    /// Stream download failed.
    #[error("{link}: download failed: {source}")]
    Download {
        /// Originating link.
        link: String,
        /// Underlying error.
        #[source]
        source: DownloadError,
    },

    /// Conversion failed.
    #[error("{link}: conversion failed: {source}")]
    Conversion {
        /// Originating link.
        link: String,
        /// Underlying error.
        #[source]
        source: ConvertError,
    },

    /// Scratch file removal failed.
    #[error("{link}: failed to remove scratch file {path}: {source}")]
    Cleanup {
        /// Originating link.
        link: String,
        /// Scratch file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The stage task panicked before reporting a result.
    #[error("{link}: {stage} task panicked: {message}")]
    Panicked {
        /// Originating link.
        link: String,
        /// Stage whose task panicked.
        stage: Stage,
        /// Panic payload, when it was a string.
        message: String,
    },
}

impl ItemError {
    /// Link the failure belongs to.
    #[must_use]
    pub fn link(&self) -> &str {
        match self {
            Self::Playlist { link, .. }
            | Self::Resolve { link, .. }
            | Self::Metadata { link, .. }
            | Self::Download { link, .. }
            | Self::Conversion { link, .. }
            | Self::Cleanup { link, .. }
            | Self::Panicked { link, .. } => link,
        }
    }

    /// Stage the failure happened in.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Playlist { .. } => Stage::Expand,
            Self::Resolve { .. } => Stage::Resolve,
            Self::Metadata { .. } => Stage::Metadata,
            Self::Download { .. } => Stage::Download,
            Self::Conversion { .. } => Stage::Convert,
            Self::Cleanup { .. } => Stage::Cleanup,
            Self::Panicked { stage, .. } => *stage,
        }
    }

    /// Error classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Playlist { .. } => ErrorKind::Playlist,
            Self::Resolve { source, .. } => match source {
                ResolveError::BadLink { .. } => ErrorKind::BadLink,
                ResolveError::NoStreamFound => ErrorKind::NoStreamFound,
                ResolveError::Transport(_) => ErrorKind::Transport,
                ResolveError::Provider(_) => ErrorKind::Provider,
            },
            Self::Metadata { .. } => ErrorKind::Metadata,
            Self::Download { .. } => ErrorKind::Download,
            Self::Conversion { .. } => ErrorKind::Conversion,
            Self::Cleanup { .. } => ErrorKind::Cleanup,
            Self::Panicked { .. } => ErrorKind::Panicked,
        }
    }
}

/// Failures that abort a whole batch before any stage runs.
#[derive(Debug, Error)]
pub enum BatchError {
    /// One or more links failed validation; every rejected link is listed.
    #[error("{} invalid link(s) in batch", .0.len())]
    InvalidLinks(Vec<LinkError>),

    /// The output directory could not be created.
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        /// Output directory.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Invalid [`PipelineOptions`](super::PipelineOptions).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineConfigError {
    /// Concurrency outside the accepted range.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The rejected value.
        value: usize,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_item_error_kind_maps_resolve_errors() {
        let cases = [
            (ResolveError::bad_link("no id"), ErrorKind::BadLink),
            (ResolveError::NoStreamFound, ErrorKind::NoStreamFound),
            (
                ResolveError::Transport(DownloadError::http_status("u", 404)),
                ErrorKind::Transport,
            ),
            (
                ResolveError::Provider(crate::provider::ProviderError::extraction("x")),
                ErrorKind::Provider,
            ),
        ];
        for (source, expected) in cases {
            let err = ItemError::Resolve {
                link: "https://youtu.be/a".to_string(),
                source,
            };
            assert_eq!(err.kind(), expected);
            assert_eq!(err.stage(), Stage::Resolve);
        }
    }

    #[test]
    fn test_item_error_display_is_tagged_with_link() {
        let err = ItemError::Resolve {
            link: "https://youtu.be/two".to_string(),
            source: ResolveError::Transport(DownloadError::http_status(
                "https://www.youtube.com/watch?v=two",
                404,
            )),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("https://youtu.be/two: transport error"), "got {msg}");
        assert_eq!(err.link(), "https://youtu.be/two");
    }

    #[test]
    fn test_cleanup_error_kind_and_stage() {
        let err = ItemError::Cleanup {
            link: "https://youtu.be/a".to_string(),
            path: PathBuf::from("/tmp/ytdl_x"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(err.kind(), ErrorKind::Cleanup);
        assert_eq!(err.stage(), Stage::Cleanup);
        assert!(err.to_string().contains("/tmp/ytdl_x"));
    }

    #[test]
    fn test_panicked_error_keeps_stage_and_link() {
        let err = ItemError::Panicked {
            link: "https://youtu.be/a".to_string(),
            stage: Stage::Download,
            message: "boom".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Panicked);
        assert_eq!(err.stage(), Stage::Download);
        assert_eq!(err.to_string(), "https://youtu.be/a: download task panicked: boom");
    }

    #[test]
    fn test_batch_error_invalid_links_display_counts() {
        let err = BatchError::InvalidLinks(vec![
            LinkError::malformed(1, "a", "bad"),
            LinkError::unsupported_host(3, "https://example.com"),
        ]);
        assert_eq!(err.to_string(), "2 invalid link(s) in batch");
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Convert.to_string(), "convert");
        assert_eq!(Stage::Cleanup.to_string(), "cleanup");
    }

    #[test]
    fn test_pipeline_config_error_display() {
        let err = PipelineConfigError::InvalidConcurrency { value: 0 };
        assert!(err.to_string().contains("between 1 and 100"));
    }
}
