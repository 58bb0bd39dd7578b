//! Error types for playback-URL resolution.

use thiserror::Error;

use crate::download::DownloadError;
use crate::provider::ProviderError;

/// Errors that can occur while resolving a link to a stream URL.
///
/// Messages do not repeat the link; callers tag errors with their link.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The link cannot be resolved as a single video.
    #[error("bad link: {reason}")]
    BadLink {
        /// Why the link was rejected.
        reason: String,
    },

    /// Neither the page nor the provider offered an acceptable format.
    #[error("no acceptable stream found")]
    NoStreamFound,

    /// The watch page could not be fetched.
    #[error("transport error: {0}")]
    Transport(#[from] DownloadError),

    /// The extraction provider failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl ResolveError {
    /// Creates a `BadLink` error.
    pub fn bad_link(reason: impl Into<String>) -> Self {
        Self::BadLink {
            reason: reason.into(),
        }
    }
}
