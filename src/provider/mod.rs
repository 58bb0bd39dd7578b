//! Extraction-provider and metadata capabilities.
//!
//! The resolver and pipeline only talk to the provider through the
//! [`ExtractionProvider`] and [`MetadataSource`] traits, so the concrete
//! extraction library can be swapped (or faked in tests) freely.
//!
//! - [`ExtractionProvider`] - format list + stream URL materialization
//! - [`MetadataSource`] - title/author lookup
//! - [`RustyYtdlProvider`] - both capabilities backed by `rusty_ytdl`

mod rusty;

pub use rusty::RustyYtdlProvider;

use async_trait::async_trait;
use thiserror::Error;

/// One stream format as reported by a provider or an embedded page object.
///
/// Every descriptive field is optional: absence is a normal condition that the
/// acceptance predicate checks for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamFormat {
    /// Provider format identifier.
    pub itag: Option<u64>,
    /// Video quality tier (`tiny`, `medium`, `hd720`, ...).
    pub quality: Option<String>,
    /// Audio quality tier (`AUDIO_QUALITY_MEDIUM`, ...).
    pub audio_quality: Option<String>,
    /// Container/codec string, e.g. `video/mp4; codecs="avc1.42001E, mp4a.40.2"`.
    pub mime_type: Option<String>,
    /// Direct stream URL, when the source already carries one.
    pub url: Option<String>,
}

/// Title and uploader of a single video.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoMetadata {
    /// Human-readable title.
    pub title: String,
    /// Uploader name, when known.
    pub author: Option<String>,
}

/// Errors raised by an [`ExtractionProvider`].
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider could not extract formats for the link.
    #[error("extraction provider failed: {reason}")]
    Extraction {
        /// Provider-reported reason.
        reason: String,
    },

    /// The provider could not produce a stream URL for the chosen format.
    #[error("extraction provider returned no stream URL for format {itag}")]
    MissingStreamUrl {
        /// Format identifier (or `unknown`).
        itag: String,
    },
}

impl ProviderError {
    /// Creates an `Extraction` error.
    pub fn extraction(reason: impl Into<String>) -> Self {
        Self::Extraction {
            reason: reason.into(),
        }
    }

    /// Creates a `MissingStreamUrl` error for `format`.
    #[must_use]
    pub fn missing_stream_url(format: &StreamFormat) -> Self {
        Self::MissingStreamUrl {
            itag: format
                .itag
                .map_or_else(|| "unknown".to_string(), |itag| itag.to_string()),
        }
    }
}

/// Errors raised by a [`MetadataSource`].
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The lookup itself failed.
    #[error("metadata lookup failed: {reason}")]
    Lookup {
        /// Source-reported reason.
        reason: String,
    },

    /// The lookup succeeded but returned no usable title.
    #[error("metadata has no title")]
    MissingTitle,
}

impl MetadataError {
    /// Creates a `Lookup` error.
    pub fn lookup(reason: impl Into<String>) -> Self {
        Self::Lookup {
            reason: reason.into(),
        }
    }
}

/// Fallback resolution capability.
///
/// This trait uses `async_trait` so implementations can be shared as
/// `Arc<dyn ExtractionProvider>` across pipeline tasks.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Returns the structured format list for `link`, in provider order.
    async fn resolve_formats(&self, link: &str) -> Result<Vec<StreamFormat>, ProviderError>;

    /// Produces a direct stream URL for a format previously returned by
    /// [`resolve_formats`](Self::resolve_formats).
    async fn materialize_stream_url(
        &self,
        link: &str,
        format: &StreamFormat,
    ) -> Result<String, ProviderError>;
}

/// Title/author lookup capability.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetches the title and uploader for `link`.
    async fn fetch_metadata(&self, link: &str) -> Result<VideoMetadata, MetadataError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_missing_stream_url_uses_itag() {
        let format = StreamFormat {
            itag: Some(18),
            ..StreamFormat::default()
        };
        let msg = ProviderError::missing_stream_url(&format).to_string();
        assert!(msg.contains("18"), "Expected itag in: {msg}");
    }

    #[test]
    fn test_provider_error_missing_stream_url_without_itag() {
        let msg = ProviderError::missing_stream_url(&StreamFormat::default()).to_string();
        assert!(msg.contains("unknown"), "Expected placeholder in: {msg}");
    }

    #[test]
    fn test_metadata_error_display() {
        assert_eq!(
            MetadataError::lookup("video unavailable").to_string(),
            "metadata lookup failed: video unavailable"
        );
        assert_eq!(MetadataError::MissingTitle.to_string(), "metadata has no title");
    }
}
