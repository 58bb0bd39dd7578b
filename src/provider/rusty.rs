//! `rusty_ytdl`-backed provider.

use async_trait::async_trait;
use rusty_ytdl::{MimeType, Video, VideoFormat};
use tracing::{debug, instrument};

use super::{
    ExtractionProvider, MetadataError, MetadataSource, ProviderError, StreamFormat, VideoMetadata,
};

/// Extraction provider and metadata source using the pure-Rust `rusty_ytdl`
/// client.
///
/// `rusty_ytdl` deciphers signatures while fetching video info, so format URLs
/// are already playable when [`resolve_formats`](ExtractionProvider::resolve_formats)
/// returns.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustyYtdlProvider;

impl RustyYtdlProvider {
    /// Creates a provider.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Rebuilds the `mimeType` string as the watch page spells it, codecs included.
fn mime_string(mime: &MimeType) -> String {
    let essence = format!("{}/{}", mime.mime.type_(), mime.mime.subtype());
    if mime.codecs.is_empty() {
        essence
    } else {
        format!(r#"{essence}; codecs="{}""#, mime.codecs.join(", "))
    }
}

fn to_stream_format(format: &VideoFormat) -> StreamFormat {
    StreamFormat {
        itag: Some(format.itag),
        quality: format.quality.clone().filter(|q| !q.is_empty()),
        audio_quality: format.audio_quality.clone(),
        mime_type: Some(mime_string(&format.mime_type)),
        url: Some(format.url.clone()).filter(|u| !u.is_empty()),
    }
}

#[async_trait]
impl ExtractionProvider for RustyYtdlProvider {
    #[instrument(skip(self))]
    async fn resolve_formats(&self, link: &str) -> Result<Vec<StreamFormat>, ProviderError> {
        let video = Video::new(link)
            .map_err(|e| ProviderError::extraction(format!("invalid video link: {e}")))?;
        let info = video
            .get_info()
            .await
            .map_err(|e| ProviderError::extraction(format!("failed to get video info: {e}")))?;

        debug!(formats = info.formats.len(), "provider formats fetched");
        Ok(info.formats.iter().map(to_stream_format).collect())
    }

    async fn materialize_stream_url(
        &self,
        _link: &str,
        format: &StreamFormat,
    ) -> Result<String, ProviderError> {
        format
            .url
            .clone()
            .ok_or_else(|| ProviderError::missing_stream_url(format))
    }
}

#[async_trait]
impl MetadataSource for RustyYtdlProvider {
    #[instrument(skip(self))]
    async fn fetch_metadata(&self, link: &str) -> Result<VideoMetadata, MetadataError> {
        let video = Video::new(link)
            .map_err(|e| MetadataError::lookup(format!("invalid video link: {e}")))?;
        let info = video
            .get_basic_info()
            .await
            .map_err(|e| MetadataError::lookup(format!("failed to get video info: {e}")))?;

        let details = &info.video_details;
        let title = details.title.trim().to_string();
        if title.is_empty() {
            return Err(MetadataError::MissingTitle);
        }
        let author = details
            .author
            .as_ref()
            .map(|a| a.name.trim().to_string())
            .filter(|name| !name.is_empty());

        Ok(VideoMetadata { title, author })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn video_format(mime_type: &str, quality: Option<&str>, url: &str) -> VideoFormat {
        serde_json::from_value(serde_json::json!({
            "itag": 18,
            "mimeType": mime_type,
            "bitrate": 500_000,
            "quality": quality,
            "audioQuality": "AUDIO_QUALITY_MEDIUM",
            "url": url,
            "hasVideo": true,
            "hasAudio": true,
            "isLive": false,
            "isHLS": false,
            "isDashMPD": false,
        }))
        .unwrap()
    }

    #[test]
    fn test_to_stream_format_keeps_codecs_like_the_page() {
        let format = video_format(
            r#"video/mp4; codecs="avc1.42001E, mp4a.40.2""#,
            Some("medium"),
            "https://media.example/18",
        );
        let stream = to_stream_format(&format);
        assert_eq!(stream.itag, Some(18));
        assert_eq!(stream.quality.as_deref(), Some("medium"));
        assert_eq!(stream.audio_quality.as_deref(), Some("AUDIO_QUALITY_MEDIUM"));
        assert_eq!(
            stream.mime_type.as_deref(),
            Some(r#"video/mp4; codecs="avc1.42001E, mp4a.40.2""#)
        );
        assert_eq!(stream.url.as_deref(), Some("https://media.example/18"));
    }

    #[test]
    fn test_to_stream_format_drops_empty_quality_and_url() {
        let format = video_format("audio/webm", Some(""), "");
        let stream = to_stream_format(&format);
        assert_eq!(stream.quality, None);
        assert_eq!(stream.url, None);
        assert_eq!(stream.mime_type.as_deref(), Some("audio/webm"));

        let format = video_format("audio/webm", None, "https://media.example/x");
        assert_eq!(to_stream_format(&format).quality, None);
    }

    #[tokio::test]
    async fn test_materialize_returns_existing_url() {
        let provider = RustyYtdlProvider::new();
        let format = StreamFormat {
            itag: Some(18),
            url: Some("https://media.example/stream".to_string()),
            ..StreamFormat::default()
        };
        let url = provider
            .materialize_stream_url("https://youtu.be/abc", &format)
            .await
            .unwrap();
        assert_eq!(url, "https://media.example/stream");
    }

    #[tokio::test]
    async fn test_materialize_without_url_is_provider_error() {
        let provider = RustyYtdlProvider::new();
        let err = provider
            .materialize_stream_url("https://youtu.be/abc", &StreamFormat::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingStreamUrl { .. }));
    }
}
