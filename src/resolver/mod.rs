//! Playback-URL resolution.
//!
//! Resolves one validated link to a direct, time-limited stream URL with two
//! ordered strategies:
//!
//! 1. **Page tier** - fetch the watch page and decode the embedded player
//!    response. Transport failures and non-2xx responses fail the link
//!    immediately.
//! 2. **Provider tier** - ask the [`ExtractionProvider`] for its format list
//!    and have it materialize the URL of the chosen format.
//!
//! Both tiers share one acceptance predicate: quality in
//! `{tiny, medium, hd720}` and audio quality `AUDIO_QUALITY_MEDIUM`. Among
//! acceptable formats the lowest quality rank wins; equal ranks keep source
//! order.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ytdl_core::{HttpClient, PlaybackResolver, RustyYtdlProvider, VideoLink};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = PlaybackResolver::new(HttpClient::new(), Arc::new(RustyYtdlProvider::new()));
//! let link = VideoLink::parse(1, "https://youtu.be/dQw4w9WgXcQ")?;
//! let stream = resolver.resolve(&link).await?;
//! println!("{} -> {}", stream.source_url, stream.stream_url);
//! # Ok(())
//! # }
//! ```

mod error;
mod player_response;

pub use error::ResolveError;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument};
use url::Url;

use crate::download::HttpClient;
use crate::link::VideoLink;
use crate::page::Embedded;
use crate::provider::{ExtractionProvider, StreamFormat};

/// Default origin for watch pages.
pub const DEFAULT_PAGE_BASE: &str = "https://www.youtube.com";

/// Accepted video quality tiers, lowest first.
pub const QUALITY_RANK: [&str; 3] = ["tiny", "medium", "hd720"];

/// The only accepted audio quality tier.
pub const ACCEPTED_AUDIO_QUALITY: &str = "AUDIO_QUALITY_MEDIUM";

/// Which strategy produced a stream URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    /// Embedded player response on the watch page.
    Page,
    /// External extraction provider.
    Provider,
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page => f.write_str("page"),
            Self::Provider => f.write_str("provider"),
        }
    }
}

/// A resolved stream for one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// Canonical page URL (query pruned to the video identifier).
    pub source_url: String,
    /// Direct, time-limited media URL.
    pub stream_url: String,
    /// Container/codec string reported by the source.
    pub mime_type: String,
    /// Strategy that produced the URL.
    pub tier: ResolutionTier,
}

/// Rank of an acceptable format, or `None` when the predicate rejects it.
///
/// `require_url` is set for page formats, which must already carry a direct
/// URL; provider formats get theirs from
/// [`ExtractionProvider::materialize_stream_url`].
fn acceptable_rank(format: &StreamFormat, require_url: bool) -> Option<usize> {
    if require_url && format.url.as_deref().is_none_or(str::is_empty) {
        return None;
    }
    format.mime_type.as_ref()?;
    if format.audio_quality.as_deref() != Some(ACCEPTED_AUDIO_QUALITY) {
        return None;
    }
    let quality = format.quality.as_deref()?;
    QUALITY_RANK.iter().position(|tier| *tier == quality)
}

/// Picks the acceptable format with the lowest quality rank; ties keep input
/// order.
#[must_use]
pub fn select_format(formats: &[StreamFormat], require_url: bool) -> Option<&StreamFormat> {
    formats
        .iter()
        .filter_map(|f| acceptable_rank(f, require_url).map(|rank| (rank, f)))
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, f)| f)
}

/// Two-tier playback-URL resolver.
#[derive(Clone)]
pub struct PlaybackResolver {
    http: HttpClient,
    page_base: String,
    provider: Arc<dyn ExtractionProvider>,
}

impl fmt::Debug for PlaybackResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackResolver")
            .field("page_base", &self.page_base)
            .finish_non_exhaustive()
    }
}

impl PlaybackResolver {
    /// Creates a resolver fetching watch pages from [`DEFAULT_PAGE_BASE`].
    #[must_use]
    pub fn new(http: HttpClient, provider: Arc<dyn ExtractionProvider>) -> Self {
        Self {
            http,
            page_base: DEFAULT_PAGE_BASE.to_string(),
            provider,
        }
    }

    /// Overrides the watch-page origin (for testing with wiremock).
    #[must_use]
    pub fn with_page_base(mut self, base: impl Into<String>) -> Self {
        self.page_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// Resolves `link` to a stream descriptor.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::BadLink`] when the link carries no video identifier
    /// - [`ResolveError::Transport`] when the watch page fetch fails
    /// - [`ResolveError::Provider`] when the fallback provider fails
    /// - [`ResolveError::NoStreamFound`] when neither tier has an acceptable format
    #[instrument(skip(self, link), fields(link = %link))]
    pub async fn resolve(&self, link: &VideoLink) -> Result<StreamDescriptor, ResolveError> {
        let video_id = link
            .video_id()
            .ok_or_else(|| ResolveError::bad_link("link has no video identifier"))?;
        let source_url = link.canonical_url();

        let page_url = self.watch_page_url(video_id)?;
        let html = self.http.fetch_page(&page_url).await?;

        match player_response::extract(&html) {
            Embedded::Found(response) => {
                if let Some(status) = response.playability() {
                    debug!(status, "player response playability");
                }
                match response.into_formats() {
                    Some(formats) => {
                        if let Some(format) = select_format(&formats, true) {
                            info!(itag = ?format.itag, "stream resolved from page");
                            return Ok(descriptor(source_url, format, ResolutionTier::Page));
                        }
                        debug!(
                            candidates = formats.len(),
                            "no acceptable page format; falling back to provider"
                        );
                    }
                    None => debug!("player response has no streaming data; falling back to provider"),
                }
            }
            Embedded::Malformed(error) => {
                debug!(error = %error, "player response did not decode; falling back to provider");
            }
            Embedded::Absent => debug!("no player response in page; falling back to provider"),
        }

        self.resolve_with_provider(source_url).await
    }

    async fn resolve_with_provider(
        &self,
        source_url: String,
    ) -> Result<StreamDescriptor, ResolveError> {
        let formats = self.provider.resolve_formats(&source_url).await?;
        let format = select_format(&formats, false).ok_or(ResolveError::NoStreamFound)?;
        let stream_url = self
            .provider
            .materialize_stream_url(&source_url, format)
            .await?;

        info!(itag = ?format.itag, "stream resolved from provider");
        Ok(StreamDescriptor {
            source_url,
            stream_url,
            mime_type: format.mime_type.clone().unwrap_or_default(),
            tier: ResolutionTier::Provider,
        })
    }

    fn watch_page_url(&self, video_id: &str) -> Result<String, ResolveError> {
        let mut url = Url::parse(&format!("{}/watch", self.page_base))
            .map_err(|e| ResolveError::bad_link(format!("invalid watch page base: {e}")))?;
        url.query_pairs_mut().append_pair("v", video_id);
        Ok(url.into())
    }
}

fn descriptor(source_url: String, format: &StreamFormat, tier: ResolutionTier) -> StreamDescriptor {
    StreamDescriptor {
        source_url,
        stream_url: format.url.clone().unwrap_or_default(),
        mime_type: format.mime_type.clone().unwrap_or_default(),
        tier,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    use super::*;
    use crate::provider::ProviderError;
    use crate::test_support::socket_guard::start_mock_server_or_skip;

    fn format(quality: &str, audio: &str, url: Option<&str>) -> StreamFormat {
        StreamFormat {
            itag: None,
            quality: Some(quality.to_string()),
            audio_quality: Some(audio.to_string()),
            mime_type: Some("video/mp4".to_string()),
            url: url.map(str::to_string),
        }
    }

    #[derive(Default)]
    struct FakeProvider {
        formats: Vec<StreamFormat>,
        calls: AtomicUsize,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ExtractionProvider for FakeProvider {
        async fn resolve_formats(&self, link: &str) -> Result<Vec<StreamFormat>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().push(link.to_string());
            Ok(self.formats.clone())
        }

        async fn materialize_stream_url(
            &self,
            _link: &str,
            format: &StreamFormat,
        ) -> Result<String, ProviderError> {
            Ok(format!(
                "https://provider.example/{}",
                format.quality.clone().unwrap_or_default()
            ))
        }
    }

    fn watch_page(player_response: &str) -> String {
        format!("<html><script>var ytInitialPlayerResponse = {player_response};</script></html>")
    }

    #[test]
    fn test_select_format_requires_medium_audio() {
        let formats = vec![
            format("tiny", "AUDIO_QUALITY_LOW", Some("u1")),
            format("medium", "AUDIO_QUALITY_HIGH", Some("u2")),
        ];
        assert!(select_format(&formats, true).is_none());
    }

    #[test]
    fn test_select_format_rejects_unknown_quality_tiers() {
        let formats = vec![format("hd1080", "AUDIO_QUALITY_MEDIUM", Some("u"))];
        assert!(select_format(&formats, true).is_none());
    }

    #[test]
    fn test_select_format_picks_lowest_rank_regardless_of_order() {
        let formats = vec![
            format("hd720", "AUDIO_QUALITY_MEDIUM", Some("hd")),
            format("medium", "AUDIO_QUALITY_MEDIUM", Some("md")),
        ];
        assert_eq!(
            select_format(&formats, true).unwrap().url.as_deref(),
            Some("md")
        );
    }

    #[test]
    fn test_select_format_ties_keep_source_order() {
        let formats = vec![
            format("medium", "AUDIO_QUALITY_MEDIUM", Some("first")),
            format("medium", "AUDIO_QUALITY_MEDIUM", Some("second")),
        ];
        assert_eq!(
            select_format(&formats, true).unwrap().url.as_deref(),
            Some("first")
        );
    }

    #[test]
    fn test_select_format_page_tier_requires_url() {
        let formats = vec![format("tiny", "AUDIO_QUALITY_MEDIUM", None)];
        assert!(select_format(&formats, true).is_none());
        assert!(select_format(&formats, false).is_some());
    }

    #[test]
    fn test_select_format_requires_mime_type() {
        let mut f = format("tiny", "AUDIO_QUALITY_MEDIUM", Some("u"));
        f.mime_type = None;
        assert!(select_format(&[f], false).is_none());
    }

    #[tokio::test]
    async fn test_resolve_uses_page_tier_when_acceptable() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let body = watch_page(
            r#"{"streamingData":{"formats":[
                {"itag":22,"url":"https://media.example/hd","mimeType":"video/mp4","quality":"hd720","audioQuality":"AUDIO_QUALITY_MEDIUM"},
                {"itag":18,"url":"https://media.example/md","mimeType":"video/mp4","quality":"medium","audioQuality":"AUDIO_QUALITY_MEDIUM"}]}}"#,
        );
        Mock::given(method("GET"))
            .and(path("/watch"))
            .and(query_param("v", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;

        let provider = Arc::new(FakeProvider::default());
        let resolver = PlaybackResolver::new(HttpClient::new(), provider.clone())
            .with_page_base(mock_server.uri());
        let link = VideoLink::parse(1, "https://www.youtube.com/watch?v=abc&t=5").unwrap();

        let stream = resolver.resolve(&link).await.unwrap();
        assert_eq!(stream.tier, ResolutionTier::Page);
        assert_eq!(stream.stream_url, "https://media.example/md");
        assert_eq!(stream.source_url, "https://www.youtube.com/watch?v=abc");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolve_falls_back_when_player_response_absent() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/watch"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&mock_server)
            .await;

        let provider = Arc::new(FakeProvider {
            formats: vec![format("tiny", "AUDIO_QUALITY_MEDIUM", None)],
            ..FakeProvider::default()
        });
        let resolver = PlaybackResolver::new(HttpClient::new(), provider.clone())
            .with_page_base(mock_server.uri());
        let link = VideoLink::parse(1, "https://youtu.be/abc?si=x").unwrap();

        let stream = resolver.resolve(&link).await.unwrap();
        assert_eq!(stream.tier, ResolutionTier::Provider);
        assert_eq!(stream.stream_url, "https://provider.example/tiny");
        assert_eq!(
            provider.requested.lock().unwrap().as_slice(),
            ["https://youtu.be/abc"]
        );
    }

    #[tokio::test]
    async fn test_resolve_transport_failure_skips_provider() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/watch"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let provider = Arc::new(FakeProvider::default());
        let resolver = PlaybackResolver::new(HttpClient::new(), provider.clone())
            .with_page_base(mock_server.uri());
        let link = VideoLink::parse(1, "https://youtu.be/abc").unwrap();

        let err = resolver.resolve(&link).await.unwrap_err();
        assert!(
            matches!(err, ResolveError::Transport(ref e) if e.status() == Some(404)),
            "got {err:?}"
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolve_playlist_only_link_is_bad_link() {
        let provider = Arc::new(FakeProvider::default());
        let resolver = PlaybackResolver::new(HttpClient::new(), provider)
            .with_page_base("http://127.0.0.1:9");
        let link = VideoLink::parse(1, "https://www.youtube.com/playlist?list=PL1").unwrap();

        let err = resolver.resolve(&link).await.unwrap_err();
        assert!(matches!(err, ResolveError::BadLink { .. }));
    }
}
