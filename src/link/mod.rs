//! Link validation and classification.
//!
//! A batch of raw link strings is validated up front. A link is accepted when
//! it parses as an absolute URL on one of the two supported hosting prefixes:
//!
//! - long form: `https://www.youtube.com/...` (`/watch?v=<id>`, `/playlist?list=<id>`)
//! - short form: `https://youtu.be/<id>`
//!
//! Query arguments other than the identifiers are ignored here.

mod error;

use std::fmt;

use tracing::debug;
use url::Url;

pub use error::{LinkError, MAX_LINK_LENGTH};

/// Scheme used by both hosting prefixes.
const SCHEME: &str = "https";
/// Host of long-form links.
pub const LONG_HOST: &str = "www.youtube.com";
/// Host of short-form links.
pub const SHORT_HOST: &str = "youtu.be";

/// Which hosting prefix a link uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkForm {
    /// `https://www.youtube.com/...`
    Long,
    /// `https://youtu.be/<id>`
    Short,
}

/// A validated link on a supported hosting site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoLink {
    raw: String,
    url: Url,
    form: LinkForm,
    video_id: Option<String>,
    playlist_id: Option<String>,
}

impl VideoLink {
    /// Validates a single raw link.
    ///
    /// `position` is the 1-based batch position used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError`] when the link is too long, not an absolute URL,
    /// or not on a supported hosting prefix.
    pub fn parse(position: usize, raw: &str) -> Result<Self, LinkError> {
        let trimmed = raw.trim();
        if trimmed.chars().count() > MAX_LINK_LENGTH {
            return Err(LinkError::too_long(position, trimmed));
        }

        let url = Url::parse(trimmed)
            .map_err(|e| LinkError::malformed(position, trimmed, &e.to_string()))?;

        let form = match (url.scheme(), url.host_str()) {
            (SCHEME, Some(LONG_HOST)) => LinkForm::Long,
            (SCHEME, Some(SHORT_HOST)) => LinkForm::Short,
            _ => return Err(LinkError::unsupported_host(position, trimmed)),
        };

        let query_value = |key: &str| {
            url.query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
                .filter(|v| !v.is_empty())
        };

        let video_id = match form {
            LinkForm::Long => query_value("v"),
            LinkForm::Short => url
                .path_segments()
                .and_then(|mut segments| segments.next())
                .filter(|segment| !segment.is_empty())
                .map(str::to_string),
        };
        let playlist_id = query_value("list");

        Ok(Self {
            raw: trimmed.to_string(),
            url,
            form,
            video_id,
            playlist_id,
        })
    }

    /// Builds the canonical long-form link for a known video identifier.
    ///
    /// Used for playlist entries, which are discovered as bare identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError`] if the identifier produces an unparseable URL.
    pub fn from_video_id(video_id: &str) -> Result<Self, LinkError> {
        let mut url = Url::parse(&format!("{SCHEME}://{LONG_HOST}/watch"))
            .map_err(|e| LinkError::malformed(0, video_id, &e.to_string()))?;
        url.query_pairs_mut().append_pair("v", video_id);
        Self::parse(0, url.as_str())
    }

    /// The link as supplied (whitespace trimmed).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Hosting prefix of the link.
    #[must_use]
    pub fn form(&self) -> LinkForm {
        self.form
    }

    /// Video identifier: the `v` query value (long form) or the first path
    /// segment (short form).
    #[must_use]
    pub fn video_id(&self) -> Option<&str> {
        self.video_id.as_deref()
    }

    /// Playlist identifier from the `list` query value.
    #[must_use]
    pub fn playlist_id(&self) -> Option<&str> {
        self.playlist_id.as_deref()
    }

    /// Whether the link refers to a playlist.
    #[must_use]
    pub fn is_playlist(&self) -> bool {
        self.playlist_id.is_some()
    }

    /// Source URL with every query parameter except `v` removed.
    #[must_use]
    pub fn canonical_url(&self) -> String {
        let mut url = self.url.clone();
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k == "v")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        url.set_fragment(None);
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
        url.into()
    }
}

impl fmt::Display for VideoLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Validates a whole batch of raw links.
///
/// Returns every link in input order when all are valid. When any link is
/// rejected, returns **all** rejections (not just the first) in input order.
///
/// # Errors
///
/// Returns the full list of [`LinkError`]s when one or more links are invalid.
///
/// # Examples
///
/// ```
/// use ytdl_core::validate_links;
///
/// let links = validate_links(&["https://youtu.be/abc", "https://www.youtube.com/watch?v=xyz"])
///     .unwrap();
/// assert_eq!(links[0].video_id(), Some("abc"));
///
/// let errors = validate_links(&["https://youtu.be/abc", "ftp://nope", "also bad"]).unwrap_err();
/// assert_eq!(errors.len(), 2);
/// ```
#[tracing::instrument(skip(links), fields(count = links.len()))]
pub fn validate_links<S: AsRef<str>>(links: &[S]) -> Result<Vec<VideoLink>, Vec<LinkError>> {
    let mut valid = Vec::with_capacity(links.len());
    let mut errors = Vec::new();

    for (idx, raw) in links.iter().enumerate() {
        match VideoLink::parse(idx + 1, raw.as_ref()) {
            Ok(link) => valid.push(link),
            Err(e) => {
                debug!(position = idx + 1, error = %e, "link rejected");
                errors.push(e);
            }
        }
    }

    if errors.is_empty() {
        Ok(valid)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_long_form_watch_link() {
        let link = VideoLink::parse(1, "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s").unwrap();
        assert_eq!(link.form(), LinkForm::Long);
        assert_eq!(link.video_id(), Some("dQw4w9WgXcQ"));
        assert_eq!(link.playlist_id(), None);
        assert!(!link.is_playlist());
    }

    #[test]
    fn test_parse_short_form_link() {
        let link = VideoLink::parse(1, "https://youtu.be/dQw4w9WgXcQ?si=tracking").unwrap();
        assert_eq!(link.form(), LinkForm::Short);
        assert_eq!(link.video_id(), Some("dQw4w9WgXcQ"));
    }

    #[test]
    fn test_parse_playlist_link() {
        let link = VideoLink::parse(1, "https://www.youtube.com/playlist?list=PL123").unwrap();
        assert_eq!(link.video_id(), None);
        assert_eq!(link.playlist_id(), Some("PL123"));
        assert!(link.is_playlist());
    }

    #[test]
    fn test_parse_watch_link_inside_playlist() {
        let link =
            VideoLink::parse(1, "https://www.youtube.com/watch?v=abc&list=PL9&index=3").unwrap();
        assert_eq!(link.video_id(), Some("abc"));
        assert_eq!(link.playlist_id(), Some("PL9"));
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let link = VideoLink::parse(1, "  https://youtu.be/abc \n").unwrap();
        assert_eq!(link.as_str(), "https://youtu.be/abc");
    }

    #[test]
    fn test_parse_rejects_relative_and_garbage() {
        for raw in ["", "youtube.com/watch?v=abc", "watch?v=abc", "not a url"] {
            let err = VideoLink::parse(4, raw).unwrap_err();
            assert!(matches!(err, LinkError::Malformed { position: 4, .. }), "{raw:?}");
        }
    }

    #[test]
    fn test_parse_rejects_other_hosts_and_schemes() {
        for raw in [
            "http://www.youtube.com/watch?v=abc",
            "https://youtube.com/watch?v=abc",
            "https://m.youtube.com/watch?v=abc",
            "https://vimeo.com/123",
            "ftp://youtu.be/abc",
        ] {
            let err = VideoLink::parse(1, raw).unwrap_err();
            assert!(matches!(err, LinkError::UnsupportedHost { .. }), "{raw:?}");
        }
    }

    #[test]
    fn test_parse_rejects_overlong_link() {
        let raw = format!("https://youtu.be/{}", "a".repeat(MAX_LINK_LENGTH));
        let err = VideoLink::parse(1, &raw).unwrap_err();
        assert!(matches!(err, LinkError::TooLong { .. }));
    }

    #[test]
    fn test_canonical_url_keeps_only_video_id() {
        let link = VideoLink::parse(
            1,
            "https://www.youtube.com/watch?feature=share&v=abc&list=PL1&t=10#frag",
        )
        .unwrap();
        assert_eq!(link.canonical_url(), "https://www.youtube.com/watch?v=abc");
    }

    #[test]
    fn test_canonical_url_short_form_drops_query() {
        let link = VideoLink::parse(1, "https://youtu.be/abc?si=xyz&t=3").unwrap();
        assert_eq!(link.canonical_url(), "https://youtu.be/abc");
    }

    #[test]
    fn test_from_video_id_builds_long_form() {
        let link = VideoLink::from_video_id("xyz_-1").unwrap();
        assert_eq!(link.form(), LinkForm::Long);
        assert_eq!(link.video_id(), Some("xyz_-1"));
        assert_eq!(link.canonical_url(), "https://www.youtube.com/watch?v=xyz_-1");
    }

    #[test]
    fn test_validate_links_all_valid_preserves_order() {
        let links = validate_links(&[
            "https://youtu.be/one",
            "https://www.youtube.com/watch?v=two",
            "https://youtu.be/three",
        ])
        .unwrap();
        let ids: Vec<_> = links.iter().map(|l| l.video_id().unwrap()).collect();
        assert_eq!(ids, ["one", "two", "three"]);
    }

    #[test]
    fn test_validate_links_reports_exactly_the_bad_link() {
        let errors = validate_links(&[
            "https://youtu.be/one",
            "htp:/broken",
            "https://youtu.be/three",
        ])
        .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].position(), 2);
    }

    #[test]
    fn test_validate_links_reports_all_bad_links() {
        let errors = validate_links(&[
            "garbage",
            "https://youtu.be/ok",
            "https://example.com/x",
            "",
        ])
        .unwrap_err();
        let positions: Vec<_> = errors.iter().map(LinkError::position).collect();
        assert_eq!(positions, [1, 3, 4]);
    }

    #[test]
    fn test_validate_links_empty_batch_is_ok() {
        let links = validate_links::<&str>(&[]).unwrap();
        assert!(links.is_empty());
    }
}
