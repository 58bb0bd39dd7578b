//! One-level playlist expansion.
//!
//! A playlist link is expanded into its entries by fetching the playlist page
//! and walking the embedded `ytInitialData` object. Expansion never recurses:
//! entries are always single videos.

use std::path::PathBuf;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

use crate::download::{DownloadError, HttpClient};
use crate::page::{Embedded, compile_static_regex, extract_embedded};
use crate::resolver::DEFAULT_PAGE_BASE;

static INITIAL_DATA_MARKER: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"ytInitialData\s*="));

static OG_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"<meta\s+property="og:title"\s+content="([^"]*)""#)
});

/// Errors that can occur while expanding a playlist.
#[derive(Debug, Error)]
pub enum PlaylistError {
    /// The playlist page could not be fetched.
    #[error("playlist page fetch failed: {0}")]
    Fetch(#[from] DownloadError),

    /// The page carries no playlist data object.
    #[error("playlist page has no embedded playlist data")]
    MissingData,

    /// The playlist data object did not decode.
    #[error("playlist data did not decode: {0}")]
    Decode(#[source] serde_json::Error),

    /// The playlist has no playable entries.
    #[error("playlist {playlist_id} has no entries")]
    Empty {
        /// The playlist identifier.
        playlist_id: String,
    },

    /// The playlist identifier produced an invalid page URL.
    #[error("invalid playlist identifier '{playlist_id}'")]
    InvalidId {
        /// The playlist identifier.
        playlist_id: String,
    },

    /// The per-playlist output folder could not be created.
    #[error("failed to create playlist folder {path}: {source}")]
    Folder {
        /// Folder path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Entries and naming information for one playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistListing {
    /// Playlist title.
    pub title: String,
    /// Playlist owner, when the page names one.
    pub author: Option<String>,
    /// Entry video identifiers in playlist order, without duplicates.
    pub video_ids: Vec<String>,
}

impl PlaylistListing {
    /// Unsanitized output folder name: `"<title>"`, or `"<title> - <author>"`
    /// when `include_author` is set and the owner is known.
    #[must_use]
    pub fn folder_name(&self, include_author: bool) -> String {
        match self.author.as_deref() {
            Some(author) if include_author && !author.is_empty() => {
                format!("{} - {author}", self.title)
            }
            _ => self.title.clone(),
        }
    }
}

/// Playlist expansion capability.
#[async_trait]
pub trait PlaylistSource: Send + Sync {
    /// Lists the entries of `playlist_id`.
    async fn expand(&self, playlist_id: &str) -> Result<PlaylistListing, PlaylistError>;
}

/// Expands playlists by scraping the playlist page.
#[derive(Debug, Clone)]
pub struct PagePlaylistSource {
    http: HttpClient,
    base: String,
}

impl PagePlaylistSource {
    /// Creates a source reading pages from [`DEFAULT_PAGE_BASE`].
    #[must_use]
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base: DEFAULT_PAGE_BASE.to_string(),
        }
    }

    /// Overrides the page origin (for testing with wiremock).
    #[must_use]
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn playlist_url(&self, playlist_id: &str) -> Result<String, PlaylistError> {
        let mut url = Url::parse(&format!("{}/playlist", self.base)).map_err(|_| {
            PlaylistError::InvalidId {
                playlist_id: playlist_id.to_string(),
            }
        })?;
        url.query_pairs_mut().append_pair("list", playlist_id);
        Ok(url.into())
    }
}

#[async_trait]
impl PlaylistSource for PagePlaylistSource {
    #[instrument(skip(self))]
    async fn expand(&self, playlist_id: &str) -> Result<PlaylistListing, PlaylistError> {
        let url = self.playlist_url(playlist_id)?;
        let html = self.http.fetch_page(&url).await?;
        let listing = parse_playlist_page(&html, playlist_id)?;
        info!(
            title = %listing.title,
            entries = listing.video_ids.len(),
            "playlist expanded"
        );
        Ok(listing)
    }
}

#[derive(Debug, Default)]
struct PageScan {
    video_ids: Vec<String>,
    title: Option<String>,
    author: Option<String>,
}

/// Extracts a [`PlaylistListing`] from playlist page HTML.
///
/// # Errors
///
/// Returns [`PlaylistError`] when the page has no data object, the object
/// does not decode, or it lists no entries.
pub fn parse_playlist_page(html: &str, playlist_id: &str) -> Result<PlaylistListing, PlaylistError> {
    let data: Value = match extract_embedded(html, &INITIAL_DATA_MARKER) {
        Embedded::Found(value) => value,
        Embedded::Malformed(e) => return Err(PlaylistError::Decode(e)),
        Embedded::Absent => return Err(PlaylistError::MissingData),
    };

    let mut scan = PageScan::default();
    walk(&data, &mut scan);
    debug!(entries = scan.video_ids.len(), "playlist data scanned");

    if scan.video_ids.is_empty() {
        return Err(PlaylistError::Empty {
            playlist_id: playlist_id.to_string(),
        });
    }

    let title = scan
        .title
        .or_else(|| og_title(html))
        .unwrap_or_else(|| playlist_id.to_string());

    Ok(PlaylistListing {
        title,
        author: scan.author,
        video_ids: scan.video_ids,
    })
}

fn walk(value: &Value, scan: &mut PageScan) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match key.as_str() {
                    "playlistVideoRenderer" => {
                        if let Some(id) = child.get("videoId").and_then(Value::as_str)
                            && !id.is_empty()
                            && !scan.video_ids.iter().any(|known| known == id)
                        {
                            scan.video_ids.push(id.to_string());
                        }
                    }
                    "playlistMetadataRenderer" if scan.title.is_none() => {
                        scan.title = non_empty(child.get("title").and_then(Value::as_str));
                    }
                    "videoOwnerRenderer" if scan.author.is_none() => {
                        scan.author = non_empty(
                            child
                                .pointer("/title/runs/0/text")
                                .and_then(Value::as_str),
                        );
                    }
                    _ => {}
                }
                walk(child, scan);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, scan);
            }
        }
        _ => {}
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn og_title(html: &str) -> Option<String> {
    let caps = OG_TITLE.captures(html)?;
    non_empty(caps.get(1).map(|m| m.as_str())).map(|t| html_decode(&t))
}

fn html_decode(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
