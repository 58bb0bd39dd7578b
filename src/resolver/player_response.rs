//! Layered decode of the player response embedded in watch pages.
//!
//! Only the fields used for stream selection are modelled; every level is
//! optional so a missing field is an ordinary `None`, never a decode failure.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::page::{Embedded, compile_static_regex, extract_embedded};
use crate::provider::StreamFormat;

static PLAYER_RESPONSE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"ytInitialPlayerResponse\s*="));

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PlayerResponse {
    #[serde(default)]
    playability_status: Option<PlayabilityStatus>,
    #[serde(default)]
    streaming_data: Option<StreamingData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayabilityStatus {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamingData {
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFormat {
    #[serde(default)]
    itag: Option<u64>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    quality: Option<String>,
    #[serde(default)]
    audio_quality: Option<String>,
}

impl From<RawFormat> for StreamFormat {
    fn from(raw: RawFormat) -> Self {
        Self {
            itag: raw.itag,
            quality: raw.quality,
            audio_quality: raw.audio_quality,
            mime_type: raw.mime_type,
            url: raw.url,
        }
    }
}

impl PlayerResponse {
    /// Muxed formats in page order, or `None` when the response carries no
    /// streaming data at all.
    pub(super) fn into_formats(self) -> Option<Vec<StreamFormat>> {
        self.streaming_data
            .map(|data| data.formats.into_iter().map(StreamFormat::from).collect())
    }

    /// Playability status string (`OK`, `LOGIN_REQUIRED`, ...), when present.
    pub(super) fn playability(&self) -> Option<&str> {
        self.playability_status
            .as_ref()
            .and_then(|p| p.status.as_deref())
    }
}

/// Locates and decodes the player response in a watch page.
pub(super) fn extract(html: &str) -> Embedded<PlayerResponse> {
    extract_embedded(html, &PLAYER_RESPONSE_MARKER)
}
