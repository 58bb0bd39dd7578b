//! Shared User-Agent strings for page fetches and stream downloads.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/ytdl-rs/ytdl";

/// Browser User-Agent used for watch and playlist page requests.
///
/// Hosting pages serve a reduced document (without the embedded player
/// response) to clients that do not look like a browser.
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Default User-Agent for stream downloads (identifies the tool).
#[must_use]
pub(crate) fn default_download_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("ytdl/{version} (+{PROJECT_UA_URL})")
}
