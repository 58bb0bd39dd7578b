//! Constants for the download module (timeouts, request headers).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes between body chunks).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Accept-Language sent with page requests so embedded metadata is stable.
pub(crate) const PAGE_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
