//! Helpers for pulling JSON objects embedded in hosting pages.
//!
//! Watch and playlist pages assign their data to a script variable
//! (`ytInitialPlayerResponse = {...};`, `ytInitialData = {...};`). The object is
//! located with a marker regex and decoded with a streaming deserializer, which
//! stops at the end of the first complete JSON value regardless of what
//! follows it in the script.

use regex::Regex;
use serde::de::DeserializeOwned;

/// Compiles a regex at static init; panics on invalid pattern.
pub(crate) fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Result of looking for an embedded object.
#[derive(Debug)]
pub(crate) enum Embedded<T> {
    /// The marker was not found in the page.
    Absent,
    /// The marker was found but the object did not decode.
    Malformed(serde_json::Error),
    /// The object decoded into `T`.
    Found(T),
}

/// Finds the object assigned after `marker` and decodes it as `T`.
///
/// `marker` must match up to (but not including) the opening `{`; any
/// whitespace between the match and the brace is skipped.
pub(crate) fn extract_embedded<T: DeserializeOwned>(html: &str, marker: &Regex) -> Embedded<T> {
    let Some(found) = marker.find(html) else {
        return Embedded::Absent;
    };
    let rest = html[found.end()..].trim_start();
    if !rest.starts_with('{') {
        return Embedded::Absent;
    }

    let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<T>();
    match stream.next() {
        Some(Ok(value)) => Embedded::Found(value),
        Some(Err(e)) => Embedded::Malformed(e),
        None => Embedded::Absent,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::LazyLock;

    use serde::Deserialize;

    use super::*;

    static MARKER: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"pageData\s*="));

    #[derive(Debug, Deserialize)]
    struct Sample {
        name: String,
    }

    #[test]
    fn test_extract_embedded_found_ignores_trailing_script() {
        let html = r#"<script>var pageData = {"name":"a};b"};var other = {};</script>"#;
        match extract_embedded::<Sample>(html, &MARKER) {
            Embedded::Found(sample) => assert_eq!(sample.name, "a};b"),
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_embedded_absent_without_marker() {
        let html = "<html><body>nothing here</body></html>";
        assert!(matches!(
            extract_embedded::<Sample>(html, &MARKER),
            Embedded::Absent
        ));
    }

    #[test]
    fn test_extract_embedded_absent_when_not_an_object() {
        let html = "<script>var pageData = null;</script>";
        assert!(matches!(
            extract_embedded::<Sample>(html, &MARKER),
            Embedded::Absent
        ));
    }

    #[test]
    fn test_extract_embedded_malformed_json() {
        let html = r#"<script>var pageData = {"name": ;</script>"#;
        assert!(matches!(
            extract_embedded::<Sample>(html, &MARKER),
            Embedded::Malformed(_)
        ));
    }
}
