//! Error types for link validation.

use thiserror::Error;

/// Maximum link length to accept (standard browser limit).
pub const MAX_LINK_LENGTH: usize = 2000;

/// A raw link that failed validation.
///
/// Link errors are batch-fatal: when any link in a batch is rejected the
/// pipeline reports every rejected link and does no further work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The link is not an absolute URL.
    #[error("bad link #{position} '{link}': {reason}\n  Suggestion: {suggestion}")]
    Malformed {
        /// 1-based position of the link in the batch.
        position: usize,
        /// The rejected input.
        link: String,
        /// Why parsing failed.
        reason: String,
        /// How to fix the issue.
        suggestion: String,
    },

    /// The link parses but does not point at a supported hosting site.
    #[error("bad link #{position} '{link}': unsupported host\n  Suggestion: {suggestion}")]
    UnsupportedHost {
        /// 1-based position of the link in the batch.
        position: usize,
        /// The rejected input.
        link: String,
        /// How to fix the issue.
        suggestion: String,
    },

    /// The link exceeds [`MAX_LINK_LENGTH`].
    #[error("bad link #{position}: too long ({length} chars, max {MAX_LINK_LENGTH}): {preview}...")]
    TooLong {
        /// 1-based position of the link in the batch.
        position: usize,
        /// Truncated input for display.
        preview: String,
        /// Actual length.
        length: usize,
    },
}

impl LinkError {
    /// Creates a `Malformed` error from a URL parse failure.
    #[must_use]
    pub fn malformed(position: usize, link: &str, reason: &str) -> Self {
        Self::Malformed {
            position,
            link: link.to_string(),
            reason: reason.to_string(),
            suggestion: "Paste the full link including https://".to_string(),
        }
    }

    /// Creates an `UnsupportedHost` error.
    #[must_use]
    pub fn unsupported_host(position: usize, link: &str) -> Self {
        Self::UnsupportedHost {
            position,
            link: link.to_string(),
            suggestion: "Use a https://www.youtube.com/... or https://youtu.be/... link"
                .to_string(),
        }
    }

    /// Creates a `TooLong` error.
    #[must_use]
    pub fn too_long(position: usize, link: &str) -> Self {
        Self::TooLong {
            position,
            preview: link.chars().take(50).collect(),
            length: link.chars().count(),
        }
    }

    /// 1-based position of the offending link in its batch.
    #[must_use]
    pub fn position(&self) -> usize {
        match self {
            Self::Malformed { position, .. }
            | Self::UnsupportedHost { position, .. }
            | Self::TooLong { position, .. } => *position,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_link_error_malformed_display() {
        let error = LinkError::malformed(2, "not a link", "relative URL without a base");
        let msg = error.to_string();
        assert!(msg.contains("#2"), "Expected position in: {msg}");
        assert!(msg.contains("not a link"), "Expected link in: {msg}");
        assert!(msg.contains("relative URL"), "Expected reason in: {msg}");
        assert!(msg.contains("Suggestion"), "Expected suggestion in: {msg}");
    }

    #[test]
    fn test_link_error_unsupported_host_display() {
        let error = LinkError::unsupported_host(1, "https://vimeo.com/123");
        let msg = error.to_string();
        assert!(msg.contains("unsupported host"));
        assert!(msg.contains("https://vimeo.com/123"));
        assert_eq!(error.position(), 1);
    }

    #[test]
    fn test_link_error_too_long_truncates_preview() {
        let long = format!("https://youtu.be/{}", "a".repeat(3000));
        let error = LinkError::too_long(3, &long);
        let msg = error.to_string();
        assert!(msg.len() < 200, "Preview should be truncated: {msg}");
        assert_eq!(error.position(), 3);
    }
}
