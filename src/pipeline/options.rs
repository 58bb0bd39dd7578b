//! Run options for the pipeline.

use std::path::{Path, PathBuf};

use super::error::PipelineConfigError;
use crate::filename::TargetOs;

/// Minimum allowed concurrency value.
pub(crate) const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub(crate) const MAX_CONCURRENCY: usize = 100;

/// Default per-round concurrency cap.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Validated pipeline options.
///
/// # Example
///
/// ```
/// use ytdl_core::{PipelineOptions, TargetOs};
///
/// let options = PipelineOptions::new("./music")
///     .with_concurrency(4)
///     .unwrap()
///     .with_include_author(true)
///     .with_target_os(TargetOs::Windows);
/// assert_eq!(options.concurrency(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    output_dir: PathBuf,
    concurrency: usize,
    video_only: bool,
    include_author: bool,
    target_os: TargetOs,
}

impl PipelineOptions {
    /// Options writing to `output_dir` with defaults for everything else.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            concurrency: DEFAULT_CONCURRENCY,
            video_only: false,
            include_author: false,
            target_os: TargetOs::current(),
        }
    }

    /// Sets the per-round concurrency cap.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineConfigError::InvalidConcurrency`] outside `1..=100`.
    pub fn with_concurrency(mut self, concurrency: usize) -> Result<Self, PipelineConfigError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(PipelineConfigError::InvalidConcurrency { value: concurrency });
        }
        self.concurrency = concurrency;
        Ok(self)
    }

    /// Skips playlist expansion; links with both a video and a playlist
    /// identifier are treated as the single video.
    #[must_use]
    pub fn with_video_only(mut self, video_only: bool) -> Self {
        self.video_only = video_only;
        self
    }

    /// Appends the uploader name to output filenames.
    #[must_use]
    pub fn with_include_author(mut self, include_author: bool) -> Self {
        self.include_author = include_author;
        self
    }

    /// Filesystem rule set used for output names.
    #[must_use]
    pub fn with_target_os(mut self, target_os: TargetOs) -> Self {
        self.target_os = target_os;
        self
    }

    /// Output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Per-round concurrency cap.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Whether playlist expansion is skipped.
    #[must_use]
    pub fn video_only(&self) -> bool {
        self.video_only
    }

    /// Whether output names carry the uploader.
    #[must_use]
    pub fn include_author(&self) -> bool {
        self.include_author
    }

    /// Filesystem rule set for output names.
    #[must_use]
    pub fn target_os(&self) -> TargetOs {
        self.target_os
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_options_defaults() {
        let options = PipelineOptions::new("/out");
        assert_eq!(options.output_dir(), Path::new("/out"));
        assert_eq!(options.concurrency(), DEFAULT_CONCURRENCY);
        assert!(!options.video_only());
        assert!(!options.include_author());
        assert_eq!(options.target_os(), TargetOs::current());
    }

    #[test]
    fn test_pipeline_options_concurrency_bounds() {
        assert!(PipelineOptions::new("/out").with_concurrency(1).is_ok());
        assert!(PipelineOptions::new("/out").with_concurrency(100).is_ok());
        assert_eq!(
            PipelineOptions::new("/out").with_concurrency(0).unwrap_err(),
            PipelineConfigError::InvalidConcurrency { value: 0 }
        );
        assert!(PipelineOptions::new("/out").with_concurrency(101).is_err());
    }
}
