//! Audio conversion capability.
//!
//! The pipeline hands every downloaded scratch file to an [`AudioConverter`]
//! exactly once. [`FfmpegConverter`] runs the external `ffmpeg` binary.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Extension (with dot) of converted output files.
pub const OUTPUT_EXTENSION: &str = ".mp3";

/// Number of trailing stderr lines kept in conversion errors.
const STDERR_TAIL_LINES: usize = 5;

/// Errors that can occur while converting a downloaded file.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The converter process could not be started.
    #[error("failed to execute {binary}: {source}")]
    Spawn {
        /// Converter binary.
        binary: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The converter ran but reported failure.
    #[error("conversion exited with {status}: {stderr}")]
    Failed {
        /// Exit status description.
        status: String,
        /// Last lines of the converter's stderr.
        stderr: String,
    },

    /// The converter reported success but produced no output file.
    #[error("conversion produced no output at {path}")]
    MissingOutput {
        /// Expected output path.
        path: PathBuf,
    },
}

/// Converts a downloaded media file into the output format.
#[async_trait]
pub trait AudioConverter: Send + Sync {
    /// Converts `input` into a new file at `output`.
    ///
    /// `input` is owned by the caller and must not be removed.
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError>;
}

/// Converter using the external `ffmpeg` binary.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use ytdl_core::{AudioConverter, FfmpegConverter};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let converter = FfmpegConverter::from_path().ok_or("ffmpeg not found in PATH")?;
/// converter
///     .convert(Path::new("/tmp/ytdl_abc"), Path::new("song.mp3"))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FfmpegConverter {
    binary_path: PathBuf,
}

impl FfmpegConverter {
    /// Creates a converter with an explicit binary path.
    #[must_use]
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Looks up `ffmpeg` in `PATH`.
    #[must_use]
    pub fn from_path() -> Option<Self> {
        which::which("ffmpeg").ok().map(Self::new)
    }

    /// Binary this converter executes.
    #[must_use]
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }
}

#[async_trait]
impl AudioConverter for FfmpegConverter {
    #[instrument(skip(self), fields(binary = %self.binary_path.display()))]
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let result = Command::new(&self.binary_path)
            .args(["-y", "-hide_banner", "-loglevel", "error", "-i"])
            .arg(input)
            .args(["-vn", "-codec:a", "libmp3lame", "-q:a", "2"])
            .arg(output)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ConvertError::Spawn {
                binary: self.binary_path.clone(),
                source,
            })?;

        if !result.status.success() {
            return Err(ConvertError::Failed {
                status: result.status.to_string(),
                stderr: stderr_tail(&result.stderr),
            });
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(ConvertError::MissingOutput {
                path: output.to_path_buf(),
            });
        }

        debug!("conversion complete");
        Ok(())
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    if lines.is_empty() {
        "no diagnostic output".to_string()
    } else {
        lines[start..].join(" | ")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_consistent_with_which() {
        assert_eq!(
            which::which("ffmpeg").is_ok(),
            FfmpegConverter::from_path().is_some()
        );
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let stderr = b"l1\nl2\n\nl3\nl4\nl5\nl6\n";
        assert_eq!(stderr_tail(stderr), "l2 | l3 | l4 | l5 | l6");
    }

    #[test]
    fn test_stderr_tail_empty() {
        assert_eq!(stderr_tail(b"  \n"), "no diagnostic output");
    }

    #[tokio::test]
    async fn test_convert_with_missing_binary_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let converter = FfmpegConverter::new(dir.path().join("no-such-ffmpeg"));
        let err = converter
            .convert(&dir.path().join("in"), &dir.path().join("out.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::Spawn { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_convert_nonzero_exit_is_failed_with_stderr() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-ffmpeg");
        std::fs::write(&script, "#!/bin/sh\necho 'Invalid data found' >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let converter = FfmpegConverter::new(script);
        let err = converter
            .convert(&dir.path().join("in"), &dir.path().join("out.mp3"))
            .await
            .unwrap_err();
        match err {
            ConvertError::Failed { stderr, .. } => assert!(stderr.contains("Invalid data found")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_convert_success_without_output_is_missing_output() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-ffmpeg");
        std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let converter = FfmpegConverter::new(script);
        let err = converter
            .convert(&dir.path().join("in"), &dir.path().join("out.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::MissingOutput { .. }));
    }
}
