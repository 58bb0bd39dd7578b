//! Batch pipeline orchestrator.
//!
//! A run validates the whole batch up front (any bad link aborts the run with
//! every rejection listed), then drives the surviving items through
//! synchronized rounds:
//!
//! expand (playlists) → resolve → metadata → download → convert → cleanup
//!
//! Each round spawns one task per surviving item, capped by
//! [`PipelineOptions::concurrency`], and waits for every task before the next
//! round starts. A failing item leaves the surviving set; its error is kept in
//! the [`BatchOutcome`] and never affects siblings.
//!
//! Scratch files are owned by the run. They are removed after the convert
//! round whatever the outcome, and removal failures are reported without
//! hiding the item's earlier error.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ytdl_core::{
//!     FfmpegConverter, HttpClient, PagePlaylistSource, Pipeline, PipelineOptions,
//!     PlaybackResolver, RustyYtdlProvider,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let http = HttpClient::new();
//! let provider = Arc::new(RustyYtdlProvider::new());
//! let pipeline = Pipeline::new(
//!     PipelineOptions::new("./music"),
//!     http.clone(),
//!     PlaybackResolver::new(http.clone(), provider.clone()),
//!     provider,
//!     Arc::new(PagePlaylistSource::new(http)),
//!     Arc::new(FfmpegConverter::from_path().ok_or("ffmpeg not found")?),
//! );
//! let outcome = pipeline.run(&["https://youtu.be/dQw4w9WgXcQ"]).await?;
//! for error in &outcome.errors {
//!     eprintln!("{error}");
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod options;
mod report;
mod round;

pub use error::{BatchError, ErrorKind, ItemError, PipelineConfigError, Stage};
pub use options::{DEFAULT_CONCURRENCY, PipelineOptions};
pub use report::{NoopReporter, PipelineReporter, TracingReporter};
pub use round::StageResult;

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempPath;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::convert::{AudioConverter, OUTPUT_EXTENSION};
use crate::download::{DownloadError, HttpClient};
use crate::filename::{TargetOs, sanitize_filename, sanitize_path};
use crate::link::{VideoLink, validate_links};
use crate::playlist::{PlaylistError, PlaylistSource};
use crate::provider::{MetadataError, MetadataSource};
use crate::resolver::{PlaybackResolver, StreamDescriptor};
use round::{RoundRunner, Tagged};

/// Prefix of scratch file names.
pub const SCRATCH_PREFIX: &str = "ytdl_";

/// Upper bound on `_N` suffixes tried when claiming an output name.
const MAX_NAME_ATTEMPTS: usize = 1000;

/// Result of a batch run.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Item errors in completion order, cleanup errors last.
    pub errors: Vec<ItemError>,
    /// Items that completed every stage.
    pub completed: usize,
    /// Items in the batch after playlist expansion.
    pub total: usize,
    /// Written output files.
    pub outputs: Vec<PathBuf>,
}

impl BatchOutcome {
    /// Every item completed every stage and nothing failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.completed == self.total
    }
}

/// A link waiting for resolution, with the directory its output goes to.
#[derive(Debug, Clone)]
struct WorkItem {
    link: VideoLink,
    output_dir: PathBuf,
}

impl Tagged for WorkItem {
    fn link(&self) -> &str {
        self.link.as_str()
    }
}

impl Tagged for VideoLink {
    fn link(&self) -> &str {
        self.as_str()
    }
}

/// The unit of work threaded through the stages after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVideo {
    /// Originating link, used to tag errors.
    pub link: String,
    /// Canonical page URL.
    pub source_url: String,
    /// Direct, time-limited media URL.
    pub stream_url: String,
    /// Container/codec string reported by the source.
    pub mime_type: String,
    /// Title; empty until the metadata round succeeds.
    pub title: String,
    /// Uploader, when known.
    pub author: Option<String>,
    /// Directory the output file goes to.
    pub output_dir: PathBuf,
    /// Scratch file holding the download; set once the download round runs.
    pub temp_file: Option<PathBuf>,
    /// Claimed output file.
    pub output_path: Option<PathBuf>,
}

impl ResolvedVideo {
    fn new(item: WorkItem, stream: StreamDescriptor) -> Self {
        Self {
            link: item.link.as_str().to_string(),
            source_url: stream.source_url,
            stream_url: stream.stream_url,
            mime_type: stream.mime_type,
            title: String::new(),
            author: None,
            output_dir: item.output_dir,
            temp_file: None,
            output_path: None,
        }
    }

    /// Output file name before sanitizing: `"<title>[ - <author>].mp3"`.
    fn output_name(&self, include_author: bool) -> String {
        match self.author.as_deref() {
            Some(author) if include_author && !author.is_empty() => {
                format!("{} - {author}{OUTPUT_EXTENSION}", self.title)
            }
            _ => format!("{}{OUTPUT_EXTENSION}", self.title),
        }
    }
}

impl Tagged for ResolvedVideo {
    fn link(&self) -> &str {
        &self.link
    }
}

/// Scratch files created by one run, removed when the run finishes.
///
/// Dropping the set (for example when the run future is cancelled) still
/// removes every file.
#[derive(Default)]
struct ScratchFiles {
    files: Vec<(String, TempPath)>,
}

impl ScratchFiles {
    fn allocate(&mut self, dir: &Path, link: &str) -> Result<PathBuf, DownloadError> {
        let temp = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempfile_in(dir)
            .map_err(|e| DownloadError::io(dir, e))?
            .into_temp_path();
        let path = temp.to_path_buf();
        self.files.push((link.to_string(), temp));
        Ok(path)
    }

    /// Removes every file, returning one error per failed removal.
    fn remove_all(self) -> (usize, Vec<ItemError>) {
        let mut removed = 0;
        let mut errors = Vec::new();
        for (link, temp) in self.files {
            let path = temp.to_path_buf();
            match temp.close() {
                Ok(()) => removed += 1,
                Err(source) => errors.push(ItemError::Cleanup { link, path, source }),
            }
        }
        (removed, errors)
    }
}

/// Batch orchestrator.
pub struct Pipeline {
    options: PipelineOptions,
    http: HttpClient,
    resolver: Arc<PlaybackResolver>,
    metadata: Arc<dyn MetadataSource>,
    playlists: Arc<dyn PlaylistSource>,
    converter: Arc<dyn AudioConverter>,
    reporter: Arc<dyn PipelineReporter>,
    semaphore: Arc<Semaphore>,
    scratch_dir: PathBuf,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("options", &self.options)
            .field("resolver", &self.resolver)
            .field("scratch_dir", &self.scratch_dir)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a pipeline reporting through [`TracingReporter`] and keeping
    /// scratch files in the system temp directory.
    #[must_use]
    pub fn new(
        options: PipelineOptions,
        http: HttpClient,
        resolver: PlaybackResolver,
        metadata: Arc<dyn MetadataSource>,
        playlists: Arc<dyn PlaylistSource>,
        converter: Arc<dyn AudioConverter>,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(options.concurrency()));
        Self {
            options,
            http,
            resolver: Arc::new(resolver),
            metadata,
            playlists,
            converter,
            reporter: Arc::new(TracingReporter),
            semaphore,
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// Replaces the reporter.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn PipelineReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Keeps scratch files in `dir` instead of the system temp directory.
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// Run options.
    #[must_use]
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    fn rounds(&self) -> RoundRunner<'_> {
        RoundRunner {
            semaphore: &self.semaphore,
            reporter: &self.reporter,
        }
    }

    /// Processes a batch of raw links.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::InvalidLinks`] (listing every bad link) before
    /// doing any work when validation fails, and [`BatchError::OutputDir`] when
    /// the output directory cannot be created. Per-item failures are reported
    /// in [`BatchOutcome::errors`] instead.
    #[instrument(skip(self, links), fields(links = links.len()))]
    pub async fn run<S: AsRef<str>>(&self, links: &[S]) -> Result<BatchOutcome, BatchError> {
        let links = validate_links(links).map_err(BatchError::InvalidLinks)?;

        let output_dir = self.options.output_dir().to_path_buf();
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|source| BatchError::OutputDir {
                path: output_dir.clone(),
                source,
            })?;

        let mut errors = Vec::new();
        let items = self.expand_round(links, &mut errors).await;
        let total = items.len() + errors.len();
        info!(items = total, "batch expanded");

        let resolved = self.resolve_round(items, &mut errors).await;
        let titled = self.metadata_round(resolved, &mut errors).await;

        let mut scratch = ScratchFiles::default();
        let ready = self.allocate_scratch(titled, &mut scratch, &mut errors);
        let downloaded = self.download_round(ready, &mut errors).await;

        let claimed = self.claim_output_paths(downloaded).await;
        let converted = self.convert_round(claimed, &mut errors).await;

        let (removed, cleanup_errors) = scratch.remove_all();
        for error in &cleanup_errors {
            self.reporter.item_failed(error);
        }
        self.reporter.cleanup_finished(removed, cleanup_errors.len());
        errors.extend(cleanup_errors);

        let outputs: Vec<PathBuf> = converted
            .into_iter()
            .filter_map(|video| video.output_path)
            .collect();

        info!(
            completed = outputs.len(),
            failed = errors.len(),
            total,
            "batch complete"
        );

        Ok(BatchOutcome {
            completed: outputs.len(),
            errors,
            total,
            outputs,
        })
    }

    /// Expands playlist links into their entries (one level).
    async fn expand_round(
        &self,
        links: Vec<VideoLink>,
        errors: &mut Vec<ItemError>,
    ) -> Vec<WorkItem> {
        let output_dir = self.options.output_dir().to_path_buf();
        let single = |link: VideoLink| WorkItem {
            link,
            output_dir: output_dir.clone(),
        };

        if self.options.video_only() {
            return links.into_iter().map(single).collect();
        }

        let (playlist_links, video_links): (Vec<_>, Vec<_>) =
            links.into_iter().partition(VideoLink::is_playlist);
        let mut items: Vec<WorkItem> = video_links.into_iter().map(single).collect();

        let playlists = Arc::clone(&self.playlists);
        let target_os = self.options.target_os();
        let include_author = self.options.include_author();
        let expanded = self
            .rounds()
            .run(Stage::Expand, playlist_links, errors, |link: VideoLink| {
                let playlists = Arc::clone(&playlists);
                let output_dir = output_dir.clone();
                async move {
                    let naming = FolderNaming {
                        target_os,
                        include_author,
                    };
                    match expand_playlist(playlists.as_ref(), &link, &output_dir, naming).await {
                        Ok(entries) => StageResult::Done(entries),
                        Err(source) => StageResult::Failed(ItemError::Playlist {
                            link: link.as_str().to_string(),
                            source,
                        }),
                    }
                }
            })
            .await;

        items.extend(expanded.into_iter().flatten());
        items
    }

    async fn resolve_round(
        &self,
        items: Vec<WorkItem>,
        errors: &mut Vec<ItemError>,
    ) -> Vec<ResolvedVideo> {
        let resolver = Arc::clone(&self.resolver);
        self.rounds()
            .run(Stage::Resolve, items, errors, |item: WorkItem| {
                let resolver = Arc::clone(&resolver);
                async move {
                    match resolver.resolve(&item.link).await {
                        Ok(stream) => StageResult::Done(ResolvedVideo::new(item, stream)),
                        Err(source) => StageResult::Failed(ItemError::Resolve {
                            link: item.link.as_str().to_string(),
                            source,
                        }),
                    }
                }
            })
            .await
    }

    async fn metadata_round(
        &self,
        videos: Vec<ResolvedVideo>,
        errors: &mut Vec<ItemError>,
    ) -> Vec<ResolvedVideo> {
        let metadata = Arc::clone(&self.metadata);
        self.rounds()
            .run(Stage::Metadata, videos, errors, |mut video: ResolvedVideo| {
                let metadata = Arc::clone(&metadata);
                async move {
                    let fetched = metadata
                        .fetch_metadata(&video.source_url)
                        .await
                        .and_then(|meta| {
                            if meta.title.trim().is_empty() {
                                Err(MetadataError::MissingTitle)
                            } else {
                                Ok(meta)
                            }
                        });
                    match fetched {
                        Ok(meta) => {
                            video.title = meta.title;
                            video.author = meta.author;
                            StageResult::Done(video)
                        }
                        Err(source) => StageResult::Failed(ItemError::Metadata {
                            link: video.link,
                            source,
                        }),
                    }
                }
            })
            .await
    }

    /// Creates one scratch file per item, sequentially, before downloads start.
    fn allocate_scratch(
        &self,
        videos: Vec<ResolvedVideo>,
        scratch: &mut ScratchFiles,
        errors: &mut Vec<ItemError>,
    ) -> Vec<ResolvedVideo> {
        let mut ready = Vec::with_capacity(videos.len());
        for mut video in videos {
            match scratch.allocate(&self.scratch_dir, &video.link) {
                Ok(path) => {
                    video.temp_file = Some(path);
                    ready.push(video);
                }
                Err(source) => {
                    let error = ItemError::Download {
                        link: video.link,
                        source,
                    };
                    self.reporter.item_failed(&error);
                    errors.push(error);
                }
            }
        }
        ready
    }

    async fn download_round(
        &self,
        videos: Vec<ResolvedVideo>,
        errors: &mut Vec<ItemError>,
    ) -> Vec<ResolvedVideo> {
        let http = self.http.clone();
        let reporter = Arc::clone(&self.reporter);
        self.rounds()
            .run(Stage::Download, videos, errors, |video: ResolvedVideo| {
                let http = http.clone();
                let reporter = Arc::clone(&reporter);
                async move {
                    let Some(temp_file) = video.temp_file.clone() else {
                        return StageResult::Failed(ItemError::Download {
                            source: DownloadError::io(
                                PathBuf::new(),
                                std::io::Error::other("no scratch file allocated"),
                            ),
                            link: video.link,
                        });
                    };
                    let link = video.link.clone();
                    let result = http
                        .download_to_path(&video.stream_url, &temp_file, |bytes, total| {
                            reporter.download_progress(&link, bytes, total);
                        })
                        .await;
                    match result {
                        Ok(bytes) => {
                            debug!(link = %video.link, bytes, "stream downloaded");
                            StageResult::Done(video)
                        }
                        Err(source) => StageResult::Failed(ItemError::Download {
                            link: video.link,
                            source,
                        }),
                    }
                }
            })
            .await
    }

    /// Assigns each item a unique output path, sequentially.
    async fn claim_output_paths(&self, videos: Vec<ResolvedVideo>) -> Vec<ResolvedVideo> {
        let mut claimed = HashSet::new();
        let mut out = Vec::with_capacity(videos.len());
        for mut video in videos {
            let name = video.output_name(self.options.include_author());
            let path = claim_output_path(
                &video.output_dir,
                &name,
                self.options.target_os(),
                &mut claimed,
            )
            .await;
            video.output_path = Some(path);
            out.push(video);
        }
        out
    }

    async fn convert_round(
        &self,
        videos: Vec<ResolvedVideo>,
        errors: &mut Vec<ItemError>,
    ) -> Vec<ResolvedVideo> {
        let converter = Arc::clone(&self.converter);
        self.rounds()
            .run(Stage::Convert, videos, errors, |video: ResolvedVideo| {
                let converter = Arc::clone(&converter);
                async move {
                    let (Some(input), Some(output)) =
                        (video.temp_file.as_deref(), video.output_path.as_deref())
                    else {
                        return StageResult::Failed(ItemError::Conversion {
                            source: crate::convert::ConvertError::MissingOutput {
                                path: video.output_path.clone().unwrap_or_default(),
                            },
                            link: video.link,
                        });
                    };
                    match converter.convert(input, output).await {
                        Ok(()) => {
                            info!(link = %video.link, output = %output.display(), "output written");
                            StageResult::Done(video)
                        }
                        Err(source) => StageResult::Failed(ItemError::Conversion {
                            link: video.link,
                            source,
                        }),
                    }
                }
            })
            .await
    }
}

/// How playlist folders are named.
#[derive(Debug, Clone, Copy)]
struct FolderNaming {
    target_os: TargetOs,
    include_author: bool,
}

async fn expand_playlist(
    playlists: &dyn PlaylistSource,
    link: &VideoLink,
    output_dir: &Path,
    naming: FolderNaming,
) -> Result<Vec<WorkItem>, PlaylistError> {
    let Some(playlist_id) = link.playlist_id() else {
        return Ok(vec![WorkItem {
            link: link.clone(),
            output_dir: output_dir.to_path_buf(),
        }]);
    };

    let listing = playlists.expand(playlist_id).await?;
    let folder_name = listing.folder_name(naming.include_author);
    let folder = output_dir.join(sanitize_filename(&folder_name, naming.target_os));
    tokio::fs::create_dir_all(&folder)
        .await
        .map_err(|source| PlaylistError::Folder {
            path: folder.clone(),
            source,
        })?;

    let mut entries = Vec::with_capacity(listing.video_ids.len());
    for video_id in &listing.video_ids {
        match VideoLink::from_video_id(video_id) {
            Ok(entry) => entries.push(WorkItem {
                link: entry,
                output_dir: folder.clone(),
            }),
            Err(e) => warn!(video_id, error = %e, "skipping unusable playlist entry"),
        }
    }
    Ok(entries)
}

/// Picks the first free path among `name`, `name_2`, `name_3`, ... in `dir`.
///
/// A path is free when no earlier item of the batch claimed it and nothing
/// exists on disk at that location.
async fn claim_output_path(
    dir: &Path,
    name: &str,
    target_os: TargetOs,
    claimed: &mut HashSet<PathBuf>,
) -> PathBuf {
    let file = sanitize_filename(name, target_os);
    let (stem, ext) = match file.rfind('.') {
        Some(idx) if idx > 0 => file.split_at(idx),
        _ => (file.as_str(), ""),
    };

    let candidate_for = |attempt: usize| {
        let file_name = if attempt == 1 {
            file.clone()
        } else {
            format!("{stem}_{attempt}{ext}")
        };
        let joined = dir.join(file_name);
        match target_os {
            TargetOs::Windows => PathBuf::from(sanitize_path(&joined.to_string_lossy(), target_os)),
            TargetOs::Portable => joined,
        }
    };

    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let candidate = candidate_for(attempt);
        if !claimed.contains(&candidate) && !occupied(&candidate).await {
            claimed.insert(candidate.clone());
            return candidate;
        }
    }

    let fallback = candidate_for(MAX_NAME_ATTEMPTS);
    warn!(path = %fallback.display(), "no free output name; reusing last candidate");
    claimed.insert(fallback.clone());
    fallback
}

/// Whether something is known to exist at `path`. An unreadable location
/// counts as free; the conversion reports the real error.
async fn occupied(path: &Path) -> bool {
    match tokio::fs::try_exists(path).await {
        Ok(exists) => exists,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "cannot check output path");
            false
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn video(title: &str, author: Option<&str>) -> ResolvedVideo {
        ResolvedVideo {
            link: "https://youtu.be/a".to_string(),
            source_url: "https://youtu.be/a".to_string(),
            stream_url: "https://media.example/a".to_string(),
            mime_type: "video/mp4".to_string(),
            title: title.to_string(),
            author: author.map(str::to_string),
            output_dir: PathBuf::from("/out"),
            temp_file: None,
            output_path: None,
        }
    }

    #[test]
    fn test_output_name_with_and_without_author() {
        let v = video("Song", Some("Band"));
        assert_eq!(v.output_name(true), "Song - Band.mp3");
        assert_eq!(v.output_name(false), "Song.mp3");
        assert_eq!(video("Song", Some("")).output_name(true), "Song.mp3");
        assert_eq!(video("Song", None).output_name(true), "Song.mp3");
    }

    #[tokio::test]
    async fn test_claim_output_path_suffixes_batch_collisions() {
        let dir = tempfile::tempdir().unwrap();
        let mut claimed = HashSet::new();
        let first =
            claim_output_path(dir.path(), "Song.mp3", TargetOs::Portable, &mut claimed).await;
        let second =
            claim_output_path(dir.path(), "Song.mp3", TargetOs::Portable, &mut claimed).await;
        let third =
            claim_output_path(dir.path(), "Song.mp3", TargetOs::Portable, &mut claimed).await;
        assert_eq!(first, dir.path().join("Song.mp3"));
        assert_eq!(second, dir.path().join("Song_2.mp3"));
        assert_eq!(third, dir.path().join("Song_3.mp3"));
    }

    #[tokio::test]
    async fn test_claim_output_path_skips_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Song.mp3"), b"old").unwrap();
        let mut claimed = HashSet::new();
        let path =
            claim_output_path(dir.path(), "Song.mp3", TargetOs::Portable, &mut claimed).await;
        assert_eq!(path, dir.path().join("Song_2.mp3"));
    }

    #[tokio::test]
    async fn test_claim_output_path_sanitizes_title() {
        let dir = tempfile::tempdir().unwrap();
        let mut claimed = HashSet::new();
        let path = claim_output_path(
            dir.path(),
            "AC/DC: Live?.mp3",
            TargetOs::Windows,
            &mut claimed,
        )
        .await;
        assert_eq!(path.file_name().unwrap(), "AC_DC_ Live_.mp3");
    }

    #[test]
    fn test_scratch_files_remove_all_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut scratch = ScratchFiles::default();
        let kept = scratch.allocate(dir.path(), "https://youtu.be/a").unwrap();
        let gone = scratch.allocate(dir.path(), "https://youtu.be/b").unwrap();
        assert!(kept.file_name().unwrap().to_string_lossy().starts_with(SCRATCH_PREFIX));
        std::fs::remove_file(&gone).unwrap();

        let (removed, errors) = scratch.remove_all();
        assert_eq!(removed, 1);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].link(), "https://youtu.be/b");
        assert_eq!(errors[0].kind(), ErrorKind::Cleanup);
        assert!(!kept.exists());
    }

    #[test]
    fn test_scratch_files_drop_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let mut scratch = ScratchFiles::default();
            scratch.allocate(dir.path(), "https://youtu.be/a").unwrap()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_batch_outcome_success_requires_no_errors() {
        let outcome = BatchOutcome {
            completed: 2,
            total: 2,
            ..BatchOutcome::default()
        };
        assert!(outcome.is_success());

        let partial = BatchOutcome {
            completed: 1,
            total: 2,
            ..BatchOutcome::default()
        };
        assert!(!partial.is_success());
    }
}
