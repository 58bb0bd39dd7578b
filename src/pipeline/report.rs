//! Observability hooks for pipeline runs.
//!
//! The orchestrator never logs progress or draws UI itself; it calls a
//! [`PipelineReporter`] at fixed points instead. Every hook has an empty
//! default so reporters implement only what they display.

use tracing::{debug, info, warn};

use super::error::{ItemError, Stage};

/// Receives stage-completion events from a pipeline run.
///
/// Hooks are called from concurrent tasks and must not block.
pub trait PipelineReporter: Send + Sync {
    /// A round is starting with `items` surviving items.
    fn round_started(&self, _stage: Stage, _items: usize) {}

    /// An item finished `stage` successfully.
    fn item_succeeded(&self, _stage: Stage, _link: &str) {}

    /// An item failed and left the surviving set.
    fn item_failed(&self, _error: &ItemError) {}

    /// Every task of the round has reported.
    fn round_finished(&self, _stage: Stage, _succeeded: usize, _failed: usize) {}

    /// Bytes written so far for one download, with the expected total when
    /// the server reported one.
    fn download_progress(&self, _link: &str, _bytes: u64, _total: Option<u64>) {}

    /// Scratch files were removed at the end of the batch.
    fn cleanup_finished(&self, _removed: usize, _failed: usize) {}
}

/// Reporter that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl PipelineReporter for NoopReporter {}

/// Reporter that emits `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl PipelineReporter for TracingReporter {
    fn round_started(&self, stage: Stage, items: usize) {
        info!(%stage, items, "round started");
    }

    fn item_succeeded(&self, stage: Stage, link: &str) {
        debug!(%stage, link, "item succeeded");
    }

    fn item_failed(&self, error: &ItemError) {
        warn!(
            stage = %error.stage(),
            kind = ?error.kind(),
            link = error.link(),
            error = %error,
            "item failed"
        );
    }

    fn round_finished(&self, stage: Stage, succeeded: usize, failed: usize) {
        info!(%stage, succeeded, failed, "round finished");
    }

    fn cleanup_finished(&self, removed: usize, failed: usize) {
        debug!(removed, failed, "scratch files removed");
    }
}
