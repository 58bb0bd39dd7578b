//! One concurrent fan-out/fan-in round.
//!
//! Every surviving item gets its own task; a shared semaphore caps how many
//! run at once. Results flow back over a channel in completion order and the
//! round returns only after every task has reported.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinError;
use tracing::{debug, warn};

use super::error::{ItemError, Stage};
use super::report::PipelineReporter;

/// Fan-in message of a round: the stage payload or the item's error.
#[derive(Debug)]
pub enum StageResult<T> {
    /// The stage succeeded for the item.
    Done(T),
    /// The stage failed; the item leaves the surviving set.
    Failed(ItemError),
}

/// Items that know which link they came from.
pub(super) trait Tagged {
    fn link(&self) -> &str;
}

/// Shared state for running rounds.
pub(super) struct RoundRunner<'a> {
    pub(super) semaphore: &'a Arc<Semaphore>,
    pub(super) reporter: &'a Arc<dyn PipelineReporter>,
}

impl RoundRunner<'_> {
    /// Runs `task` for every item and waits for all of them.
    ///
    /// Failures are appended to `errors` in completion order. Successful
    /// payloads are returned in input order.
    pub(super) async fn run<I, T, F, Fut>(
        &self,
        stage: Stage,
        items: Vec<I>,
        errors: &mut Vec<ItemError>,
        task: F,
    ) -> Vec<T>
    where
        I: Tagged,
        T: Send + 'static,
        F: Fn(I) -> Fut,
        Fut: Future<Output = StageResult<T>> + Send + 'static,
    {
        self.reporter.round_started(stage, items.len());
        if items.is_empty() {
            self.reporter.round_finished(stage, 0, 0);
            return Vec::new();
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handles = Vec::with_capacity(items.len());

        for (index, item) in items.into_iter().enumerate() {
            let link = item.link().to_string();
            let work = task(item);
            let semaphore = Arc::clone(self.semaphore);
            let tx = tx.clone();
            let task_link = link.clone();

            let handle = tokio::spawn(async move {
                // The semaphore is never closed, so a permit is always granted.
                let _permit = semaphore.acquire_owned().await.ok();
                let result = work.await;
                if tx.send((index, task_link, result)).is_err() {
                    debug!("round receiver dropped before result was delivered");
                }
            });
            handles.push((link, handle));
        }
        drop(tx);

        let mut done = Vec::new();
        let mut failed = 0usize;
        while let Some((index, link, result)) = rx.recv().await {
            match result {
                StageResult::Done(value) => {
                    self.reporter.item_succeeded(stage, &link);
                    done.push((index, value));
                }
                StageResult::Failed(error) => {
                    self.reporter.item_failed(&error);
                    errors.push(error);
                    failed += 1;
                }
            }
        }

        // A task that panicked never sent a result; its item still fails.
        for (link, handle) in handles {
            if let Err(e) = handle.await {
                warn!(%stage, link = %link, error = %e, "pipeline task panicked");
                let error = ItemError::Panicked {
                    link,
                    stage,
                    message: panic_message(e),
                };
                self.reporter.item_failed(&error);
                errors.push(error);
                failed += 1;
            }
        }

        self.reporter.round_finished(stage, done.len(), failed);
        done.sort_by_key(|(index, _)| *index);
        done.into_iter().map(|(_, value)| value).collect()
    }
}

fn panic_message(error: JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }
    let payload = error.into_panic();
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "task panicked".to_string())
}
