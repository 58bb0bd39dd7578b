//! Progress bars for batch runs.

use std::collections::HashMap;
use std::sync::Mutex;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use ytdl_core::{ItemError, PipelineReporter, Stage};

const STAGE_TEMPLATE: &str = "{prefix:>9.bold} [{bar:30}] {pos}/{len} {msg}";
const DOWNLOAD_TEMPLATE: &str = "{prefix:>9} [{bar:30}] {bytes}/{total_bytes} {wide_msg}";

pub(crate) fn should_use_progress(stderr_is_terminal: bool, quiet: bool) -> bool {
    stderr_is_terminal && !quiet
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// Reporter drawing one bar per stage round plus one per active download.
pub(crate) struct ProgressReporter {
    multi: MultiProgress,
    stage_bar: ProgressBar,
    downloads: Mutex<HashMap<String, ProgressBar>>,
}

impl ProgressReporter {
    pub(crate) fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let stage_bar = multi.add(ProgressBar::new(0));
        stage_bar.set_style(style(STAGE_TEMPLATE));
        Self {
            multi,
            stage_bar,
            downloads: Mutex::new(HashMap::new()),
        }
    }

    fn clear_downloads(&self) {
        if let Ok(mut bars) = self.downloads.lock() {
            for (_, bar) in bars.drain() {
                bar.finish_and_clear();
                self.multi.remove(&bar);
            }
        }
    }

    pub(crate) fn finish(&self) {
        self.clear_downloads();
        self.stage_bar.finish_and_clear();
    }
}

impl PipelineReporter for ProgressReporter {
    fn round_started(&self, stage: Stage, items: usize) {
        self.stage_bar.set_prefix(stage.to_string());
        self.stage_bar.set_length(u64::try_from(items).unwrap_or(u64::MAX));
        self.stage_bar.set_position(0);
        self.stage_bar.set_message("");
    }

    fn item_succeeded(&self, _stage: Stage, _link: &str) {
        self.stage_bar.inc(1);
    }

    fn item_failed(&self, error: &ItemError) {
        if error.stage() != Stage::Cleanup {
            self.stage_bar.inc(1);
        }
        self.stage_bar.set_message(format!("failed: {}", error.link()));
    }

    fn round_finished(&self, stage: Stage, _succeeded: usize, failed: usize) {
        if stage == Stage::Download {
            self.clear_downloads();
        }
        if failed > 0 {
            self.stage_bar.set_message(format!("{failed} failed"));
        }
    }

    fn download_progress(&self, link: &str, bytes: u64, total: Option<u64>) {
        let Ok(mut bars) = self.downloads.lock() else {
            return;
        };
        let bar = bars.entry(link.to_string()).or_insert_with(|| {
            let bar = self.multi.add(ProgressBar::new(total.unwrap_or(0)));
            bar.set_style(style(DOWNLOAD_TEMPLATE));
            bar.set_prefix("download");
            bar.set_message(link.to_string());
            bar
        });
        if let Some(total) = total {
            bar.set_length(total);
        }
        bar.set_position(bytes);
    }
}
