//! Progress reporting using indicatif.
//!
//! [`Progress`] implements [`ProgressCallback`] with a single spinner that
//! counts scanned files and duplicate pairs. It draws nothing when quiet or
//! when stderr is not a terminal.

use std::io::IsTerminal;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::duplicates::DuplicatePair;

/// Receives progress updates from a deduplication run.
pub trait ProgressCallback: Send + Sync {
    /// Called for every regular file handed to the duplicate index.
    fn on_file_scanned(&self, path: &Path);

    /// Called for every duplicate pair, before it is linked.
    fn on_duplicate(&self, _pair: &DuplicatePair) {}

    /// Called once when the run is over.
    fn on_finish(&self) {}
}

/// Terminal spinner for a deduplication run.
pub struct Progress {
    bar: ProgressBar,
    pairs: AtomicU64,
}

impl Progress {
    /// Create a spinner on stderr.
    ///
    /// The spinner is hidden when `quiet` is set or stderr is not a terminal.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        if quiet || !std::io::stderr().is_terminal() {
            return Self::hidden();
        }

        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {pos} files, {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message("0 duplicates");
        bar.enable_steady_tick(Duration::from_millis(100));
        Self {
            bar,
            pairs: AtomicU64::new(0),
        }
    }

    /// Create a spinner that never draws.
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            pairs: AtomicU64::new(0),
        }
    }

    /// The underlying bar, for suspending it around log output.
    #[must_use]
    pub fn bar(&self) -> ProgressBar {
        self.bar.clone()
    }

    /// Files counted so far.
    #[must_use]
    pub fn files(&self) -> u64 {
        self.bar.position()
    }

    /// Duplicate pairs counted so far.
    #[must_use]
    pub fn pairs(&self) -> u64 {
        self.pairs.load(Ordering::Relaxed)
    }
}

impl ProgressCallback for Progress {
    fn on_file_scanned(&self, _path: &Path) {
        self.bar.inc(1);
    }

    fn on_duplicate(&self, _pair: &DuplicatePair) {
        let pairs = self.pairs.fetch_add(1, Ordering::Relaxed) + 1;
        self.bar.set_message(format!("{pairs} duplicates"));
    }

    fn on_finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("files", &self.files())
            .field("pairs", &self.pairs())
            .finish()
    }
}
