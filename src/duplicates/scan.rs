//! Lazy stream of duplicate events over one or more roots.
//!
//! [`DuplicateScan`] walks each root in order, feeds every regular file into
//! a [`DuplicateIndex`], and yields only the observations a caller has to
//! act on or report. Files that merely park in a size group or turn out to
//! be unique are consumed silently.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::index::{DuplicateIndex, DuplicatePair, IndexStats, Observation};
use crate::progress::ProgressCallback;
use crate::scanner::{
    ContentHasher, FileIdentity, HashError, Hasher, ScanError, Walk, Walker, WalkerConfig,
};

/// An observation that needs the caller's attention.
#[derive(Debug)]
pub enum ScanEvent {
    /// A confirmed duplicate of an earlier file.
    Duplicate(DuplicatePair),
    /// A file already sharing its inode with a retained original.
    AlreadyDeduplicated(FileIdentity),
    /// A file that could not be hashed and was dropped.
    HashFailed(HashError),
    /// An entry that could not be walked or queried.
    ScanFailed(ScanError),
}

/// Counters for the walking side of a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Regular files handed to the index
    pub files_scanned: usize,
    /// Walk or metadata failures
    pub scan_errors: usize,
}

/// Walker-to-index pipeline over a list of roots.
///
/// Implements [`Iterator`]; it is finite and not restartable.
pub struct DuplicateScan<H: ContentHasher = Hasher> {
    index: DuplicateIndex<H>,
    walker_config: WalkerConfig,
    roots: VecDeque<PathBuf>,
    current: Option<Walk>,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
    stats: ScanStats,
    interrupted: bool,
}

impl<H: ContentHasher> DuplicateScan<H> {
    /// Create a scan over `roots`, visited in the given order.
    #[must_use]
    pub fn new(index: DuplicateIndex<H>, roots: Vec<PathBuf>, walker_config: WalkerConfig) -> Self {
        Self {
            index,
            walker_config,
            roots: roots.into(),
            current: None,
            shutdown_flag: None,
            progress_callback: None,
            stats: ScanStats::default(),
            interrupted: false,
        }
    }

    /// Set the shutdown flag checked between files.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback notified for every scanned file.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Walking counters collected so far.
    #[must_use]
    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// Index counters collected so far.
    #[must_use]
    pub fn index_stats(&self) -> IndexStats {
        self.index.stats()
    }

    /// Whether the scan stopped early because shutdown was requested.
    #[must_use]
    pub fn was_interrupted(&self) -> bool {
        self.interrupted
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn start_walk(&self, root: PathBuf) -> Walk {
        log::debug!("Scanning {}", root.display());
        let mut walker = Walker::new(&root, self.walker_config.clone());
        if let Some(ref flag) = self.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }
        walker.walk()
    }
}

impl<H: ContentHasher> Iterator for DuplicateScan<H> {
    type Item = ScanEvent;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.interrupted {
                return None;
            }
            if self.is_shutdown_requested() {
                log::debug!("Shutdown requested, stopping scan");
                self.interrupted = true;
                self.current = None;
                return None;
            }

            let Some(walk) = self.current.as_mut() else {
                let root = self.roots.pop_front()?;
                self.current = Some(self.start_walk(root));
                continue;
            };

            let Some(entry) = walk.next() else {
                self.current = None;
                continue;
            };

            let identity = match entry {
                Ok(identity) => identity,
                Err(err) => {
                    self.stats.scan_errors += 1;
                    return Some(ScanEvent::ScanFailed(err));
                }
            };

            self.stats.files_scanned += 1;
            if let Some(ref callback) = self.progress_callback {
                callback.on_file_scanned(&identity.path);
            }

            match self.index.observe(identity) {
                Ok(Observation::Duplicate(pair)) => return Some(ScanEvent::Duplicate(pair)),
                Ok(Observation::AlreadyDeduplicated(identity)) => {
                    return Some(ScanEvent::AlreadyDeduplicated(identity));
                }
                Ok(_) => {}
                Err(err) => return Some(ScanEvent::HashFailed(err)),
            }
        }
    }
}

impl<H: ContentHasher> std::fmt::Debug for DuplicateScan<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateScan")
            .field("index", &self.index)
            .field("roots", &self.roots)
            .field("stats", &self.stats)
            .field("interrupted", &self.interrupted)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish_non_exhaustive()
    }
}
