//! Deduplication run: scanning, link policy, linking and reporting.
//!
//! [`Deduplicator::run`] drives one pass over a list of roots. For every
//! duplicate pair the index emits, the configured [`SymlinkPolicy`] decides
//! which kind of link (if any) replaces the duplicate, the link is made
//! unless this is a dry run, and the outcome is logged. Failures for a
//! single pair are reported and counted; they never abort the run.
//!
//! # Example
//!
//! ```no_run
//! use dedupe::dedupe::{DedupeConfig, Deduplicator, SymlinkPolicy};
//! use std::path::PathBuf;
//!
//! let config = DedupeConfig {
//!     recurse: true,
//!     symlink: SymlinkPolicy::Fallback,
//!     ..Default::default()
//! };
//!
//! let summary = Deduplicator::new(config).run(&[PathBuf::from("photos")])?;
//! println!("{} pairs, {} reclaimed", summary.pairs_found, summary.reclaimed());
//! # Ok::<(), dedupe::dedupe::DedupeError>(())
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytesize::ByteSize;
use serde::{Deserialize, Serialize};

use crate::actions::link::{replace_with_link, verify_unchanged, LinkError, LinkMode};
use crate::duplicates::{
    DeviceScope, DuplicateIndex, DuplicatePair, DuplicateScan, IndexConfig, ScanEvent,
};
use crate::progress::ProgressCallback;
use crate::scanner::{ContentHasher, DigestAlgorithm, Hasher, WalkerConfig};

/// When duplicates are replaced by symbolic links instead of hard links.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SymlinkPolicy {
    /// Hard links only; cross-device duplicates are reported, not linked
    #[default]
    Never,
    /// Hard link on the same device, relative symlink across devices
    Fallback,
    /// Always relative symlinks
    Always,
}

/// What to do with one duplicate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDecision {
    /// Replace the duplicate with a link of this kind.
    Link(LinkMode),
    /// Leave both files alone: a hard link would cross devices.
    SkipCrossDevice,
}

impl SymlinkPolicy {
    /// Device scope of the duplicate index under this policy.
    ///
    /// Only a hard-link-only policy needs duplicates on the same device; the
    /// others let every file of a size compete in one pool.
    #[must_use]
    pub fn device_scope(self) -> DeviceScope {
        match self {
            Self::Never => DeviceScope::PerDevice,
            Self::Fallback | Self::Always => DeviceScope::AnyDevice,
        }
    }

    /// Decide how `pair` is linked.
    #[must_use]
    pub fn decide(self, pair: &DuplicatePair) -> LinkDecision {
        match (self, pair.same_device()) {
            (Self::Always, _) => LinkDecision::Link(LinkMode::SymLink),
            (_, true) => LinkDecision::Link(LinkMode::HardLink),
            (Self::Fallback, false) => LinkDecision::Link(LinkMode::SymLink),
            (Self::Never, false) => LinkDecision::SkipCrossDevice,
        }
    }
}

impl std::fmt::Display for SymlinkPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Never => "never",
            Self::Fallback => "fallback",
            Self::Always => "always",
        })
    }
}

/// Immutable settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupeConfig {
    /// Report pairs without touching the filesystem
    pub dry_run: bool,
    /// Suppress per-pair notices
    pub quiet: bool,
    /// Walk subdirectories
    pub recurse: bool,
    /// Files smaller than this are ignored
    pub min_size: u64,
    /// Link policy
    pub symlink: SymlinkPolicy,
    /// Digest algorithm
    pub algorithm: DigestAlgorithm,
    /// Treat symlinks to regular files as files
    pub follow_symlinks: bool,
    /// Gitignore-style exclude patterns
    pub exclude: Vec<String>,
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            quiet: false,
            recurse: false,
            min_size: 1,
            symlink: SymlinkPolicy::Never,
            algorithm: DigestAlgorithm::default(),
            follow_symlinks: false,
            exclude: Vec::new(),
        }
    }
}

impl DedupeConfig {
    fn index_config(&self) -> IndexConfig {
        IndexConfig::default()
            .with_min_size(self.min_size)
            .with_scope(self.symlink.device_scope())
    }

    fn walker_config(&self) -> WalkerConfig {
        WalkerConfig::default()
            .with_recursive(self.recurse)
            .with_follow_symlinks(self.follow_symlinks)
            .with_exclude_patterns(self.exclude.clone())
    }
}

/// Usage errors, detected before anything is scanned. Everything else is
/// counted in [`DedupeSummary`].
#[derive(thiserror::Error, Debug)]
pub enum DedupeError {
    /// No root directory was given.
    #[error("no directories given")]
    NoRoots,

    /// A root does not exist or cannot be accessed.
    #[error("cannot access {path}: {source}")]
    RootNotFound {
        /// The root as given
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A root is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Outcome of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupeSummary {
    /// Regular files walked
    pub files_scanned: usize,
    /// Digests computed
    pub files_hashed: usize,
    /// Files ignored for being below the minimum size
    pub below_min_size: usize,
    /// Files skipped because they were already linked
    pub same_inode: usize,
    /// Duplicate pairs found
    pub pairs_found: usize,
    /// Duplicates replaced by hard links
    pub hard_linked: usize,
    /// Duplicates replaced by symlinks
    pub sym_linked: usize,
    /// Pairs skipped because a hard link would cross devices
    pub cross_device_skips: usize,
    /// Pairs whose link could not be made
    pub link_failures: usize,
    /// Files that could not be hashed
    pub hash_failures: usize,
    /// Entries that could not be walked
    pub scan_errors: usize,
    /// Bytes freed (or that would be freed, in a dry run)
    pub bytes_reclaimed: u64,
    /// No filesystem changes were made
    pub dry_run: bool,
    /// The run stopped early on request
    pub interrupted: bool,
}

impl DedupeSummary {
    /// Duplicates replaced by any kind of link.
    #[must_use]
    pub fn linked(&self) -> usize {
        self.hard_linked + self.sym_linked
    }

    /// Whether any file or pair failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.link_failures > 0 || self.hash_failures > 0 || self.scan_errors > 0
    }

    /// Bytes reclaimed in human-readable form.
    #[must_use]
    pub fn reclaimed(&self) -> ByteSize {
        ByteSize::b(self.bytes_reclaimed)
    }
}

impl std::fmt::Display for DedupeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = if self.dry_run { "would reclaim" } else { "reclaimed" };
        write!(
            f,
            "{} files scanned, {} hashed, {} duplicate pairs, {} linked ({} hard, {} symbolic), {verb} {}",
            self.files_scanned,
            self.files_hashed,
            self.pairs_found,
            self.linked(),
            self.hard_linked,
            self.sym_linked,
            self.reclaimed()
        )?;
        if self.cross_device_skips > 0 {
            write!(f, ", {} cross-device skipped", self.cross_device_skips)?;
        }
        let failures = self.link_failures + self.hash_failures + self.scan_errors;
        if failures > 0 {
            write!(f, ", {failures} failures")?;
        }
        Ok(())
    }
}

/// Runs deduplication passes with a fixed configuration.
pub struct Deduplicator<H: ContentHasher = Hasher> {
    config: DedupeConfig,
    hasher: H,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl Deduplicator<Hasher> {
    /// Create a deduplicator hashing with the configured algorithm.
    #[must_use]
    pub fn new(config: DedupeConfig) -> Self {
        let hasher = Hasher::new(config.algorithm);
        Self::with_hasher(config, hasher)
    }
}

impl<H: ContentHasher> Deduplicator<H> {
    /// Create a deduplicator with a custom content hasher.
    #[must_use]
    pub fn with_hasher(config: DedupeConfig, hasher: H) -> Self {
        Self {
            config,
            hasher,
            shutdown_flag: None,
            progress_callback: None,
        }
    }

    /// Set the shutdown flag. It is checked between files and after each
    /// pair is fully handled.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// The run configuration.
    #[must_use]
    pub fn config(&self) -> &DedupeConfig {
        &self.config
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Deduplicate every root, in order.
    ///
    /// # Errors
    ///
    /// Returns [`DedupeError`] only for unusable roots, before anything is
    /// scanned. Per-file and per-pair failures are counted in the summary.
    pub fn run(&self, roots: &[PathBuf]) -> Result<DedupeSummary, DedupeError> {
        validate_roots(roots)?;

        log::debug!(
            "Deduplicating {} root(s): policy={}, algorithm={}, min_size={}, recurse={}, dry_run={}",
            roots.len(),
            self.config.symlink,
            self.config.algorithm,
            self.config.min_size,
            self.config.recurse,
            self.config.dry_run
        );

        let index = DuplicateIndex::new(&self.hasher, self.config.index_config());
        let mut scan = DuplicateScan::new(index, roots.to_vec(), self.config.walker_config());
        if let Some(ref flag) = self.shutdown_flag {
            scan = scan.with_shutdown_flag(Arc::clone(flag));
        }
        if let Some(ref callback) = self.progress_callback {
            scan = scan.with_progress_callback(Arc::clone(callback));
        }

        let mut summary = DedupeSummary {
            dry_run: self.config.dry_run,
            ..Default::default()
        };

        for event in scan.by_ref() {
            match event {
                ScanEvent::Duplicate(pair) => self.handle_pair(&pair, &mut summary),
                ScanEvent::AlreadyDeduplicated(identity) => {
                    if !self.config.quiet {
                        log::info!("Already deduplicated {}", identity.path.display());
                    }
                }
                ScanEvent::HashFailed(err) => log::warn!("Could not hash file: {err}"),
                ScanEvent::ScanFailed(err) => log::warn!("Could not scan entry: {err}"),
            }

            if self.is_shutdown_requested() {
                log::debug!("Shutdown requested, stopping after current pair");
                summary.interrupted = true;
                break;
            }
        }

        let scan_stats = scan.stats();
        let index_stats = scan.index_stats();
        summary.interrupted |= scan.was_interrupted();
        summary.files_scanned = scan_stats.files_scanned;
        summary.scan_errors = scan_stats.scan_errors;
        summary.files_hashed = index_stats.files_hashed;
        summary.hash_failures = index_stats.hash_failures;
        summary.below_min_size = index_stats.below_min_size;
        summary.same_inode = index_stats.same_inode;

        if let Some(ref callback) = self.progress_callback {
            callback.on_finish();
        }

        Ok(summary)
    }

    /// Decide, link and report one pair.
    fn handle_pair(&self, pair: &DuplicatePair, summary: &mut DedupeSummary) {
        summary.pairs_found += 1;
        if let Some(ref callback) = self.progress_callback {
            callback.on_duplicate(pair);
        }

        let original = &pair.original.path;
        let duplicate = &pair.duplicate.path;

        let mode = match self.config.symlink.decide(pair) {
            LinkDecision::Link(mode) => mode,
            LinkDecision::SkipCrossDevice => {
                log::warn!(
                    "Could not hardlink {} to {} (different devices)",
                    original.display(),
                    duplicate.display()
                );
                summary.cross_device_skips += 1;
                return;
            }
        };

        if !self.config.quiet {
            log::info!("{} -> {}", original.display(), duplicate.display());
        }

        if self.config.dry_run {
            record_link(summary, pair, mode);
            return;
        }

        match link_pair(pair, mode) {
            Ok(()) => record_link(summary, pair, mode),
            Err(err) => {
                log::error!(
                    "Could not link {} to {}: {err}",
                    original.display(),
                    duplicate.display()
                );
                log::debug!("Digest of failed pair: {}", pair.digest);
                summary.link_failures += 1;
            }
        }
    }
}

impl<H: ContentHasher> std::fmt::Debug for Deduplicator<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deduplicator")
            .field("config", &self.config)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish_non_exhaustive()
    }
}

/// Check that every root is an accessible directory.
fn validate_roots(roots: &[PathBuf]) -> Result<(), DedupeError> {
    if roots.is_empty() {
        return Err(DedupeError::NoRoots);
    }
    for root in roots {
        let metadata = std::fs::metadata(root).map_err(|source| DedupeError::RootNotFound {
            path: root.clone(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(DedupeError::NotADirectory(root.clone()));
        }
    }
    Ok(())
}

/// Re-check both files, then replace the duplicate.
fn link_pair(pair: &DuplicatePair, mode: LinkMode) -> Result<(), LinkError> {
    verify_unchanged(&pair.original)?;
    verify_unchanged(&pair.duplicate)?;
    replace_with_link(&pair.original.path, &pair.duplicate.path, &pair.digest, mode)
}

fn record_link(summary: &mut DedupeSummary, pair: &DuplicatePair, mode: LinkMode) {
    match mode {
        LinkMode::HardLink => summary.hard_linked += 1,
        LinkMode::SymLink => summary.sym_linked += 1,
    }
    summary.bytes_reclaimed += pair.size();
}
