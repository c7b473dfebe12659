//! Directory walker implementation using jwalk.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for enumerating the regular
//! files under a root directory, together with their filesystem identity.
//! Traversal is either flat (immediate children only) or recursive.
//!
//! # Features
//!
//! - Deterministic order: entries are sorted by file name within each directory
//! - Symlinks skipped unless `follow_symlinks` is set
//! - Gitignore-style exclude patterns via the `ignore` crate
//! - Leftover temporary links from an interrupted run (a `.<digest>.dedupe-tmp`
//!   name whose content matches the digest) are reported, not yielded
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use dedupe::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/srv/photos"), WalkerConfig::default());
//! let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
//! println!("Found {} files", files.len());
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;

use super::{FileIdentity, ScanError, WalkerConfig};
use crate::actions::link::is_orphaned_temp_link;

type JwalkEntry = jwalk::DirEntry<((), ())>;
type EntryIter = Box<dyn Iterator<Item = Result<JwalkEntry, jwalk::Error>>>;

/// Directory walker for file discovery under a single root.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given root directory.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// Once the flag is set the walk yields no further entries.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// The root this walker starts from.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build the exclude matcher from the configured patterns.
    fn build_gitignore(&self) -> Option<Gitignore> {
        if self.config.exclude_patterns.is_empty() {
            return None;
        }

        let mut builder = GitignoreBuilder::new(&self.root);
        for pattern in &self.config.exclude_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid exclude pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if !gitignore.is_empty() => Some(gitignore),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Failed to build exclude patterns: {}", e);
                None
            }
        }
    }

    /// Start walking, yielding the identity of every regular file.
    ///
    /// The returned iterator is lazy and single-use; start a new walk to
    /// enumerate the tree again. Per-entry failures are yielded as
    /// [`ScanError`] values rather than stopping iteration.
    #[must_use]
    pub fn walk(&self) -> Walk {
        let gitignore = self.build_gitignore().map(Arc::new);
        let root = self.root.clone();
        let max_depth = if self.config.recursive { usize::MAX } else { 1 };

        let walk_dir = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .skip_hidden(false)
            .max_depth(max_depth)
            .process_read_dir(move |_depth, _path, _read_dir_state, children| {
                if let Some(gi) = gitignore.as_deref() {
                    children.retain(|child| match child {
                        Ok(entry) => {
                            let path = entry.path();
                            let is_dir = entry.file_type().is_dir();
                            let excluded = is_excluded(gi, &root, &path, is_dir);
                            if excluded {
                                log::trace!("Excluding: {}", path.display());
                            }
                            !excluded
                        }
                        Err(_) => true,
                    });
                }

                // Sort children so arrival order (and thus which copy is kept) is stable
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        Walk {
            entries: Box::new(walk_dir.into_iter()),
            root: self.root.clone(),
            follow_symlinks: self.config.follow_symlinks,
            shutdown_flag: self.shutdown_flag.clone(),
        }
    }
}

/// Check a path against the exclude matcher.
fn is_excluded(gitignore: &Gitignore, root: &Path, path: &Path, is_dir: bool) -> bool {
    let relative_path = path.strip_prefix(root).unwrap_or(path);
    gitignore.matched(relative_path, is_dir).is_ignore()
}

/// Lazy iterator over the regular files of one root.
///
/// Created by [`Walker::walk`].
pub struct Walk {
    entries: EntryIter,
    root: PathBuf,
    follow_symlinks: bool,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl fmt::Debug for Walk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Walk")
            .field("root", &self.root)
            .field("follow_symlinks", &self.follow_symlinks)
            .finish_non_exhaustive()
    }
}

impl Walk {
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Turn one traversal entry into a file identity, or skip it.
    fn process_entry(&self, entry: &JwalkEntry) -> Option<Result<FileIdentity, ScanError>> {
        // The root itself is reported at depth 0
        if entry.depth == 0 {
            return None;
        }

        let path = entry.path();
        let file_type = entry.file_type();
        if file_type.is_dir() {
            return None;
        }

        if file_type.is_symlink() && !self.follow_symlinks {
            log::trace!("Skipping symlink: {}", path.display());
            return None;
        }

        let metadata = if self.follow_symlinks {
            std::fs::metadata(&path)
        } else {
            std::fs::symlink_metadata(&path)
        };
        let metadata = match metadata {
            Ok(m) => m,
            Err(e) => {
                log::debug!("Metadata query failed for {}: {}", path.display(), e);
                return Some(Err(ScanError::from_io(&path, e)));
            }
        };

        // Sockets, devices, fifos and dangling links are not candidates
        if !metadata.is_file() {
            log::trace!("Skipping non-regular file: {}", path.display());
            return None;
        }

        if is_orphaned_temp_link(&path) {
            log::warn!(
                "Leftover temporary link from an interrupted run: {}",
                path.display()
            );
            return None;
        }

        match FileIdentity::from_metadata(path.clone(), &metadata) {
            Some(identity) => Some(Ok(identity)),
            None => Some(Err(ScanError::NoIdentity(path))),
        }
    }
}

impl Iterator for Walk {
    type Item = Result<FileIdentity, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.is_shutdown_requested() {
                log::debug!("Walker: Shutdown requested, stopping iteration");
                return None;
            }

            match self.entries.next()? {
                Ok(entry) => {
                    if let Some(result) = self.process_entry(&entry) {
                        return Some(result);
                    }
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), Path::to_path_buf);
                    log::warn!("Walker error for {}: {}", path.display(), e);
                    return Some(Err(ScanError::Io {
                        path,
                        source: std::io::Error::other(e.to_string()),
                    }));
                }
            }
        }
    }
}
