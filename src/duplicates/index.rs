//! The duplicate index: lazy, size-first duplicate classification.
//!
//! # Overview
//!
//! [`DuplicateIndex::observe`] consumes one [`FileIdentity`] at a time and
//! classifies it against everything seen earlier in the run:
//!
//! 1. Files below the minimum size are ignored.
//! 2. The first file of a given size (per device, when scoped) is parked as
//!    [`SizeGroup::Pending`] without being hashed.
//! 3. When a second file of that size arrives, both are hashed (in parallel)
//!    and the group becomes a digest map.
//! 4. Later arrivals are hashed and looked up in the digest map.
//!
//! The first file seen for a size and digest stays the original for the
//! rest of the run. Files sharing a device and inode with a retained file
//! are already the same object and are never hashed or paired.
//!
//! # Example
//!
//! ```no_run
//! use dedupe::duplicates::{DuplicateIndex, IndexConfig, Observation};
//! use dedupe::scanner::{FileIdentity, Hasher};
//! use std::path::Path;
//!
//! let mut index = DuplicateIndex::new(Hasher::default(), IndexConfig::default());
//!
//! for path in ["a.txt", "b.txt"] {
//!     let identity = FileIdentity::query(Path::new(path)).unwrap();
//!     if let Ok(Observation::Duplicate(pair)) = index.observe(identity) {
//!         println!("{} -> {}", pair.original.path.display(), pair.duplicate.path.display());
//!     }
//! }
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::groups::{DeviceScope, DigestGroup, GroupKey, SizeGroup};
use crate::scanner::{ContentDigest, ContentHasher, FileIdentity, HashError, Hasher};

/// Configuration for the duplicate index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexConfig {
    /// Files smaller than this many bytes are never grouped or hashed.
    pub min_size: u64,
    /// Whether size groups are split per device.
    pub scope: DeviceScope,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            scope: DeviceScope::PerDevice,
        }
    }
}

impl IndexConfig {
    /// Set the minimum file size.
    #[must_use]
    pub fn with_min_size(mut self, min_size: u64) -> Self {
        self.min_size = min_size;
        self
    }

    /// Set the device scope.
    #[must_use]
    pub fn with_scope(mut self, scope: DeviceScope) -> Self {
        self.scope = scope;
        self
    }
}

/// A confirmed duplicate: `duplicate` has the same size and digest as the
/// earlier-observed `original`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicatePair {
    /// The retained file, observed first
    pub original: FileIdentity,
    /// The later file with identical content
    pub duplicate: FileIdentity,
    /// Digest shared by both files
    pub digest: ContentDigest,
}

impl DuplicatePair {
    /// Whether both files live on the same device.
    #[must_use]
    pub fn same_device(&self) -> bool {
        self.original.same_device(&self.duplicate)
    }

    /// Size of the duplicated content in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.duplicate.size
    }
}

/// Outcome of observing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Smaller than the minimum size; ignored.
    BelowMinSize,
    /// First file of its size; parked without hashing.
    Pending,
    /// Same device and inode as the pending file of its size; nothing to do.
    SameFile,
    /// Same device and inode as a hashed file; linked earlier in this run or
    /// before it. Carries the observed file back for reporting.
    AlreadyDeduplicated(FileIdentity),
    /// Hashed and found no match; retained as an original for its digest.
    Unique,
    /// Hashed and matched an earlier file.
    Duplicate(DuplicatePair),
}

/// Counters collected by the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Files passed to [`DuplicateIndex::observe`]
    pub observed: usize,
    /// Files ignored for being below the minimum size
    pub below_min_size: usize,
    /// Files skipped because they share an inode with a retained file
    pub same_inode: usize,
    /// Digests computed successfully
    pub files_hashed: usize,
    /// Digests that failed
    pub hash_failures: usize,
    /// Duplicate pairs emitted
    pub pairs: usize,
}

/// Size-first duplicate index over a single run.
pub struct DuplicateIndex<H: ContentHasher = Hasher> {
    hasher: H,
    config: IndexConfig,
    groups: HashMap<GroupKey, SizeGroup>,
    stats: IndexStats,
}

impl<H: ContentHasher> DuplicateIndex<H> {
    /// Create an empty index.
    #[must_use]
    pub fn new(hasher: H, config: IndexConfig) -> Self {
        Self {
            hasher,
            config,
            groups: HashMap::new(),
            stats: IndexStats::default(),
        }
    }

    /// The index configuration.
    #[must_use]
    pub fn config(&self) -> IndexConfig {
        self.config
    }

    /// The content hasher.
    #[must_use]
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Counters collected so far.
    #[must_use]
    pub fn stats(&self) -> IndexStats {
        self.stats
    }

    /// Number of size groups currently tracked.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// The size group `identity` would be classified into, if any.
    #[must_use]
    pub fn group_for(&self, identity: &FileIdentity) -> Option<&SizeGroup> {
        self.groups.get(&self.config.scope.key_for(identity))
    }

    /// Classify one file against everything observed so far.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if `identity` had to be hashed and could not be
    /// read. The file is then dropped from this run and the index keeps no
    /// trace of it. A failure to hash the *pending* peer is logged and
    /// counted instead, and `identity` takes its place.
    pub fn observe(&mut self, identity: FileIdentity) -> Result<Observation, HashError> {
        self.stats.observed += 1;

        if identity.size < self.config.min_size {
            self.stats.below_min_size += 1;
            return Ok(Observation::BelowMinSize);
        }

        let key = self.config.scope.key_for(&identity);
        let mut entry = match self.groups.entry(key) {
            Entry::Vacant(vacant) => {
                vacant.insert(SizeGroup::Pending(identity));
                return Ok(Observation::Pending);
            }
            Entry::Occupied(occupied) => occupied,
        };

        match entry.get_mut() {
            SizeGroup::Pending(pending) => {
                if pending.same_file(&identity) {
                    self.stats.same_inode += 1;
                    return Ok(Observation::SameFile);
                }

                let pending = pending.clone();
                let (pending_digest, new_digest) = rayon::join(
                    || self.hasher.digest(&pending.path),
                    || self.hasher.digest(&identity.path),
                );

                match (pending_digest, new_digest) {
                    (Ok(pending_digest), Ok(new_digest)) => {
                        self.stats.files_hashed += 2;
                        let mut group = DigestGroup::with_first(pending_digest, pending);
                        let observation =
                            Self::classify(&mut group, new_digest, identity, &mut self.stats);
                        entry.insert(SizeGroup::Grouped(group));
                        Ok(observation)
                    }
                    (Ok(pending_digest), Err(err)) => {
                        self.stats.files_hashed += 1;
                        self.stats.hash_failures += 1;
                        entry.insert(SizeGroup::Grouped(DigestGroup::with_first(
                            pending_digest,
                            pending,
                        )));
                        Err(err)
                    }
                    (Err(pending_err), Ok(new_digest)) => {
                        log::warn!("Dropping unreadable file: {pending_err}");
                        self.stats.files_hashed += 1;
                        self.stats.hash_failures += 1;
                        entry.insert(SizeGroup::Grouped(DigestGroup::with_first(
                            new_digest, identity,
                        )));
                        Ok(Observation::Unique)
                    }
                    (Err(pending_err), Err(err)) => {
                        log::warn!("Dropping unreadable file: {pending_err}");
                        self.stats.hash_failures += 2;
                        entry.remove();
                        Err(err)
                    }
                }
            }
            SizeGroup::Grouped(group) => {
                if group.contains_file(&identity.key) {
                    self.stats.same_inode += 1;
                    return Ok(Observation::AlreadyDeduplicated(identity));
                }

                match self.hasher.digest(&identity.path) {
                    Ok(digest) => {
                        self.stats.files_hashed += 1;
                        Ok(Self::classify(group, digest, identity, &mut self.stats))
                    }
                    Err(err) => {
                        self.stats.hash_failures += 1;
                        Err(err)
                    }
                }
            }
        }
    }

    /// Look up a freshly hashed file in its digest group.
    fn classify(
        group: &mut DigestGroup,
        digest: ContentDigest,
        identity: FileIdentity,
        stats: &mut IndexStats,
    ) -> Observation {
        match group.get(&digest) {
            Some(original) => {
                stats.pairs += 1;
                Observation::Duplicate(DuplicatePair {
                    original: original.clone(),
                    duplicate: identity,
                    digest,
                })
            }
            None => {
                group.insert(digest, identity);
                Observation::Unique
            }
        }
    }
}

impl<H: ContentHasher> std::fmt::Debug for DuplicateIndex<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateIndex")
            .field("config", &self.config)
            .field("groups", &self.groups.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
