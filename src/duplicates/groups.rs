//! Size groups: the buckets that defer hashing until it pays off.
//!
//! # Overview
//!
//! Files of different sizes can never be duplicates, so every observed file
//! is bucketed by size (and, when only hard links are allowed, by device).
//! A bucket starts out holding a single [`Pending`](SizeGroup::Pending)
//! file that has not been hashed. Only when a second file of the same size
//! arrives are both hashed, and the bucket becomes a
//! [`Grouped`](SizeGroup::Grouped) map from digest to the first file seen
//! with that digest.
//!
//! # Example
//!
//! ```
//! use dedupe::duplicates::{DeviceScope, GroupKey};
//! use dedupe::scanner::{FileIdentity, FileKey};
//! use std::path::PathBuf;
//!
//! let file = FileIdentity::new(PathBuf::from("/a"), 1024, FileKey::new(7, 42));
//!
//! assert_eq!(DeviceScope::PerDevice.key_for(&file), GroupKey::new(1024, Some(7)));
//! assert_eq!(DeviceScope::AnyDevice.key_for(&file), GroupKey::new(1024, None));
//! ```

use std::collections::{HashMap, HashSet};

use crate::scanner::{ContentDigest, FileIdentity, FileKey};

/// Whether size groups are split per device.
///
/// Hard links cannot cross filesystems, so when they are the only link
/// type allowed, files on different devices must never be paired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceScope {
    /// One pool per `(size, device)`.
    #[default]
    PerDevice,
    /// One pool per size, regardless of device.
    AnyDevice,
}

impl DeviceScope {
    /// The bucket key for a file under this scope.
    #[must_use]
    pub fn key_for(self, identity: &FileIdentity) -> GroupKey {
        match self {
            Self::PerDevice => GroupKey::new(identity.size, Some(identity.device())),
            Self::AnyDevice => GroupKey::new(identity.size, None),
        }
    }
}

/// Key of one size group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupKey {
    /// File size shared by every member
    pub size: u64,
    /// Device shared by every member, when scoped per device
    pub device: Option<u64>,
}

impl GroupKey {
    /// Create a new key.
    #[must_use]
    pub const fn new(size: u64, device: Option<u64>) -> Self {
        Self { size, device }
    }
}

/// Hashed members of a size group.
///
/// Holds at most one file per distinct digest: the first one observed.
#[derive(Debug, Clone, Default)]
pub struct DigestGroup {
    by_digest: HashMap<ContentDigest, FileIdentity>,
    members: HashSet<FileKey>,
}

impl DigestGroup {
    /// Create a group holding one hashed file.
    #[must_use]
    pub fn with_first(digest: ContentDigest, identity: FileIdentity) -> Self {
        let mut group = Self::default();
        group.insert(digest, identity);
        group
    }

    /// The retained file for `digest`, if any.
    #[must_use]
    pub fn get(&self, digest: &ContentDigest) -> Option<&FileIdentity> {
        self.by_digest.get(digest)
    }

    /// Retain `identity` for `digest` unless a file is already retained.
    ///
    /// Returns `true` if the file was inserted.
    pub fn insert(&mut self, digest: ContentDigest, identity: FileIdentity) -> bool {
        if self.by_digest.contains_key(&digest) {
            return false;
        }
        self.members.insert(identity.key);
        self.by_digest.insert(digest, identity);
        true
    }

    /// Whether a retained file is the same on-disk object as `key`.
    #[must_use]
    pub fn contains_file(&self, key: &FileKey) -> bool {
        self.members.contains(key)
    }

    /// Number of distinct digests in the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_digest.len()
    }

    /// Whether the group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_digest.is_empty()
    }

    /// Iterate over the retained files.
    pub fn files(&self) -> impl Iterator<Item = (&ContentDigest, &FileIdentity)> {
        self.by_digest.iter()
    }
}

/// State of one size group.
#[derive(Debug, Clone)]
pub enum SizeGroup {
    /// Only one file of this size seen so far; not hashed.
    Pending(FileIdentity),
    /// Two or more files seen; retained files keyed by digest.
    Grouped(DigestGroup),
}

impl SizeGroup {
    /// Whether the group has been hashed.
    #[must_use]
    pub fn is_grouped(&self) -> bool {
        matches!(self, Self::Grouped(_))
    }

    /// Number of retained files.
    #[must_use]
    pub fn retained(&self) -> usize {
        match self {
            Self::Pending(_) => 1,
            Self::Grouped(group) => group.len(),
        }
    }
}
