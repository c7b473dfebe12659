//! Filesystem identity of walked files.
//!
//! # Overview
//!
//! Two paths that resolve to the same `(device, inode)` pair are the same
//! on-disk object: they are already linked and must never be hashed against
//! each other or relinked. The device also decides whether a hard link is
//! possible at all, since hard links cannot cross filesystems.
//!
//! # Platform Support
//!
//! - **Unix**: `(st_dev, st_ino)` from file metadata
//! - **Other**: no identity is available; such files cannot be deduplicated

use std::fs::Metadata;
use std::path::{Path, PathBuf};

/// Device and inode numbers identifying one filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileKey {
    /// Identifier of the filesystem the object lives on.
    pub device: u64,
    /// Inode number within that filesystem.
    pub inode: u64,
}

impl FileKey {
    /// Create a key from raw device and inode numbers.
    #[must_use]
    pub const fn new(device: u64, inode: u64) -> Self {
        Self { device, inode }
    }

    /// Extract the key from file metadata.
    ///
    /// Returns `None` on platforms without inode information.
    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            device: metadata.dev(),
            inode: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    #[must_use]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        // std exposes volume serial / file index on Windows only through
        // unstable APIs, so identity is unavailable there for now.
        None
    }
}

/// Everything the duplicate index needs to know about a file without
/// reading its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentity {
    /// Path the file was discovered under
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Device and inode of the underlying object
    pub key: FileKey,
}

impl FileIdentity {
    /// Create an identity from its parts.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, key: FileKey) -> Self {
        Self { path, size, key }
    }

    /// Build an identity from a metadata query on `path`.
    ///
    /// Returns `None` when the platform does not expose device/inode numbers.
    #[must_use]
    pub fn from_metadata(path: PathBuf, metadata: &Metadata) -> Option<Self> {
        FileKey::from_metadata(metadata).map(|key| Self {
            path,
            size: metadata.len(),
            key,
        })
    }

    /// Query the current identity of `path`, following symlinks.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the metadata query fails, or an
    /// `Unsupported` error on platforms without inode information.
    pub fn query(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        Self::from_metadata(path.to_path_buf(), &metadata).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "file identity is not available on this platform",
            )
        })
    }

    /// Device the file lives on.
    #[must_use]
    pub fn device(&self) -> u64 {
        self.key.device
    }

    /// Inode number of the file.
    #[must_use]
    pub fn inode(&self) -> u64 {
        self.key.inode
    }

    /// Whether both identities refer to the same on-disk object.
    #[must_use]
    pub fn same_file(&self, other: &Self) -> bool {
        self.key == other.key
    }

    /// Whether both files live on the same device.
    #[must_use]
    pub fn same_device(&self, other: &Self) -> bool {
        self.key.device == other.key.device
    }
}
