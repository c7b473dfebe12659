//! Crash-safe replacement of a duplicate file by a link.
//!
//! # Protocol
//!
//! 1. Create the link at a temporary sibling of the duplicate, named after
//!    the content digest (`.{hex}.dedupe-tmp`).
//! 2. Rename the temporary link onto the duplicate. `rename(2)` is atomic, so
//!    the duplicate's name always resolves to either the old file or the new
//!    link.
//! 3. If the rename fails, remove the temporary link and leave the duplicate
//!    alone.
//!
//! A crash between steps 1 and 2 leaves at most one orphaned temporary link
//! next to an intact duplicate. The walker skips a file with such a name only
//! when its content hashes to the digest in the name, and reports it.
//!
//! The original file is never touched.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::scanner::{ContentDigest, DigestAlgorithm, FileIdentity, Hasher};

/// Suffix of temporary link names.
pub const TEMP_SUFFIX: &str = ".dedupe-tmp";

/// Kind of link that replaces a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkMode {
    /// A hard link to the original's inode. Same device only.
    HardLink,
    /// A symbolic link holding the original's path relative to the
    /// duplicate's directory. May cross devices.
    SymLink,
}

impl LinkMode {
    /// Human-readable name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::HardLink => "hard link",
            Self::SymLink => "symlink",
        }
    }
}

impl std::fmt::Display for LinkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors that can occur while replacing a duplicate.
///
/// In every case the duplicate file is left in place.
#[derive(thiserror::Error, Debug)]
pub enum LinkError {
    /// The link could not be created at the temporary path.
    #[error("failed to create {mode} {temp} -> {original}: {source}")]
    CreateFailed {
        /// Kind of link attempted
        mode: LinkMode,
        /// File the link would point to
        original: PathBuf,
        /// Temporary path of the link
        temp: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The temporary link could not be renamed onto the duplicate.
    #[error("failed to rename {temp} onto {duplicate}: {source}")]
    RenameFailed {
        /// Temporary path of the link, removed again
        temp: PathBuf,
        /// File that was to be replaced
        duplicate: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A file no longer matches what the scan observed.
    #[error("file changed since scan: {0}")]
    Changed(PathBuf),
}

impl LinkError {
    /// The path most relevant to the failure.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::CreateFailed { temp, .. } => temp,
            Self::RenameFailed { duplicate, .. } => duplicate,
            Self::Changed(path) => path,
        }
    }
}

/// Temporary link path for replacing `duplicate`: a hidden sibling named
/// after the digest.
#[must_use]
pub fn temp_link_path(duplicate: &Path, digest: &ContentDigest) -> PathBuf {
    let name = format!(".{digest}{TEMP_SUFFIX}");
    match duplicate.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// The digest part of a temporary link name produced by [`temp_link_path`].
///
/// The hex string must have the length of some algorithm's output.
#[must_use]
pub fn temp_link_digest(name: &str) -> Option<&str> {
    let hex = name.strip_prefix('.')?.strip_suffix(TEMP_SUFFIX)?;
    let known_len = DigestAlgorithm::ALL
        .iter()
        .any(|algorithm| algorithm.output_len() * 2 == hex.len());
    (known_len && hex.bytes().all(|b| b.is_ascii_hexdigit())).then_some(hex)
}

/// Whether `path` is a temporary link left behind by an interrupted run.
///
/// The name must have the temporary form and the content must hash to the
/// digest in the name. A user file that merely looks like one is not an
/// orphan. Unreadable files are not orphans either.
#[must_use]
pub fn is_orphaned_temp_link(path: &Path) -> bool {
    let Some(hex) = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(temp_link_digest)
    else {
        return false;
    };

    DigestAlgorithm::ALL
        .iter()
        .filter(|algorithm| algorithm.output_len() * 2 == hex.len())
        .any(|algorithm| {
            Hasher::new(*algorithm)
                .digest(path)
                .is_ok_and(|digest| digest.to_hex().eq_ignore_ascii_case(hex))
        })
}

/// Check that `expected` still has the size and inode the scan observed.
///
/// # Errors
///
/// Returns [`LinkError::Changed`] if the file is gone, was replaced, or
/// changed size.
pub fn verify_unchanged(expected: &FileIdentity) -> Result<(), LinkError> {
    match FileIdentity::query(&expected.path) {
        Ok(current) if current.key == expected.key && current.size == expected.size => Ok(()),
        Ok(current) => {
            log::debug!(
                "{} changed since scan ({} bytes, inode {} -> {} bytes, inode {})",
                expected.path.display(),
                expected.size,
                expected.inode(),
                current.size,
                current.inode()
            );
            Err(LinkError::Changed(expected.path.clone()))
        }
        Err(e) => {
            log::debug!("{} unreadable since scan: {e}", expected.path.display());
            Err(LinkError::Changed(expected.path.clone()))
        }
    }
}

/// Replace `duplicate` with a link to `original`.
///
/// For [`LinkMode::SymLink`] the link target is `original` expressed
/// relative to the duplicate's directory, so the tree stays relocatable.
///
/// # Errors
///
/// - [`LinkError::CreateFailed`] if the temporary link cannot be created
///   (a leftover from an interrupted run, a cross-device hard link, ...)
/// - [`LinkError::RenameFailed`] if the rename onto the duplicate fails;
///   the temporary link is removed again
///
/// # Example
///
/// ```no_run
/// use dedupe::actions::link::{replace_with_link, LinkMode};
/// use dedupe::scanner::ContentDigest;
/// use std::path::Path;
///
/// let digest = ContentDigest::from_bytes(&[0xab, 0xcd]);
/// replace_with_link(Path::new("a.txt"), Path::new("b.txt"), &digest, LinkMode::HardLink)?;
/// # Ok::<(), dedupe::actions::link::LinkError>(())
/// ```
pub fn replace_with_link(
    original: &Path,
    duplicate: &Path,
    digest: &ContentDigest,
    mode: LinkMode,
) -> Result<(), LinkError> {
    let temp = temp_link_path(duplicate, digest);

    let created = match mode {
        LinkMode::HardLink => fs::hard_link(original, &temp),
        LinkMode::SymLink => relative_target(original, duplicate)
            .and_then(|target| create_symlink(&target, &temp)),
    };
    if let Err(source) = created {
        return Err(LinkError::CreateFailed {
            mode,
            original: original.to_path_buf(),
            temp,
            source,
        });
    }

    if let Err(source) = fs::rename(&temp, duplicate) {
        if let Err(e) = fs::remove_file(&temp) {
            log::warn!(
                "Could not remove temporary link {}: {e}",
                temp.display()
            );
        }
        return Err(LinkError::RenameFailed {
            temp,
            duplicate: duplicate.to_path_buf(),
            source,
        });
    }

    log::trace!(
        "Replaced {} with {mode} to {}",
        duplicate.display(),
        original.display()
    );
    Ok(())
}

/// Path of `original` relative to the directory containing `duplicate`.
///
/// Both paths are made absolute against the working directory and
/// normalized lexically first. If they share no common prefix (different
/// drive prefixes on Windows), the absolute path of `original` is returned.
///
/// # Errors
///
/// Returns an error if the working directory cannot be determined.
pub fn relative_target(original: &Path, duplicate: &Path) -> io::Result<PathBuf> {
    let original = normalize(&std::path::absolute(original)?);
    let duplicate = normalize(&std::path::absolute(duplicate)?);
    let base = duplicate.parent().unwrap_or(duplicate.as_path());

    let target: Vec<Component<'_>> = original.components().collect();
    let from: Vec<Component<'_>> = base.components().collect();
    let common = target
        .iter()
        .zip(&from)
        .take_while(|(a, b)| a == b)
        .count();

    if common == 0 {
        return Ok(original);
    }

    let mut relative = PathBuf::new();
    for _ in common..from.len() {
        relative.push("..");
    }
    for component in &target[common..] {
        relative.push(component);
    }
    Ok(relative)
}

/// Resolve `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}
