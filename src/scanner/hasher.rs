//! Streaming content digests.
//!
//! # Overview
//! This module provides the [`Hasher`] struct for computing a content
//! fingerprint of a file. Files are read in bounded chunks ([`BLOCK_SIZE`])
//! so memory use does not depend on file size.
//!
//! The digest algorithm is selectable; SHA-256 is the default.

use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::Digest;

use super::HashError;

/// Read size used when streaming a file through the digest.
pub const BLOCK_SIZE: usize = 1024 * 1024;

/// Digest algorithms available for content fingerprints.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum DigestAlgorithm {
    /// SHA-224
    Sha224,
    /// SHA-256
    #[default]
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
    /// SHA-512 truncated to 256 bits
    #[serde(rename = "sha512-256")]
    #[value(name = "sha512-256")]
    Sha512Trunc256,
    /// BLAKE3
    Blake3,
}

impl DigestAlgorithm {
    /// All algorithms, in the order they are listed to users.
    pub const ALL: [Self; 6] = [
        Self::Sha224,
        Self::Sha256,
        Self::Sha384,
        Self::Sha512,
        Self::Sha512Trunc256,
        Self::Blake3,
    ];

    /// Canonical lowercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
            Self::Sha512Trunc256 => "sha512-256",
            Self::Blake3 => "blake3",
        }
    }

    /// Length of the produced digest in bytes.
    #[must_use]
    pub fn output_len(self) -> usize {
        match self {
            Self::Sha224 => 28,
            Self::Sha256 | Self::Sha512Trunc256 | Self::Blake3 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fingerprint of a file's content.
///
/// Equal size plus equal digest is treated as equal content.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest(Box<[u8]>);

impl ContentDigest {
    /// Wrap raw digest bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(Box::from(bytes))
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hexadecimal form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({self})")
    }
}

/// Capability to fingerprint a file's content.
///
/// The duplicate index only depends on this trait, so alternative digest
/// sources can be plugged in.
pub trait ContentHasher: Send + Sync {
    /// Compute the digest of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    fn digest(&self, path: &Path) -> Result<ContentDigest, HashError>;
}

/// Incremental state for one digest computation.
enum DigestState {
    Sha224(sha2::Sha224),
    Sha256(sha2::Sha256),
    Sha384(sha2::Sha384),
    Sha512(sha2::Sha512),
    Sha512Trunc256(sha2::Sha512_256),
    Blake3(Box<blake3::Hasher>),
}

impl DigestState {
    fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Sha224 => Self::Sha224(sha2::Sha224::new()),
            DigestAlgorithm::Sha256 => Self::Sha256(sha2::Sha256::new()),
            DigestAlgorithm::Sha384 => Self::Sha384(sha2::Sha384::new()),
            DigestAlgorithm::Sha512 => Self::Sha512(sha2::Sha512::new()),
            DigestAlgorithm::Sha512Trunc256 => Self::Sha512Trunc256(sha2::Sha512_256::new()),
            DigestAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha224(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
            Self::Sha384(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
            Self::Sha512Trunc256(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
        }
    }

    fn finalize(self) -> ContentDigest {
        match self {
            Self::Sha224(h) => ContentDigest::from_bytes(&h.finalize()),
            Self::Sha256(h) => ContentDigest::from_bytes(&h.finalize()),
            Self::Sha384(h) => ContentDigest::from_bytes(&h.finalize()),
            Self::Sha512(h) => ContentDigest::from_bytes(&h.finalize()),
            Self::Sha512Trunc256(h) => ContentDigest::from_bytes(&h.finalize()),
            Self::Blake3(h) => ContentDigest::from_bytes(h.finalize().as_bytes()),
        }
    }
}

/// Streaming file hasher.
///
/// A `Hasher` is reusable: every call to [`Hasher::digest`] starts a fresh
/// computation, so the same instance can fingerprint both files of a size
/// collision.
///
/// # Example
///
/// ```no_run
/// use dedupe::scanner::{DigestAlgorithm, Hasher};
/// use std::path::Path;
///
/// let hasher = Hasher::new(DigestAlgorithm::Sha256);
/// let digest = hasher.digest(Path::new("file.bin")).unwrap();
/// println!("{digest}");
/// ```
#[derive(Debug, Clone)]
pub struct Hasher {
    algorithm: DigestAlgorithm,
    block_size: usize,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new(DigestAlgorithm::default())
    }
}

impl Hasher {
    /// Create a hasher for the given algorithm.
    #[must_use]
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            algorithm,
            block_size: BLOCK_SIZE,
            shutdown_flag: None,
        }
    }

    /// Override the read chunk size (minimum 1 byte).
    #[must_use]
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// Abort long reads when the flag is set.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// The configured algorithm.
    #[must_use]
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Compute the digest of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened, a read fails
    /// mid-stream, or shutdown is requested while reading.
    pub fn digest(&self, path: &Path) -> Result<ContentDigest, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        self.digest_reader(file, path)
    }

    /// Compute the digest of everything readable from `reader`.
    ///
    /// `path` is only used to label errors.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if a read fails or shutdown is requested.
    pub fn digest_reader<R: Read>(
        &self,
        mut reader: R,
        path: &Path,
    ) -> Result<ContentDigest, HashError> {
        let mut state = DigestState::new(self.algorithm);
        let mut buffer = vec![0u8; self.block_size];

        loop {
            if self.is_shutdown_requested() {
                return Err(HashError::Interrupted(path.to_path_buf()));
            }
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            state.update(&buffer[..read]);
        }

        log::trace!("Digest computed ({}): {}", self.algorithm, path.display());
        Ok(state.finalize())
    }
}

impl ContentHasher for Hasher {
    fn digest(&self, path: &Path) -> Result<ContentDigest, HashError> {
        Hasher::digest(self, path)
    }
}

impl<H: ContentHasher + ?Sized> ContentHasher for &H {
    fn digest(&self, path: &Path) -> Result<ContentDigest, HashError> {
        (**self).digest(path)
    }
}
