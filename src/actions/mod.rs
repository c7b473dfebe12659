//! Filesystem actions module.
//!
//! This module provides functionality for:
//! - Replacing a duplicate with a hard link or relative symlink
//! - Verifying that a file did not change between scan and action
//!
//! # Linking
//!
//! Links are created under a temporary name first and then renamed over the
//! duplicate, so the duplicate path never disappears:
//!
//! ```no_run
//! use dedupe::actions::link::{replace_with_link, LinkMode};
//! use dedupe::scanner::{ContentDigest, Hasher};
//! use std::path::Path;
//!
//! let digest = Hasher::default().digest(Path::new("original.txt"))?;
//! replace_with_link(
//!     Path::new("original.txt"),
//!     Path::new("duplicate.txt"),
//!     &digest,
//!     LinkMode::HardLink,
//! )?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod link;

// Re-export commonly used types
pub use link::{
    is_orphaned_temp_link, relative_target, replace_with_link, temp_link_digest, temp_link_path,
    verify_unchanged, LinkError, LinkMode,
};
