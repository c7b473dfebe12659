//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Size grouping that postpones hashing until a size collides ([`groups`])
//! - The per-file classification algorithm ([`index`])
//! - A lazy walker-to-index event stream over several roots ([`scan`])

pub mod groups;
pub mod index;
pub mod scan;

pub use groups::{DeviceScope, DigestGroup, GroupKey, SizeGroup};
pub use index::{DuplicateIndex, DuplicatePair, IndexConfig, IndexStats, Observation};
pub use scan::{DuplicateScan, ScanEvent, ScanStats};
