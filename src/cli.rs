//! Command-line interface definitions for dedupe.
//!
//! This module defines all CLI arguments using the clap derive API. Options
//! that can also come from the configuration file are optional here, so a
//! flag only overrides the file when it is actually given.
//!
//! # Example
//!
//! ```bash
//! # Hard link duplicates directly inside ~/Downloads
//! dedupe ~/Downloads
//!
//! # Walk the whole tree, but only report what would change
//! dedupe -r -n ~/photos ~/backup/photos
//!
//! # Link across filesystems with relative symlinks, ignore small files
//! dedupe -r --symlink fallback --min-size 4KiB /srv/a /mnt/b
//! ```

use clap::Parser;
use std::path::PathBuf;

use crate::dedupe::SymlinkPolicy;
use crate::scanner::DigestAlgorithm;

const TEMP_LINK_HELP: &str = "\
Each link is first created as .<digest>.dedupe-tmp next to the duplicate and
then renamed over it. A file with such a name whose content matches the digest
is a leftover from an interrupted run: it is reported and not deduplicated.";

/// Find duplicate files and replace them with links.
///
/// The first file seen with a given content is kept; every later copy is
/// replaced by a hard link to it (or a relative symlink, see --symlink).
#[derive(Debug, Parser)]
#[command(name = "dedupe")]
#[command(author, version, about, long_about = None)]
#[command(after_help = TEMP_LINK_HELP)]
pub struct Cli {
    /// Directories to deduplicate, scanned in the order given
    #[arg(value_name = "DIR")]
    pub dirs: Vec<PathBuf>,

    /// Report what would be linked without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Suppress per-pair notices (warnings and errors are still shown)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Descend into subdirectories
    #[arg(short, long)]
    pub recurse: bool,

    /// Ignore files smaller than this (e.g., 0, 512, 4KB, 1MiB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// When to use relative symbolic links instead of hard links
    #[arg(short, long, alias = "sym-link", value_enum, value_name = "WHEN")]
    pub symlink: Option<SymlinkPolicy>,

    /// Content digest algorithm [default: sha256]
    #[arg(short, long, value_enum, value_name = "NAME")]
    pub algorithm: Option<DigestAlgorithm>,

    /// Treat symbolic links to regular files as the files they point to
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Gitignore-style pattern of entries to skip (can be repeated)
    #[arg(short = 'x', long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Read settings from this file instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print fatal errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,
}

/// Parse a human-readable size string into bytes.
///
/// # Examples
///
/// ```
/// use dedupe::cli::parse_size;
///
/// assert_eq!(parse_size("0").unwrap(), 0);
/// assert_eq!(parse_size("4KiB").unwrap(), 4096);
/// assert_eq!(parse_size("1.5MB").unwrap(), 1_500_000);
/// ```
///
/// # Errors
///
/// Returns an error message for empty input, a malformed number, or an
/// unknown suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
