//! Layered configuration.
//!
//! Settings are merged from, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. A TOML file: `--config PATH`, or `config.toml` in the platform config
//!    directory
//! 3. Environment variables prefixed `DEDUPE_` (e.g. `DEDUPE_MIN_SIZE=4096`)
//! 4. Command-line flags
//!
//! The result is frozen into a [`DedupeConfig`] before any scanning starts.
//! A file given with `--config` must exist; a missing default file is
//! skipped. A file or variable that does not parse stops the run.
//!
//! ```toml
//! min_size = 4096
//! symlink = "fallback"
//! algorithm = "blake3"
//! recurse = true
//! exclude = [".git/", "*.tmp"]
//! ```

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::dedupe::{DedupeConfig, SymlinkPolicy};
use crate::scanner::DigestAlgorithm;

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "DEDUPE_";

/// Configuration that cannot be used. Always fatal, before any scanning.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A configuration file given explicitly does not exist.
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),

    /// The merged configuration does not deserialize.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Invalid(Box::new(err))
    }
}

/// Settings that can be stored in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Files smaller than this many bytes are ignored.
    pub min_size: u64,
    /// Link policy.
    pub symlink: SymlinkPolicy,
    /// Digest algorithm.
    pub algorithm: DigestAlgorithm,
    /// Descend into subdirectories.
    pub recurse: bool,
    /// Treat symlinks to regular files as files.
    pub follow_symlinks: bool,
    /// Gitignore-style exclude patterns.
    pub exclude: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_size: 1,
            symlink: SymlinkPolicy::Never,
            algorithm: DigestAlgorithm::Sha256,
            recurse: false,
            follow_symlinks: false,
            exclude: Vec::new(),
        }
    }
}

impl Config {
    /// Load the configuration from `path`, or from the default location.
    ///
    /// Environment variables are merged on top of the file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if an explicit `path` does not exist
    /// and [`ConfigError::Invalid`] if the file or an environment variable
    /// holds a value of the wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) if !path.is_file() => {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|path| path.is_file()),
        };
        Ok(Self::figment(path.as_deref()).extract()?)
    }

    /// Load the configuration from one file, without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing or cannot be parsed.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Ok(Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .extract()?)
    }

    fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            log::debug!("Reading configuration from {}", path.display());
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// The default platform-specific configuration path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "dedupe").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply command-line flags on top of this configuration.
    #[must_use]
    pub fn resolve(&self, cli: &Cli) -> DedupeConfig {
        let mut exclude = self.exclude.clone();
        exclude.extend(cli.exclude.iter().cloned());

        DedupeConfig {
            dry_run: cli.dry_run,
            quiet: cli.quiet,
            recurse: cli.recurse || self.recurse,
            min_size: cli.min_size.unwrap_or(self.min_size),
            symlink: cli.symlink.unwrap_or(self.symlink),
            algorithm: cli.algorithm.unwrap_or(self.algorithm),
            follow_symlinks: cli.follow_symlinks || self.follow_symlinks,
            exclude,
        }
    }
}
