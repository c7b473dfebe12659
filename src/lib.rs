//! dedupe - content-addressed file deduplication
//!
//! Finds files with identical content under one or more directories and
//! replaces every later copy with a hard link (or a relative symlink) to the
//! first one. Files are only hashed once another file of the same size shows
//! up, and every replacement goes through a temporary link that is renamed
//! over the duplicate, so no path ever goes missing.

pub mod actions;
pub mod cli;
pub mod config;
pub mod dedupe;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::sync::Arc;

use anyhow::Result;
use clap::CommandFactory;

use crate::cli::Cli;
use crate::config::Config;
use crate::dedupe::Deduplicator;
use crate::error::ExitCode;
use crate::progress::{Progress, ProgressCallback};
use crate::scanner::Hasher;

/// Run the application for parsed command-line arguments.
///
/// # Errors
///
/// Returns an error for an unusable configuration (a
/// [`ConfigError`](crate::config::ConfigError)) or unusable directories (a
/// [`DedupeError`](crate::dedupe::DedupeError)), both before anything is
/// scanned, or if the Ctrl+C handler cannot be installed. Failures of single
/// files or pairs are not errors; they are reflected in the returned exit
/// code.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    if cli.dirs.is_empty() {
        Cli::command().write_help(&mut std::io::stderr())?;
        return Ok(ExitCode::Usage);
    }

    let progress = Arc::new(Progress::new(cli.quiet));
    logging::init_logging(cli.verbose, cli.quiet, cli.no_color, Some(progress.bar()));

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config.resolve(&cli),
        Err(e) => {
            progress.on_finish();
            return Err(e.into());
        }
    };
    log::debug!("Resolved configuration: {:?}", config);

    let shutdown = signal::install_handler()?;
    let hasher = Hasher::new(config.algorithm).with_shutdown_flag(shutdown.flag());
    let deduplicator = Deduplicator::with_hasher(config, hasher)
        .with_shutdown_flag(shutdown.flag())
        .with_progress_callback(Arc::clone(&progress) as Arc<dyn ProgressCallback>);

    let summary = match deduplicator.run(&cli.dirs) {
        Ok(summary) => summary,
        Err(e) => {
            progress.on_finish();
            return Err(e.into());
        }
    };

    if summary.dry_run {
        log::info!("Dry run: {summary}");
    } else {
        log::info!("{summary}");
    }

    if summary.interrupted {
        log::warn!("Interrupted; some duplicates were not processed");
        Ok(ExitCode::Interrupted)
    } else if summary.has_failures() {
        Ok(ExitCode::PartialSuccess)
    } else {
        Ok(ExitCode::Success)
    }
}
