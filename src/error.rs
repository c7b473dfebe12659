//! Exit codes and structured error output.

use serde::Serialize;

/// Process exit codes.
///
/// - 0: Success (every pair handled, or nothing to do)
/// - 1: General error (unexpected failure)
/// - 3: Completed, but some files or pairs failed
/// - 64: Usage error (no directories, an unusable directory or configuration), as `EX_USAGE`
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the run completed without failures.
    Success = 0,
    /// General error: an unexpected error occurred.
    GeneralError = 1,
    /// Partial success: the run completed, but some files or pairs failed.
    PartialSuccess = 3,
    /// Usage error: bad command-line input or configuration, detected before scanning.
    Usage = 64,
    /// Interrupted: the run was stopped by Ctrl+C.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DD000",
            Self::GeneralError => "DD001",
            Self::PartialSuccess => "DD003",
            Self::Usage => "DD064",
            Self::Interrupted => "DD130",
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DD001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
