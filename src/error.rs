//! Error handling module for the installer
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Every fatal condition of a run is one of these variants; `exit_code()`
//! decides the process status.

use thiserror::Error;

/// Main error type for the installer
#[derive(Error, Debug)]
pub enum SetupError {
    /// IO errors (file operations, terminal, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad CLI combinations or invalid invocation context
    #[error("Usage error: {0}")]
    Usage(String),

    /// Distro name not present in any distro group
    #[error("Installer does not know how to handle distro: \"{0}\"")]
    UnsupportedDistro(String),

    /// Package manager executable not resolvable on the search path
    #[error("Package manager command ({0}) not available. Unable to continue.")]
    PackageManagerMissing(String),

    /// An external command exited non-zero
    #[error("Command `{command}` failed (exit code {code}){}", format_stderr(.stderr))]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    /// An external command could not be started at all
    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Slice markers in a config file do not pair up
    #[error("Mismatched slice markers in config file: {0}")]
    MismatchedMarkers(String),

    /// No usable Python interpreter could be found or installed
    #[error("Did not find any appropriate Python interpreter version: {0}")]
    InterpreterNotFound(String),

    /// User declined a required confirmation
    #[error("{reason}")]
    Declined { reason: String, exit_code: i32 },

    /// Static lookup tables are inconsistent
    #[error("Table error: {0}")]
    Table(String),

    /// Validation errors (environment, inputs)
    #[error("Validation error: {0}")]
    Validation(String),

    /// General errors (catch-all for edge cases)
    #[error("{0}")]
    General(String),
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(":\n\t{}", trimmed)
    }
}

/// Result type alias for installer operations
pub type Result<T> = std::result::Result<T, SetupError>;

impl SetupError {
    /// Create a usage error
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Create a mismatched markers error
    pub fn mismatched_markers(msg: impl Into<String>) -> Self {
        Self::MismatchedMarkers(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a table consistency error
    pub fn table(msg: impl Into<String>) -> Self {
        Self::Table(msg.into())
    }

    /// Create a general error
    pub fn general(msg: impl Into<String>) -> Self {
        Self::General(msg.into())
    }

    /// User chose to stop; the run ends cleanly with status 0
    pub fn declined_cleanly(reason: impl Into<String>) -> Self {
        Self::Declined {
            reason: reason.into(),
            exit_code: 0,
        }
    }

    /// User refused or failed a required confirmation; status 1
    pub fn declined(reason: impl Into<String>) -> Self {
        Self::Declined {
            reason: reason.into(),
            exit_code: 1,
        }
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Declined { exit_code, .. } => *exit_code,
            _ => 1,
        }
    }
}
