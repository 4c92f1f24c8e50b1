//! Error types for npm-manipulator.
//!
//! All operations return `Result<T>` which aliases `Result<T, ManipulationError>`.

use std::path::PathBuf;
use thiserror::Error;

/// Exit code for a failed manipulation (bad input, cycle, lookup failure).
pub const EXIT_MANIPULATION_FAILED: i32 = 10;

/// Exit code for unexpected failures (I/O, internal errors).
pub const EXIT_UNEXPECTED: i32 = 100;

/// Errors from manipulation runs.
#[derive(Debug, Error)]
pub enum ManipulationError {
    /// Invalid configuration value that cannot be degraded to a default.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Manifest is malformed or lacks a required field.
    #[error("Invalid manifest {path}: {reason}")]
    Structure { path: PathBuf, reason: String },

    /// Manipulator received a project kind it cannot handle.
    #[error("Project type '{project}' is not supported by the {manipulator} manipulator")]
    UnsupportedProject {
        project: String,
        manipulator: String,
    },

    /// Version string does not have the shape a strategy requires.
    #[error("Invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    /// Manipulators could not be ordered.
    ///
    /// Holds the names of the manipulators that were still pending.
    #[error(
        "A dependency cycle has been found, so manipulation cannot be finished. Remaining manipulators are: {}",
        .0.join(", ")
    )]
    DependencyCycle(Vec<String>),

    /// Version lookup service failed or answered with an error.
    #[error("Version lookup failed: {0}")]
    Lookup(String),

    /// Pre- or post-manipulation script failed.
    #[error("Script failed: {0}")]
    Script(String),

    /// Project path given on the command line does not exist.
    #[error("File {0} cannot be found")]
    MissingPath(PathBuf),

    /// Rollback failed after commit error.
    #[error("Rollback failed: {0}")]
    RollbackFailed(String),

    /// File system operation failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON parse or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Regex compilation failed (indicates bug).
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Unexpected error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ManipulationError {
    /// Process exit code reported for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ManipulationError::Io(_)
            | ManipulationError::Regex(_)
            | ManipulationError::RollbackFailed(_)
            | ManipulationError::Other(_) => EXIT_UNEXPECTED,
            _ => EXIT_MANIPULATION_FAILED,
        }
    }
}

/// Result type alias for manipulation operations.
pub type Result<T> = std::result::Result<T, ManipulationError>;
