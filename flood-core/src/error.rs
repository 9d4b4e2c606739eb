//! Error types for the flood pipeline
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for flood pipeline operations
#[derive(Error, Debug)]
pub enum FloodError {
    /// Reading, writing, copying or creating a file or directory failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the zip archive failed
    #[error("Failed to write archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Boundary-condition file is malformed
    #[error("Failed to parse boundary condition file: {0}")]
    BoundaryParse(String),

    /// Solver executable could not be started
    #[error("Failed to launch solver {program}: {source}")]
    SolverLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Solver exited unsuccessfully
    #[error("Solver failed with exit code {}", describe_exit(.code))]
    SolverFailed { code: Option<i32> },

    /// Solver exceeded the configured wall-clock limit and was killed
    #[error("Solver timed out after {after_secs}s")]
    SolverTimeout { after_secs: u64 },

    /// Solver run was cancelled and killed
    #[error("Solver run cancelled")]
    SolverCancelled,

    /// Raw output grid has too few lines to contain a result
    #[error("Raw output {path} has {lines} lines, expected more than {min}")]
    RawOutputTooShort {
        path: PathBuf,
        lines: usize,
        min: usize,
    },

    /// A raw output value is not a number
    #[error("Invalid grid value {value:?} on line {line}")]
    InvalidGridValue { line: usize, value: String },

    /// Raw output holds fewer values than the grid layout needs
    #[error("Incomplete grid (needed: {expected} values, found: {found})")]
    IncompleteGrid { expected: usize, found: usize },

    /// Remote GIS service rejected a request
    #[error("{operation} failed{}: {detail}", describe_status(.status))]
    Remote {
        operation: String,
        status: Option<u16>,
        detail: String,
    },

    /// HTTP request failed before a response was received
    #[error("HTTP request failed: {source}")]
    Http {
        transient: bool,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[cfg(feature = "api")]
impl From<reqwest::Error> for FloodError {
    fn from(e: reqwest::Error) -> Self {
        FloodError::Http {
            transient: e.is_timeout() || e.is_connect(),
            source: Box::new(e),
        }
    }
}

impl FloodError {
    /// Attach a path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FloodError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the remote service refused a create because the resource exists.
    pub fn is_conflict(&self) -> bool {
        match self {
            FloodError::Remote {
                status: Some(409), ..
            } => true,
            FloodError::Remote {
                status: Some(403 | 500),
                detail,
                ..
            } => detail.to_lowercase().contains("already exists"),
            _ => false,
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FloodError::Remote { status, .. } => {
                matches!(status, Some(s) if *s >= 500) && !self.is_conflict()
            }
            FloodError::Http { transient, .. } => *transient,
            _ => false,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(|| "none (killed by signal)".to_string(), |c| c.to_string())
}

fn describe_status(status: &Option<u16>) -> String {
    status.map_or_else(String::new, |s| format!(" (HTTP {s})"))
}

/// Type alias for Results using FloodError
pub type Result<T> = std::result::Result<T, FloodError>;
