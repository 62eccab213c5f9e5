use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors that abort a whole run.
///
/// Everything that can go wrong while a single test unit runs is an
/// [`AdapterError`](crate::AdapterError) instead, and is folded into that unit's
/// [`ExecutionResult`](crate::ExecutionResult) by the grader.
#[derive(Debug, Error)]
pub enum Error {
    #[error("test corpus root '{0}' does not exist or is not a directory")]
    CorpusRootMissing(PathBuf),
    #[error("students directory '{0}' does not exist or is not a directory")]
    StudentsPathMissing(PathBuf),
    #[error("unknown student '{0}'")]
    UnknownStudent(String),
    #[error("report '{0}' already exists (use overwrite or new-only)")]
    ReportExists(PathBuf),
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Also carries configuration validation failures.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
