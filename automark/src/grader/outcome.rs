use serde::{Deserialize, Serialize};
use std::{io, time::Duration};
use thiserror::Error;

/// Failures raised by an adapter while preparing or running one test unit.
///
/// They never escape the grader: each is classified into an [`ExecutionResult`] for the unit.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("tool '{0}' not found")]
    ToolNotFound(String),
    #[error("compilation error")]
    Compilation(String),
    #[error("runtime failure")]
    Runtime(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("{count} lint diagnostics (threshold {threshold})")]
    LintThresholdExceeded {
        count: usize,
        threshold: u32,
        diagnostic: String,
    },
    #[error("tool error: {0}")]
    Tool(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// The outcome of one test unit for one student.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionResult {
    Passed,
    CompilationError {
        diagnostic: String,
    },
    RuntimeFailure {
        diagnostic: String,
    },
    LintThresholdExceeded {
        count: usize,
        threshold: u32,
        diagnostic: String,
    },
    ToolNotFound {
        tool: String,
    },
    ToolError {
        diagnostic: String,
    },
    /// No student file matched a target of the unit.
    NotFound {
        pattern: String,
    },
    /// The unit exceeded its limit. The declared limit is recorded, not the elapsed time.
    Timeout {
        #[serde(with = "seconds")]
        limit: Duration,
    },
}

impl ExecutionResult {
    pub fn passed(&self) -> bool {
        matches!(self, ExecutionResult::Passed)
    }

    /// The verdict word written in text reports.
    pub fn label(&self) -> &'static str {
        if self.passed() { "PASSED" } else { "FAILED" }
    }

    /// A one-line explanation of a failure.
    pub fn summary(&self) -> Option<String> {
        match self {
            ExecutionResult::Passed => None,
            ExecutionResult::CompilationError { .. } => Some("compilation error".to_string()),
            ExecutionResult::RuntimeFailure { .. } => Some("runtime failure".to_string()),
            ExecutionResult::LintThresholdExceeded {
                count, threshold, ..
            } => Some(format!("{count} lint diagnostics (threshold {threshold})")),
            ExecutionResult::ToolNotFound { tool } => Some(format!("tool '{tool}' not found")),
            ExecutionResult::ToolError { .. } => Some("tool error".to_string()),
            ExecutionResult::NotFound { pattern } => {
                Some(format!("no file matching '{pattern}'"))
            }
            ExecutionResult::Timeout { limit } => {
                Some(format!("timed out after {}s", limit.as_secs_f64()))
            }
        }
    }

    /// Captured tool output attached to the failure, if any.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            ExecutionResult::CompilationError { diagnostic }
            | ExecutionResult::RuntimeFailure { diagnostic }
            | ExecutionResult::LintThresholdExceeded { diagnostic, .. }
            | ExecutionResult::ToolError { diagnostic } => Some(diagnostic),
            _ => None,
        }
    }
}

impl From<AdapterError> for ExecutionResult {
    fn from(error: AdapterError) -> Self {
        match error {
            AdapterError::ToolNotFound(tool) => ExecutionResult::ToolNotFound { tool },
            AdapterError::Compilation(diagnostic) => {
                ExecutionResult::CompilationError { diagnostic }
            }
            AdapterError::Runtime(diagnostic) => ExecutionResult::RuntimeFailure { diagnostic },
            AdapterError::Timeout(limit) => ExecutionResult::Timeout { limit },
            AdapterError::LintThresholdExceeded {
                count,
                threshold,
                diagnostic,
            } => ExecutionResult::LintThresholdExceeded {
                count,
                threshold,
                diagnostic,
            },
            AdapterError::Tool(diagnostic) => ExecutionResult::ToolError { diagnostic },
            AdapterError::Io(err) => ExecutionResult::ToolError {
                diagnostic: err.to_string(),
            },
        }
    }
}

mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let seconds = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(seconds).map_err(serde::de::Error::custom)
    }
}
