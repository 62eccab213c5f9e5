use crate::report::ReportOutput;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct ReportSection {
    /// Include diagnostic text and notes under each failed outcome line.
    pub verbose: bool,
    pub output: ReportOutput,
    /// Prepended to `<username>` to name each report file.
    pub prefix: String,
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            verbose: true,
            output: ReportOutput::default(),
            prefix: String::new(),
        }
    }
}

impl ReportSection {
    pub fn new(verbose: bool, output: ReportOutput, prefix: impl Into<String>) -> Self {
        Self {
            verbose,
            output,
            prefix: prefix.into(),
        }
    }
}
