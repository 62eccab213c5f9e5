//! Per-student reports: the artifact consumed by the mark-sheet side.

use crate::{
    Error, Result,
    grader::{
        outcome::ExecutionResult,
        score::{Mode, Score},
    },
};
use chrono::Local;
use log::warn;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, fs, path::Path};

pub const MANIFEST_FILE: &str = "manifest.json";
const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M";

/// Where a report is written.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ReportOutput {
    /// `<reports_path>/<prefix><username>.txt`
    #[default]
    Txt,
    /// `<reports_path>/<prefix><username>.json`
    Json,
    /// Printed, not persisted.
    Stdout,
}

impl ReportOutput {
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            ReportOutput::Txt => Some("txt"),
            ReportOutput::Json => Some("json"),
            ReportOutput::Stdout => None,
        }
    }
}

fn default_mark() -> u32 {
    1
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct ManifestEntry {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_mark")]
    pub mark: u32,
}

/// Descriptions and marks of test units (`manifest.json` in the corpus root).
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone)]
pub struct Manifest {
    #[serde(default)]
    pub tests: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    /// Reads the manifest of the corpus at `root`; a corpus without one has an empty manifest.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(MANIFEST_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path).map_err(|err| Error::io(&path, err))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// The entry of a unit, falling back to the entry of its definition file.
    pub fn entry(&self, unit_id: &str, definition_id: &str) -> Option<&ManifestEntry> {
        self.tests
            .get(unit_id)
            .or_else(|| self.tests.get(definition_id))
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct ReportEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub weight: u32,
    pub result: ExecutionResult,
    /// Non-fatal observations, such as an ambiguous file match.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// The ordered outcomes of one student's run.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Report {
    pub generated: String,
    pub student: String,
    pub assessor: String,
    pub entries: Vec<ReportEntry>,
}

impl Report {
    /// A report stamped with the current local time.
    pub fn new(student: impl Into<String>, assessor: impl Into<String>) -> Self {
        Self {
            generated: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            student: student.into(),
            assessor: assessor.into(),
            entries: vec![],
        }
    }

    pub fn push(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    pub fn all_passed(&self) -> bool {
        self.entries.iter().all(|e| e.result.passed())
    }

    pub fn passed_count(&self) -> usize {
        self.entries.iter().filter(|e| e.result.passed()).count()
    }

    pub fn score(&self, mode: Mode) -> Score {
        let mut score = Score::empty(mode);
        for entry in &self.entries {
            score += Score::of_unit(mode, entry.result.passed(), entry.weight);
        }
        score
    }

    pub fn header_line(&self) -> String {
        let mut line = format!("Report generated {} for {}", self.generated, self.student);
        if !self.assessor.is_empty() {
            line.push_str(" by ");
            line.push_str(&self.assessor);
        }
        line
    }

    /// The text report. Outcome lines start at column 0; in verbose mode diagnostics and notes
    /// follow each failed unit, indented.
    pub fn render_text(&self, verbose: bool, mode: Mode) -> String {
        let mut text = self.header_line();
        text.push('\n');
        for entry in &self.entries {
            text.push_str(&entry.id);
            text.push(' ');
            text.push_str(entry.result.label());
            if let Some(summary) = entry.result.summary() {
                text.push(' ');
                text.push_str(&summary);
            }
            text.push('\n');
            if !verbose {
                continue;
            }
            if let Some(diagnostic) = entry.result.diagnostic() {
                for line in diagnostic.lines().filter(|l| !l.trim().is_empty()) {
                    text.push_str("    | ");
                    text.push_str(line);
                    text.push('\n');
                }
            }
            for note in &entry.notes {
                text.push_str("    note: ");
                text.push_str(note);
                text.push('\n');
            }
        }
        let passed = self.passed_count();
        text.push_str(&format!(
            "Summary: {passed} passed, {} failed, score {}\n",
            self.entries.len() - passed,
            self.score(mode)
        ));
        text
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// The outcome of a unit as read back from a text report.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum Verdict {
    #[serde(rename = "PASSED")]
    Passed,
    #[serde(rename = "FAILED")]
    Failed,
    Unknown,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Passed => write!(f, "PASSED"),
            Verdict::Failed => write!(f, "FAILED"),
            Verdict::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Looks up each of `ids` in a text report.
///
/// Only outcome lines (starting at column 0 with the unit id followed by `PASSED` or
/// `FAILED`) are considered. An id without such a line is `Unknown`.
pub fn analyse_report<S: AsRef<str>>(text: &str, ids: &[S]) -> Vec<(String, Verdict)> {
    ids.iter()
        .map(|id| {
            let id = id.as_ref();
            let verdict = text
                .lines()
                .filter_map(|line| line.strip_prefix(id))
                .find_map(|rest| {
                    let word = rest.strip_prefix(' ')?.split_whitespace().next()?;
                    match word {
                        "PASSED" => Some(Verdict::Passed),
                        "FAILED" => Some(Verdict::Failed),
                        _ => None,
                    }
                })
                .unwrap_or_else(|| {
                    warn!("⚠️  No outcome for '{id}' in report");
                    Verdict::Unknown
                });
            (id.to_string(), verdict)
        })
        .collect()
}

/// Every unit id with an outcome line in a text report, in report order.
pub fn report_ids(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.starts_with(char::is_whitespace))
        .filter_map(|line| {
            // Ids may contain spaces; failure summaries follow the verdict.
            if let Some(id) = line.strip_suffix(" PASSED") {
                return Some(id.to_string());
            }
            line.match_indices(" FAILED")
                .map(|(at, _)| at)
                .find(|&at| matches!(line[at + 7..].chars().next(), None | Some(' ')))
                .map(|at| line[..at].to_string())
        })
        .filter(|id| !id.is_empty())
        .collect()
}
