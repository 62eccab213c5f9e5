use crate::{Error, LoggingMode, Result, input::MatchMode};
use log::debug;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub mod definition_header;
mod grading_section;
mod report_section;
mod toolchain_section;

pub use grading_section::GradingSection;
pub use report_section::ReportSection;
pub use toolchain_section::ToolchainSection;

/// Default file-name prefix of test-definition files.
pub const DEFAULT_TEST_PREFIX: &str = "test_";

fn default_test_prefix() -> String {
    DEFAULT_TEST_PREFIX.to_string()
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone)]
#[serde(deny_unknown_fields)]
pub struct AssessorSection {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy)]
#[serde(deny_unknown_fields, default)]
pub struct TimeoutSection {
    /// Seconds allowed for one test program, unless its definition says otherwise.
    pub default: f64,
    /// Seconds allowed for each compile/analysis step.
    pub build: f64,
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            default: 10.0,
            build: 60.0,
        }
    }
}

impl TimeoutSection {
    pub fn default_timeout(&self) -> Duration {
        seconds(self.default)
    }
    pub fn build_timeout(&self) -> Duration {
        seconds(self.build)
    }
}

/// Whether `value` is a usable time limit: strictly positive and representable as a
/// [`Duration`].
pub(crate) fn valid_seconds(value: f64) -> bool {
    value > 0.0 && Duration::try_from_secs_f64(value).is_ok()
}

/// Saturates instead of panicking on values [`valid_seconds`] rejects.
pub(crate) fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
struct ConfigurationUnchecked {
    cohort: String,
    #[serde(default)]
    assessor: AssessorSection,
    students_path: PathBuf,
    tests_path: PathBuf,
    reports_path: PathBuf,
    #[serde(default)]
    build_path: Option<PathBuf>,
    #[serde(default)]
    students: Option<Vec<String>>,
    #[serde(default)]
    logging_mode: LoggingMode,
    #[serde(default)]
    file_match: MatchMode,
    #[serde(default = "default_test_prefix")]
    test_prefix: String,
    #[serde(default)]
    grading: GradingSection,
    #[serde(default)]
    report: ReportSection,
    #[serde(default)]
    timeouts: TimeoutSection,
    #[serde(default)]
    toolchain: ToolchainSection,
}

/// Cohort configuration (`automark.json`).
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(try_from = "ConfigurationUnchecked")]
pub struct Configuration {
    pub cohort: String,
    pub assessor: AssessorSection,
    pub students_path: PathBuf,
    pub tests_path: PathBuf,
    pub reports_path: PathBuf,
    /// Where per-student build directories are created. A temporary directory is used when
    /// this is not set.
    pub build_path: Option<PathBuf>,
    /// Explicit roster. When absent, every sub-directory of `students_path` is a student.
    pub students: Option<Vec<String>>,
    pub logging_mode: LoggingMode,
    /// Match mode for targets declared as a bare pattern.
    pub file_match: MatchMode,
    pub test_prefix: String,
    pub grading: GradingSection,
    pub report: ReportSection,
    pub timeouts: TimeoutSection,
    pub toolchain: ToolchainSection,
}

impl Configuration {
    /// A configuration with every optional section at its default.
    pub fn new(
        cohort: impl Into<String>,
        students_path: impl Into<PathBuf>,
        tests_path: impl Into<PathBuf>,
        reports_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cohort: cohort.into(),
            assessor: AssessorSection::default(),
            students_path: students_path.into(),
            tests_path: tests_path.into(),
            reports_path: reports_path.into(),
            build_path: None,
            students: None,
            logging_mode: LoggingMode::default(),
            file_match: MatchMode::default(),
            test_prefix: default_test_prefix(),
            grading: GradingSection::default(),
            report: ReportSection::default(),
            timeouts: TimeoutSection::default(),
            toolchain: ToolchainSection::default(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        cohort: String,
        assessor: AssessorSection,
        students_path: PathBuf,
        tests_path: PathBuf,
        reports_path: PathBuf,
        build_path: Option<PathBuf>,
        students: Option<Vec<String>>,
        logging_mode: LoggingMode,
        file_match: MatchMode,
        test_prefix: String,
        grading: GradingSection,
        report: ReportSection,
        timeouts: TimeoutSection,
        toolchain: ToolchainSection,
    ) -> Result<Self, &'static str> {
        if cohort.trim().is_empty() {
            return Err("cohort name must not be empty");
        }
        if test_prefix.is_empty() {
            return Err("test_prefix must not be empty");
        }
        if !valid_seconds(timeouts.default) || !valid_seconds(timeouts.build) {
            return Err("timeouts must be positive numbers of seconds");
        }
        if let Some(students) = &students {
            let mut seen = HashSet::new();
            for s in students {
                if s.is_empty() || s.contains('/') || s.contains('\\') {
                    return Err("student names must be plain directory names");
                }
                if !seen.insert(s) {
                    return Err("student names must not be duplicated");
                }
            }
        }
        Ok(Self {
            cohort,
            assessor,
            students_path,
            tests_path,
            reports_path,
            build_path,
            students,
            logging_mode,
            file_match,
            test_prefix,
            grading,
            report,
            timeouts,
            toolchain,
        })
    }

    /// Reads a configuration file. Relative paths inside it are taken relative to the
    /// directory holding the file.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration '{}'", path.display());
        let content = fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
        let mut configuration: Configuration = serde_json::from_str(&content)?;
        if let Some(base) = path.parent() {
            configuration.rebase(base);
        }
        Ok(configuration)
    }

    fn rebase(&mut self, base: &Path) {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        rebase(&mut self.students_path);
        rebase(&mut self.tests_path);
        rebase(&mut self.reports_path);
        if let Some(build_path) = self.build_path.as_mut() {
            rebase(build_path);
        }
    }
}

impl TryFrom<ConfigurationUnchecked> for Configuration {
    type Error = &'static str;

    fn try_from(value: ConfigurationUnchecked) -> Result<Self, Self::Error> {
        let ConfigurationUnchecked {
            cohort,
            assessor,
            students_path,
            tests_path,
            reports_path,
            build_path,
            students,
            logging_mode,
            file_match,
            test_prefix,
            grading,
            report,
            timeouts,
            toolchain,
        } = value;

        Configuration::build(
            cohort,
            assessor,
            students_path,
            tests_path,
            reports_path,
            build_path,
            students,
            logging_mode,
            file_match,
            test_prefix,
            grading,
            report,
            timeouts,
            toolchain,
        )
    }
}

#[cfg(test)]
mod test_macros {
    /// From a deserialized item, test if it serializes correctly and then deserializes in
    /// sequence, maintaining the same information.
    macro_rules! test_serialize_and_deserialize {
        ($name:ident, $deserialized:expr, $type:ident) => {
            #[::test_log::test]
            fn $name() {
                let json = ::serde_json::to_string_pretty(&$deserialized).unwrap();
                ::log::info!("Serialized version:\n{json}");

                let re_deserialized: $type = ::serde_json::from_str(json.as_str()).unwrap();

                assert!(
                    re_deserialized == $deserialized,
                    "the re-deserialized version is not equal to the original one"
                );
            }
        };
    }
    macro_rules! test_invalid_deserialization {
        ($name:ident, $serialized:expr, $type:ident) => {
            #[test_log::test]
            #[should_panic]
            fn $name() {
                let from_json: $type = ::serde_json::from_str($serialized).unwrap();
                ::log::error!("serialized:\n{}", $serialized);
                ::log::error!("deserialized:\n{from_json:#?}");
            }
        };
    }

    macro_rules! test_valid_deserialization {
        ($name:ident, $serialized:expr, $type:ident) => {
            #[test_log::test]
            fn $name() {
                let _t: $type = ::serde_json::from_str($serialized).unwrap();
            }
        };
    }

    pub(crate) use test_invalid_deserialization;
    pub(crate) use test_serialize_and_deserialize;
    pub(crate) use test_valid_deserialization;
}
